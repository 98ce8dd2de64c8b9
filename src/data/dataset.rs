// ============================================================
// Layer 4 — Image Dataset
// ============================================================
// Implements Burn's Dataset trait over an ImageFolder.
//
// Nothing is decoded up front: get(i) reads sample i from disk,
// resizes it, draws a fresh random transform, applies it and
// normalises the pixels. Every access augments anew, so the
// same image looks different on every pass over the data.
//
// Decoding can fail; get() then yields Some(Err(..)) instead of
// None, because Burn's loaders treat None as the end of the
// dataset and would silently cut the pass short.
//
// Reference: Burn Book §4 (Datasets)

use anyhow::Result;
use burn::data::dataset::Dataset;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex};

use crate::data::{
    augment::AugmentConfig,
    batcher::{DecodeError, ImageItem, ImageSample},
    folder::{FolderSample, ImageFolder},
    preprocess::{inception_preprocess, load_rgb},
};

pub struct ImageDataset {
    folder:     Arc<ImageFolder>,
    image_size: u32,
    augment:    AugmentConfig,

    /// Hands out one seed per access; loader workers share it
    seeds: Mutex<ChaCha8Rng>,
}

impl ImageDataset {
    pub fn new(folder: Arc<ImageFolder>, image_size: u32, augment: AugmentConfig, seed: u64) -> Self {
        Self {
            folder,
            image_size,
            augment,
            seeds: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    fn next_seed(&self) -> u64 {
        // a poisoned lock still holds a usable generator
        let mut rng = self.seeds.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen()
    }

    fn decode(&self, sample: &FolderSample) -> Result<ImageItem> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.next_seed());

        let img    = load_rgb(&sample.path, self.image_size)?;
        let params = self.augment.sample(self.image_size, self.image_size, &mut rng);
        let img    = params.apply(&img);

        Ok(ImageItem { pixels: inception_preprocess(&img), label: sample.label })
    }
}

impl Dataset<ImageSample> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageSample> {
        let sample = self.folder.samples().get(index)?;
        Some(self.decode(sample).map_err(|e| DecodeError {
            path:   sample.path.clone(),
            reason: format!("{e:#}"),
        }))
    }

    fn len(&self) -> usize {
        self.folder.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::{fs, path::Path};
    use tempfile::tempdir;

    fn write_png(path: &Path, shade: u8) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(6, 4, Rgb([shade, shade, shade])).save(path).unwrap();
    }

    #[test]
    fn test_get_decodes_in_range_and_stops_at_len() {
        let dir = tempdir().unwrap();
        write_png(&dir.path().join("cat").join("a.png"), 0);
        write_png(&dir.path().join("dog").join("b.png"), 255);

        let folder  = Arc::new(ImageFolder::discover(dir.path()).unwrap());
        let dataset = ImageDataset::new(folder, 8, AugmentConfig::default(), 1);
        assert_eq!(dataset.len(), 2);

        let item = dataset.get(1).unwrap().unwrap();
        assert_eq!(item.label, 1);
        assert_eq!(item.pixels.len(), 3 * 8 * 8);
        assert!(item.pixels.iter().all(|&v| (-1.0..=1.0).contains(&v)));

        assert!(dataset.get(2).is_none());
    }

    #[test]
    fn test_undecodable_file_is_an_error_item() {
        let dir = tempdir().unwrap();
        let bad = dir.path().join("a").join("bad.png");
        fs::create_dir_all(bad.parent().unwrap()).unwrap();
        fs::write(&bad, b"not a png").unwrap();

        let folder  = Arc::new(ImageFolder::discover(dir.path()).unwrap());
        let dataset = ImageDataset::new(folder, 8, AugmentConfig::default(), 1);

        let err = dataset.get(0).unwrap().unwrap_err();
        assert_eq!(err.path, bad);
    }
}
