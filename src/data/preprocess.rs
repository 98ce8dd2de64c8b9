// ============================================================
// Layer 4 — Image Preprocessing
// ============================================================
// Decode → resize → (augment) → InceptionV3 normalisation.
//
// InceptionV3 was pretrained on pixels scaled to [-1, 1]:
//
//   x' = x / 127.5 - 1.0        (0 → -1.0, 255 → 1.0)
//
// The network consumes channel-first tensors, so the RGB pixels
// are rearranged from HWC (how images are stored) to CHW:
//
//   [R R R ... | G G G ... | B B B ...]
//
// Reference: Szegedy et al. (2016) Rethinking the Inception
//            Architecture for Computer Vision

use anyhow::{Context, Result};
use image::{imageops::FilterType, ImageReader, RgbImage};
use std::path::Path;

/// Read an image from disk as 8-bit RGB, resized to `size × size`.
///
/// Nearest-neighbour resampling, no aspect-ratio preservation.
pub fn load_rgb(path: &Path, size: u32) -> Result<RgbImage> {
    let img = ImageReader::open(path)
        .with_context(|| format!("Cannot open image '{}'", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("Cannot read image '{}'", path.display()))?
        .decode()
        .with_context(|| format!("Cannot decode image '{}'", path.display()))?;

    Ok(img.resize_exact(size, size, FilterType::Nearest).to_rgb8())
}

/// Scale pixels to [-1, 1] and lay them out channel-first.
pub fn inception_preprocess(img: &RgbImage) -> Vec<f32> {
    let (w, h) = img.dimensions();
    let plane  = (w * h) as usize;
    let mut out = vec![0.0f32; 3 * plane];

    for (i, px) in img.pixels().enumerate() {
        for c in 0..3 {
            out[c * plane + i] = px[c] as f32 / 127.5 - 1.0;
        }
    }
    out
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::tempdir;

    #[test]
    fn test_preprocess_range_and_layout() {
        // 2×1 image: black pixel, white pixel
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([0, 0, 0]));
        img.put_pixel(1, 0, Rgb([255, 255, 255]));

        let v = inception_preprocess(&img);
        assert_eq!(v.len(), 6);
        // R plane, G plane, B plane
        assert_eq!(v, vec![-1.0, 1.0, -1.0, 1.0, -1.0, 1.0]);
    }

    #[test]
    fn test_preprocess_channel_order() {
        let mut img = RgbImage::new(1, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 51]));
        let v = inception_preprocess(&img);
        assert_eq!(v[0], 1.0);
        assert_eq!(v[1], -1.0);
        assert!((v[2] - (51.0 / 127.5 - 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_load_rgb_resizes() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        RgbImage::from_pixel(7, 3, Rgb([10, 20, 30])).save(&path).unwrap();

        let img = load_rgb(&path, 5).unwrap();
        assert_eq!(img.dimensions(), (5, 5));
        assert_eq!(img.get_pixel(4, 4), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_load_rgb_rejects_garbage() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();
        assert!(load_rgb(&path, 5).is_err());
    }
}
