// ============================================================
// Layer 4 — Image Batcher
// ============================================================
// Implements Burn's Batcher trait to stack preprocessed images
// into GPU-ready tensors.
//
// How batching works here:
//   Input:  Vec of N ImageSamples, each an ImageItem of 3·H·W
//           floats (CHW) or the error that stopped its decoding
//   Output: Ok(ImageBatch) with images [N, 3, H, W]
//                          and targets [N]
//           or the first DecodeError of the batch
//
//   All pixel buffers are concatenated into one flat Vec and
//   reshaped in a single tensor creation:
//   [img1_R.., img1_G.., img1_B.., img2_R.., ...] → [N, 3, H, W]
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};
use std::{fmt, path::PathBuf};

// ─── ImageItem ────────────────────────────────────────────────────────────────
/// One preprocessed sample, produced by the image dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageItem {
    /// CHW pixels in [-1, 1], length 3 · size · size
    pub pixels: Vec<f32>,

    /// Class index
    pub label: usize,
}

/// An image file that could not be turned into an ImageItem.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError {
    pub path:   PathBuf,
    pub reason: String,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cannot decode '{}': {}", self.path.display(), self.reason)
    }
}

impl std::error::Error for DecodeError {}

/// What the dataset yields for one index.
pub type ImageSample = Result<ImageItem, DecodeError>;

/// What the data loader yields for one batch.
pub type BatchResult<B> = Result<ImageBatch<B>, DecodeError>;

// ─── ImageBatch ───────────────────────────────────────────────────────────────
/// A batch of images ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// shape: [batch_size, 3, size, size]
    pub images: Tensor<B, 4>,

    /// shape: [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> ImageBatch<B> {
    pub fn len(&self) -> usize {
        self.targets.dims()[0]
    }
}

// ─── ImageBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    pub device: B::Device,

    /// Side length of the square images
    pub image_size: usize,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device, image_size: usize) -> Self {
        Self { device, image_size }
    }

    /// Stack decoded items into one batch.
    pub fn stack(&self, items: Vec<ImageItem>) -> ImageBatch<B> {
        let batch_size = items.len();
        let s = self.image_size;

        // ── Flatten pixels ────────────────────────────────────────────────────
        let mut flat = Vec::with_capacity(batch_size * 3 * s * s);
        for item in &items {
            flat.extend_from_slice(&item.pixels);
        }

        let labels: Vec<i64> = items.iter().map(|i| i.label as i64).collect();

        // ── Create tensors ────────────────────────────────────────────────────
        let images = Tensor::<B, 4>::from_data(
            TensorData::new(flat, [batch_size, 3, s, s]),
            &self.device,
        );
        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(labels, [batch_size]),
            &self.device,
        );

        ImageBatch { images, targets }
    }
}

impl<B: Backend> Batcher<ImageSample, BatchResult<B>> for ImageBatcher<B> {
    /// A single undecodable image fails the whole batch.
    fn batch(&self, items: Vec<ImageSample>) -> BatchResult<B> {
        let items = items.into_iter().collect::<Result<Vec<_>, _>>()?;
        Ok(self.stack(items))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batch_shapes_and_values() {
        let device  = Default::default();
        let batcher = ImageBatcher::<TestBackend>::new(device, 2);

        let a = ImageItem { pixels: vec![0.5; 12], label: 1 };
        let b = ImageItem { pixels: vec![-0.5; 12], label: 0 };
        let batch = batcher.batch(vec![Ok(a), Ok(b)]).unwrap();

        assert_eq!(batch.images.dims(), [2, 3, 2, 2]);
        assert_eq!(batch.len(), 2);

        let targets: Vec<i64> = batch.targets.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(targets, vec![1, 0]);

        let first: Vec<f32> = batch.images.clone()
            .slice([0..1, 0..3, 0..2, 0..2])
            .into_data()
            .to_vec()
            .unwrap();
        assert!(first.iter().all(|&v| v == 0.5));
    }

    #[test]
    fn test_one_bad_sample_fails_the_batch() {
        let device  = Default::default();
        let batcher = ImageBatcher::<TestBackend>::new(device, 2);

        let bad = DecodeError { path: PathBuf::from("a/broken.jpg"), reason: "truncated".into() };
        let err = batcher
            .batch(vec![Ok(ImageItem { pixels: vec![0.0; 12], label: 0 }), Err(bad.clone())])
            .unwrap_err();

        assert_eq!(err, bad);
        assert!(err.to_string().contains("a/broken.jpg"));
    }
}
