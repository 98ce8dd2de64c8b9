// ============================================================
// Layer 4 — Augmenting Data Pipeline
// ============================================================
// An infinite, lazily produced sequence of image batches for one
// dataset root. The training loop pulls exactly as many batches
// as its step schedule asks for and never waits for an
// end-of-data signal.
//
//   ImageFolder (paths + labels)
//       │
//       ▼
//   ImageDataset      → decode + resize + augment + normalise
//       │               on every get()
//       ▼
//   ShuffledDataset   → one fixed permutation, so every loader
//       │               worker sees a mix of classes
//       ▼
//   DataLoader        → batch_size, reshuffles on every iter(),
//       │               num_workers threads decode in parallel
//       ▼
//   BatchStream       → restarts loader.iter() whenever a pass
//                       ends; Iterator<Item = Result<ImageBatch<B>>>
//
// Each worker owns a contiguous slice of the permutation, so a
// pass may end with up to num_workers short batches.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use anyhow::Result;
use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder, DataLoaderIterator},
        dataset::transform::ShuffledDataset,
    },
    prelude::*,
};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};

use crate::data::{
    augment::AugmentConfig,
    batcher::{BatchResult, ImageBatch, ImageBatcher},
    dataset::ImageDataset,
    folder::ImageFolder,
};

/// Everything a pipeline needs besides the directory itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Images are resized to image_size × image_size
    pub image_size: u32,
    pub batch_size: usize,
    pub augment:    AugmentConfig,

    /// Loader threads decoding images in parallel
    pub num_workers: usize,
    pub seed:        u64,
}

impl PipelineConfig {
    pub fn new(image_size: u32, batch_size: usize, seed: u64) -> Self {
        Self {
            image_size,
            batch_size,
            augment: AugmentConfig::default(),
            num_workers: 4,
            seed,
        }
    }
}

/// A built Burn data loader over one dataset root.
pub type BatchLoader<B> = Arc<dyn DataLoader<BatchResult<B>>>;

// ─── DataPipeline ─────────────────────────────────────────────────────────────
/// A configured source of augmented batches.
pub struct DataPipeline {
    folder: Arc<ImageFolder>,
    config: PipelineConfig,
}

impl DataPipeline {
    /// Index `root` and configure the pipeline.
    ///
    /// `classes` pins the label order (validation reuses the training
    /// classes); `None` discovers the classes from `root`.
    pub fn flow_from_directory(
        root:    impl AsRef<Path>,
        classes: Option<&[String]>,
        config:  PipelineConfig,
    ) -> Result<Self> {
        let folder = match classes {
            Some(c) => ImageFolder::with_classes(root, c)?,
            None    => ImageFolder::discover(root)?,
        };

        println!(
            "Found {} images belonging to {} classes.",
            folder.len(),
            folder.num_classes()
        );
        if folder.is_empty() {
            tracing::warn!("'{}' holds no images; its pipeline cannot produce batches", folder.root().display());
        }

        Ok(Self::from_folder(folder, config))
    }

    pub fn from_folder(folder: ImageFolder, config: PipelineConfig) -> Self {
        Self { folder: Arc::new(folder), config }
    }

    pub fn folder(&self) -> &ImageFolder {
        &self.folder
    }

    pub fn classes(&self) -> &[String] {
        self.folder.classes()
    }

    /// Build a Burn data loader producing batches on `device`.
    pub fn loader<B: Backend>(&self, device: &B::Device) -> BatchLoader<B> {
        let cfg = &self.config;
        let dataset = ImageDataset::new(Arc::clone(&self.folder), cfg.image_size, cfg.augment, cfg.seed);
        let batcher = ImageBatcher::<B>::new(device.clone(), cfg.image_size as usize);

        DataLoaderBuilder::new(batcher)
            .batch_size(cfg.batch_size)
            .shuffle(cfg.seed)
            .num_workers(cfg.num_workers.max(1))
            .build(ShuffledDataset::with_seed(dataset, cfg.seed))
    }
}

// ─── BatchStream ──────────────────────────────────────────────────────────────
/// Endless view over a loader: when one pass ends the next begins.
///
/// Yields `None` only when the loader has no items; a decoding
/// failure is yielded once as `Some(Err(..))` and then the stream ends.
pub struct BatchStream<'a, B: Backend> {
    loader: &'a dyn DataLoader<BatchResult<B>>,
    pass:   Box<dyn DataLoaderIterator<BatchResult<B>> + 'a>,
    failed: bool,
}

impl<'a, B: Backend> BatchStream<'a, B> {
    pub fn new(loader: &'a BatchLoader<B>) -> Self {
        let loader: &'a dyn DataLoader<BatchResult<B>> = &**loader;
        Self { loader, pass: loader.iter(), failed: false }
    }
}

impl<B: Backend> Iterator for BatchStream<'_, B> {
    type Item = Result<ImageBatch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let batch = match self.pass.next() {
            Some(batch) => batch,
            None => {
                let loader = self.loader;
                self.pass = loader.iter();
                self.pass.next()?
            }
        };

        self.failed = batch.is_err();
        Some(batch.map_err(anyhow::Error::new))
    }
}
