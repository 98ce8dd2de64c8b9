// ============================================================
// Layer 5 — Pretrained Weights Provider
// ============================================================
// The backbone starts from ImageNet weights. They are read from
// a torchvision-layout PyTorch checkpoint:
//
//   <weights_dir>/inception_v3_imagenet.pth
//
// torchvision capitalises its top-level modules (Conv2d_1a_3x3,
// Mixed_5b, ...) while Rust fields are snake_case, so two regex
// key remaps bridge the gap:
//
//   Conv2d_1a_3x3.conv.weight  →  conv2d_1a_3x3.conv.weight
//   Mixed_5b.branch1x1.bn.bias →  mixed_5b.branch1x1.bn.bias
//
// Keys the backbone does not have (fc.*, AuxLogits.*,
// num_batches_tracked) are ignored by the recorder.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, Recorder},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use std::path::{Path, PathBuf};

use crate::ml::inception::{InceptionV3, InceptionV3Record};

pub const ARCHITECTURE: &str = "inception_v3";
pub const PRETRAINED_ON: &str = "imagenet";

/// Anything that can fill a freshly initialised backbone with weights.
pub trait WeightsProvider<B: Backend> {
    fn load_backbone(&self, backbone: InceptionV3<B>, device: &B::Device) -> Result<InceptionV3<B>>;

    /// Where the weights come from, for logging
    fn describe(&self) -> String;
}

/// torchvision ImageNet checkpoint on the local filesystem.
#[derive(Debug, Clone)]
pub struct TorchvisionWeights {
    dir: PathBuf,
}

impl TorchvisionWeights {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_name() -> String {
        format!("{ARCHITECTURE}_{PRETRAINED_ON}.pth")
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(Self::file_name())
    }
}

fn load_args(path: &Path) -> LoadArgs {
    LoadArgs::new(path.to_path_buf())
        .with_key_remap("^Conv2d_(.+)$", "conv2d_$1")
        .with_key_remap("^Mixed_(.+)$", "mixed_$1")
}

impl<B: Backend> WeightsProvider<B> for TorchvisionWeights {
    fn load_backbone(&self, backbone: InceptionV3<B>, device: &B::Device) -> Result<InceptionV3<B>> {
        let path = self.path();
        if !path.is_file() {
            anyhow::bail!(
                "Pretrained weights not found at '{}'. Download torchvision's \
                 inception_v3 ImageNet checkpoint (inception_v3_google-*.pth) \
                 and save it under that name, or point --weights_dir elsewhere.",
                path.display()
            );
        }

        let record: InceptionV3Record<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
            .load(load_args(&path), device)
            .with_context(|| format!("Cannot load pretrained weights from '{}'", path.display()))?;

        tracing::info!("Loaded {} weights from '{}'", ARCHITECTURE, path.display());
        Ok(backbone.load_record(record))
    }

    fn describe(&self) -> String {
        format!("{ARCHITECTURE} ({PRETRAINED_ON}) from '{}'", self.path().display())
    }
}
