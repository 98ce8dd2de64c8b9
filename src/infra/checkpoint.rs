// ============================================================
// Layer 6 — Model Store
// ============================================================
// Saves and restores the trained model using Burn's records.
//
// What gets saved:
//   1. <output_model_file>        — all weights, named MessagePack
//                                   (full precision)
//   2. <output_model_file>.optim  — optimiser state of the last
//                                   phase (Adam or SGD moments)
//   3. <output_model_file>.json   — manifest: class names, head
//                                   size, phases that ran, which
//                                   optimiser file belongs to the
//                                   model, run config
//
// Why a manifest?
//   The weights alone don't say how many classes the head has or
//   which label means which class. Without it a saved model can't
//   be rebuilt or interpreted.
//
// The weights file is written at exactly the requested path (no
// extension added), in one write, with no versioning. On restore
// the optimiser state is handed back to the phase that produced
// it, so that phase resumes with its moment estimates.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Record, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::FineTuneConfig;
use crate::domain::history::TrainingPhase;
use crate::ml::trainer::{AdamRecord, OptimizerState, SgdRecord};

/// Optimiser record stored next to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedOptimizer {
    /// Phase whose optimiser produced the record
    pub phase: TrainingPhase,

    /// File name, in the model file's directory
    pub file: String,
}

/// Everything needed to rebuild and interpret a saved model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub architecture: String,

    /// Class names; label i = classes[i]
    pub classes: Vec<String>,

    pub fc_size:    usize,
    pub dropout:    f64,
    pub image_size: u32,

    /// Phases that ran before the model was saved
    pub phases: Vec<TrainingPhase>,

    #[serde(default)]
    pub optimizer: Option<SavedOptimizer>,

    /// The run configuration that produced this model
    pub run: Option<FineTuneConfig>,
}

impl ModelManifest {
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }
}

/// Reads and writes one model file plus its manifest.
pub struct ModelStore {
    path: PathBuf,
}

type ModelRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<model file>.json`, next to the model file
    pub fn manifest_path(&self) -> PathBuf {
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(".json");
        PathBuf::from(name)
    }

    /// `<model file>.optim`, next to the model file
    pub fn optimizer_path(&self) -> PathBuf {
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(".optim");
        PathBuf::from(name)
    }

    /// Write the weights of `module` to the model file.
    pub fn save_model<B: Backend, M: Module<B>>(&self, module: &M) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
        }

        write_record::<B, _>(&self.path, module.clone().into_record())?;
        tracing::debug!("Saved model weights to '{}'", self.path.display());
        Ok(())
    }

    /// Load the weights in the model file into `module`.
    ///
    /// `module` must have the same architecture as the saved one.
    pub fn load_model<B: Backend, M: Module<B>>(&self, module: M, device: &B::Device) -> Result<M> {
        let record = read_record::<B, M::Record>(&self.path, device)?;
        Ok(module.load_record(record))
    }

    /// Write the optimiser state beside the model file (call after
    /// save_model, which creates the directory).
    pub fn save_optimizer<B: AutodiffBackend>(&self, state: OptimizerState<B>) -> Result<SavedOptimizer> {
        let path  = self.optimizer_path();
        let phase = state.phase();

        match state {
            OptimizerState::Adam(record) => write_record::<B, _>(&path, record)?,
            OptimizerState::Sgd(record)  => write_record::<B, _>(&path, record)?,
        }
        tracing::debug!("Saved {} optimiser state to '{}'", phase, path.display());

        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("'{}' has no file name", path.display()))?;
        Ok(SavedOptimizer { phase, file })
    }

    /// Read the optimiser state a manifest points to.
    pub fn load_optimizer<B: AutodiffBackend>(
        &self,
        saved:  &SavedOptimizer,
        device: &B::Device,
    ) -> Result<OptimizerState<B>> {
        let path = self.path.with_file_name(&saved.file);
        Ok(match saved.phase {
            TrainingPhase::TransferLearning => {
                OptimizerState::Adam(read_record::<B, AdamRecord<B>>(&path, device)?)
            }
            TrainingPhase::FineTuning => {
                OptimizerState::Sgd(read_record::<B, SgdRecord<B>>(&path, device)?)
            }
        })
    }

    pub fn save_manifest(&self, manifest: &ModelManifest) -> Result<()> {
        let path = self.manifest_path();
        let json = serde_json::to_string_pretty(manifest)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write manifest to '{}'", path.display()))?;

        tracing::debug!("Saved model manifest to '{}'", path.display());
        Ok(())
    }

    pub fn load_manifest(&self) -> Result<ModelManifest> {
        let path = self.manifest_path();
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read manifest '{}'. Was the model saved with --save_to_file?",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed manifest '{}'", path.display()))
    }

    /// Fail unless the saved model was trained on `classes`.
    pub fn check_classes(&self, classes: &[String]) -> Result<ModelManifest> {
        let manifest = self.load_manifest()?;
        if manifest.classes != classes {
            anyhow::bail!(
                "'{}' was trained on {} classes {:?}, but the training directory has {} classes {:?}",
                self.path.display(),
                manifest.num_classes(),
                manifest.classes,
                classes.len(),
                classes
            );
        }
        Ok(manifest)
    }
}

fn write_record<B: Backend, R: Record<B>>(path: &Path, record: R) -> Result<()> {
    let bytes = <ModelRecorder as Recorder<B>>::record(&ModelRecorder::default(), record, ())
        .with_context(|| format!("Failed to serialise record for '{}'", path.display()))?;

    fs::write(path, bytes).with_context(|| format!("Failed to write '{}'", path.display()))
}

fn read_record<B: Backend, R: Record<B>>(path: &Path, device: &B::Device) -> Result<R> {
    let bytes = fs::read(path).with_context(|| format!("Cannot read '{}'", path.display()))?;

    <ModelRecorder as Recorder<B>>::load(&ModelRecorder::default(), bytes, device)
        .with_context(|| format!("'{}' does not match the model architecture", path.display()))
}
