// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates one fine-tuning run, strictly in order:
//
//   Step 1: Scan train / val trees        (Layer 4 - data)
//   Step 2: Derive the epoch schedule     (Layer 3 - domain)
//   Step 3: Configure both pipelines      (Layer 4 - data)
//   Step 4: Class weights                 (Layer 3 - domain)
//   Step 5: Build the model               (Layer 5 - ml)
//   Step 6: Transfer learning             (Layer 5 - ml)
//   Step 7: Fine-tuning (--fine_tune)     (Layer 5 - ml)
//   Step 8: Save model (--save_to_file)   (Layer 6 - infra)
//           weights, last optimiser state, manifest
//   Step 9: Plot history (--plot)         (Layer 6 - infra)
//
// Nothing is written to disk unless every requested phase
// completed.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::Result;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::{
    pipeline::{BatchStream, DataPipeline, PipelineConfig},
    scanner::DirectoryScanner,
};
use crate::domain::{
    class_weights::{class_weights, ClassWeightMode},
    dataset::DatasetSummary,
    history::{TrainingHistory, TrainingPhase},
    schedule::{EpochSchedule, ValidationStepsMode},
    traits::DatasetScanner,
};
use crate::infra::{
    checkpoint::{ModelManifest, ModelStore},
    metrics::MetricsLogger,
    plot::{plot_history, PlotFiles},
};
use crate::ml::{
    backend::{backend_name, default_device, TrainingBackend},
    inception::{InceptionV3Config, MIN_INPUT_SIZE},
    model::{FineTuneModel, FineTuneModelConfig},
    trainer::{OptimizerState, PhaseConfig, TrainingController},
    weights::{TorchvisionWeights, WeightsProvider, ARCHITECTURE},
};

// ─── Run Configuration ────────────────────────────────────────────────────────
// Every tunable of a run. Serialisable so the manifest of a saved
// model records exactly how it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineTuneConfig {
    pub train_dir: PathBuf,
    pub val_dir:   PathBuf,

    pub nb_epoch:   usize,
    pub batch_size: usize,

    pub output_model_file: PathBuf,
    pub fine_tune:         bool,
    pub save_to_file:      bool,
    pub plot:              bool,

    pub image_size:       u32,
    pub fc_size:          usize,
    pub dropout:          f64,
    pub freeze_threshold: usize,

    pub transfer_learning_rate:  f64,
    pub fine_tune_learning_rate: f64,
    pub fine_tune_momentum:      f64,

    pub validation_steps: ValidationStepsMode,
    pub class_weight:     ClassWeightMode,

    pub weights_dir:  PathBuf,
    pub restore_from: Option<PathBuf>,
    pub metrics_csv:  Option<PathBuf>,
    pub plot_dir:     PathBuf,

    pub seed:        u64,
    pub num_workers: usize,
}

impl Default for FineTuneConfig {
    fn default() -> Self {
        Self {
            train_dir:               PathBuf::from("train"),
            val_dir:                 PathBuf::from("val"),
            nb_epoch:                10,
            batch_size:              64,
            output_model_file:       PathBuf::from("inceptionv3-ft.model"),
            fine_tune:               false,
            save_to_file:            false,
            plot:                    false,
            image_size:              299,
            fc_size:                 20,
            dropout:                 0.5,
            freeze_threshold:        172,
            transfer_learning_rate:  5e-5,
            fine_tune_learning_rate: 5e-5,
            fine_tune_momentum:      0.9,
            validation_steps:        ValidationStepsMode::Inherited,
            class_weight:            ClassWeightMode::Auto,
            weights_dir:             PathBuf::from("weights"),
            restore_from:            None,
            metrics_csv:             None,
            plot_dir:                PathBuf::from("."),
            seed:                    42,
            num_workers:             4,
        }
    }
}

impl FineTuneConfig {
    fn pipeline_config(&self, seed: u64) -> PipelineConfig {
        PipelineConfig {
            num_workers: self.num_workers,
            ..PipelineConfig::new(self.image_size, self.batch_size, seed)
        }
    }

    fn phase_config(&self) -> PhaseConfig {
        PhaseConfig::new()
            .with_transfer_learning_rate(self.transfer_learning_rate)
            .with_fine_tune_learning_rate(self.fine_tune_learning_rate)
            .with_fine_tune_momentum(self.fine_tune_momentum)
            .with_freeze_threshold(self.freeze_threshold)
    }
}

/// What the scanners found and the schedule derived from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingPlan {
    pub train:    DatasetSummary,
    pub val:      DatasetSummary,
    pub schedule: EpochSchedule,
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub plan:      TrainingPlan,
    pub classes:   Vec<String>,
    pub transfer:  TrainingHistory,
    pub fine_tune: Option<TrainingHistory>,
    pub saved_to:  Option<PathBuf>,
    pub plots:     Option<PlotFiles>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config:  FineTuneConfig,
    scanner: Box<dyn DatasetScanner>,
}

impl TrainUseCase {
    pub fn new(config: FineTuneConfig) -> Self {
        Self { config, scanner: Box::new(DirectoryScanner::new()) }
    }

    /// Steps 1 and 2: count both trees and fix the epoch schedule.
    pub fn plan(&self) -> Result<TrainingPlan> {
        let cfg   = &self.config;
        let train = self.scanner.scan(&cfg.train_dir)?;
        let val   = self.scanner.scan(&cfg.val_dir)?;

        let schedule = EpochSchedule::new(
            cfg.nb_epoch,
            train.sample_count,
            val.sample_count,
            cfg.batch_size,
            cfg.validation_steps,
        );

        tracing::info!(
            "Train: {} samples in {} classes, val: {} samples in {} classes",
            train.sample_count, train.class_count, val.sample_count, val.class_count
        );
        tracing::info!(
            "Schedule: {} epochs × {} steps, {} validation steps",
            schedule.epochs, schedule.steps_per_epoch, schedule.validation_steps
        );

        Ok(TrainingPlan { train, val, schedule })
    }

    /// Run the whole pipeline on the default training backend.
    pub fn execute(&self) -> Result<TrainReport> {
        tracing::info!("Using backend: {}", backend_name());
        self.execute_on::<TrainingBackend>(default_device())
    }

    pub fn execute_on<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainReport> {
        let cfg = &self.config;

        if (cfg.image_size as usize) < MIN_INPUT_SIZE {
            anyhow::bail!("Image size {} is too small; InceptionV3 needs at least {MIN_INPUT_SIZE}", cfg.image_size);
        }

        // ── Steps 1-2: Scan and schedule ──────────────────────────────────────
        let plan = self.plan()?;
        if plan.val.is_empty() {
            tracing::warn!(
                "'{}' has no validation samples; val_loss and val_acc will be undefined",
                cfg.val_dir.display()
            );
        }
        if plan.schedule.steps_per_epoch == 0 {
            anyhow::bail!(
                "'{}' has {} samples in {} classes, fewer than one batch of {}: no training steps per epoch",
                cfg.train_dir.display(),
                plan.train.sample_count,
                plan.train.class_count,
                cfg.batch_size
            );
        }

        // ── Step 3: Pipelines (validation reuses the training classes) ────────
        let train_pipe = DataPipeline::flow_from_directory(&cfg.train_dir, None, cfg.pipeline_config(cfg.seed))?;
        let classes    = train_pipe.classes().to_vec();
        let val_pipe   = DataPipeline::flow_from_directory(
            &cfg.val_dir,
            Some(&classes),
            cfg.pipeline_config(cfg.seed.wrapping_add(1)),
        )?;

        // ── Step 4: Class weights ─────────────────────────────────────────────
        let weights = class_weights(&train_pipe.folder().class_counts(), cfg.class_weight);
        if let Some(w) = &weights {
            tracing::info!("Class weights: {:?}", w);
        }

        // ── Step 5: Model ─────────────────────────────────────────────────────
        let (model, resume) = match &cfg.restore_from {
            Some(path) => self.restore_model::<B>(path, &classes, &device)?,
            None       => (self.pretrained_model::<B>(classes.len(), &device)?, None),
        };
        tracing::info!("Model ready: {} layers, {} classes", model.layer_count(), model.num_classes());

        let mut controller = TrainingController::new(model, device.clone(), plan.schedule, cfg.phase_config())
            .with_class_weights(weights)
            .with_optimizer_state(resume);
        if let Some(csv) = &cfg.metrics_csv {
            controller = controller.with_sink(Box::new(MetricsLogger::new(csv)?));
        }

        // ── Steps 6-7: Transfer learning, then fine-tuning ────────────────────
        let PhaseOutcome { model, optimizer, transfer, fine_tune, phases } =
            self.run_phases(controller, &train_pipe, &val_pipe, &device)?;

        // ── Step 8: Save ──────────────────────────────────────────────────────
        let saved_to = if cfg.save_to_file {
            self.save::<B>(&model, optimizer, &classes, phases)?;
            Some(cfg.output_model_file.clone())
        } else {
            None
        };

        // ── Step 9: Plot (fine-tuning history only) ───────────────────────────
        let plots = if cfg.plot {
            plot_fine_tuning(fine_tune.as_ref(), &cfg.plot_dir)?
        } else {
            None
        };

        Ok(TrainReport { plan, classes, transfer, fine_tune, saved_to, plots })
    }

    // Each model-holding step lives in its own frame and hands the model
    // on boxed: a full InceptionV3 is too large to keep several copies of
    // in one stack frame.

    fn model_config(&self, num_classes: usize) -> FineTuneModelConfig {
        FineTuneModelConfig::new(num_classes)
            .with_fc_size(self.config.fc_size)
            .with_dropout(self.config.dropout)
    }

    /// Fresh head on the ImageNet backbone.
    fn pretrained_model<B: AutodiffBackend>(
        &self,
        num_classes: usize,
        device:      &B::Device,
    ) -> Result<Box<FineTuneModel<B>>> {
        let provider = TorchvisionWeights::new(&self.config.weights_dir);
        tracing::info!("Loading backbone {}", <TorchvisionWeights as WeightsProvider<B>>::describe(&provider));

        let backbone = provider.load_backbone(InceptionV3Config::new().init::<B>(device), device)?;
        Ok(Box::new(self.model_config(num_classes).build(backbone, device)?))
    }

    /// A model saved by an earlier run, with its optimiser state if any.
    fn restore_model<B: AutodiffBackend>(
        &self,
        path:    &Path,
        classes: &[String],
        device:  &B::Device,
    ) -> Result<(Box<FineTuneModel<B>>, Option<OptimizerState<B>>)> {
        let store    = ModelStore::new(path);
        let manifest = store.check_classes(classes)?;

        let model = self.model_config(classes.len()).build(InceptionV3Config::new().init::<B>(device), device)?;
        tracing::info!("Restoring weights from '{}'", path.display());
        let model = Box::new(store.load_model::<B, _>(model, device)?);

        let resume = manifest
            .optimizer
            .as_ref()
            .map(|saved| store.load_optimizer::<B>(saved, device))
            .transpose()?;
        Ok((model, resume))
    }

    fn run_phases<B: AutodiffBackend>(
        &self,
        mut controller: TrainingController<B>,
        train_pipe:     &DataPipeline,
        val_pipe:       &DataPipeline,
        device:         &B::Device,
    ) -> Result<PhaseOutcome<B>> {
        // Both streams live for the whole run and are shared by the phases
        let train_loader = train_pipe.loader::<B>(device);
        let val_loader   = val_pipe.loader::<B::InnerBackend>(device);
        let mut train_stream = BatchStream::new(&train_loader);
        let mut val_stream   = BatchStream::new(&val_loader);

        controller.setup_transfer_learning()?;
        let transfer = controller.fit(&mut train_stream, &mut val_stream)?;
        let mut phases = vec![TrainingPhase::TransferLearning];

        let fine_tune = if self.config.fine_tune {
            controller.setup_fine_tuning()?;
            let history = controller.fit(&mut train_stream, &mut val_stream)?;
            phases.push(TrainingPhase::FineTuning);
            Some(history)
        } else {
            None
        };

        controller.finish()?;
        let (model, optimizer) = controller.into_parts();
        Ok(PhaseOutcome { model, optimizer, transfer, fine_tune, phases })
    }

    /// Weights, last optimiser state and manifest.
    fn save<B: AutodiffBackend>(
        &self,
        model:     &FineTuneModel<B>,
        optimizer: Option<OptimizerState<B>>,
        classes:   &[String],
        phases:    Vec<TrainingPhase>,
    ) -> Result<()> {
        let cfg   = &self.config;
        let store = ModelStore::new(&cfg.output_model_file);

        store.save_model::<B, _>(model)?;
        let optimizer = optimizer.map(|state| store.save_optimizer(state)).transpose()?;
        store.save_manifest(&ModelManifest {
            architecture: ARCHITECTURE.to_string(),
            classes:      classes.to_vec(),
            fc_size:      cfg.fc_size,
            dropout:      cfg.dropout,
            image_size:   cfg.image_size,
            phases,
            optimizer,
            run:          Some(cfg.clone()),
        })?;

        tracing::info!("Model saved to '{}'", cfg.output_model_file.display());
        Ok(())
    }
}

/// What the training phases leave behind.
struct PhaseOutcome<B: AutodiffBackend> {
    model:     Box<FineTuneModel<B>>,
    optimizer: Option<OptimizerState<B>>,
    transfer:  TrainingHistory,
    fine_tune: Option<TrainingHistory>,
    phases:    Vec<TrainingPhase>,
}

/// Plot the fine-tuning curves, or say why there is nothing to plot.
fn plot_fine_tuning(history: Option<&TrainingHistory>, dir: &Path) -> Result<Option<PlotFiles>> {
    match history {
        None => {
            tracing::warn!("--plot has no effect without --fine_tune");
            Ok(None)
        }
        Some(h) if h.is_empty() => {
            tracing::warn!("Fine-tuning ran no epochs; skipping --plot");
            Ok(None)
        }
        Some(h) => plot_history(h, dir).map(Some),
    }
}

/// Both directories exist (checked before anything else is built).
pub fn directories_exist(train_dir: &Path, val_dir: &Path) -> bool {
    train_dir.exists() && val_dir.exists()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn tree(classes: &[(&str, usize)]) -> TempDir {
        let dir = tempdir().unwrap();
        for (name, n) in classes {
            let class_dir = dir.path().join(name);
            fs::create_dir_all(&class_dir).unwrap();
            for i in 0..*n {
                fs::write(class_dir.join(format!("{i}.jpg")), b"x").unwrap();
            }
        }
        dir
    }

    #[test]
    fn test_plan_cat_dog() {
        let train = tree(&[("cat", 50), ("dog", 50)]);
        let val   = tree(&[("cat", 10), ("dog", 10)]);

        let use_case = TrainUseCase::new(FineTuneConfig {
            train_dir:  train.path().to_path_buf(),
            val_dir:    val.path().to_path_buf(),
            nb_epoch:   3,
            batch_size: 10,
            ..FineTuneConfig::default()
        });

        let plan = use_case.plan().unwrap();
        assert_eq!(plan.train, DatasetSummary::new(100, 2));
        assert_eq!(plan.val, DatasetSummary::new(20, 2));
        assert_eq!(plan.schedule.epochs, 3);
        assert_eq!(plan.schedule.steps_per_epoch, 10);
        assert_eq!(plan.schedule.validation_steps, 10.0);
    }

    #[test]
    fn test_plan_floored_validation_steps() {
        let train = tree(&[("a", 7)]);
        let val   = tree(&[("a", 25)]);

        let use_case = TrainUseCase::new(FineTuneConfig {
            train_dir:        train.path().to_path_buf(),
            val_dir:          val.path().to_path_buf(),
            batch_size:       10,
            validation_steps: ValidationStepsMode::Floored,
            ..FineTuneConfig::default()
        });

        let plan = use_case.plan().unwrap();
        assert_eq!(plan.schedule.steps_per_epoch, 0);
        assert_eq!(plan.schedule.validation_steps, 2.0);
    }

    type TestBackend = burn::backend::Autodiff<burn::backend::NdArray>;

    /// Run a use case on a thread with the default 2 MiB test stack,
    /// whatever RUST_MIN_STACK says.
    fn execute_on_small_stack(config: FineTuneConfig) -> Result<TrainReport> {
        std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || TrainUseCase::new(config).execute_on::<TestBackend>(Default::default()))
            .unwrap()
            .join()
            .unwrap()
    }

    #[test]
    fn test_too_few_samples_fails_before_training() {
        let train = tree(&[("cat", 3), ("dog", 3)]);
        let val   = tree(&[("cat", 2)]);

        let err = execute_on_small_stack(FineTuneConfig {
            train_dir:  train.path().to_path_buf(),
            val_dir:    val.path().to_path_buf(),
            batch_size: 64,
            ..FineTuneConfig::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("no training steps"));
    }

    #[test]
    fn test_tiny_image_size_rejected() {
        let err = execute_on_small_stack(FineTuneConfig { image_size: 32, ..FineTuneConfig::default() })
            .unwrap_err();
        assert!(err.to_string().contains("too small"));
    }

    #[test]
    fn test_missing_weights_fail_after_pipelines_are_built() {
        let train   = tree(&[("cat", 3), ("dog", 3)]);
        let val     = tree(&[("cat", 2), ("dog", 2)]);
        let weights = tempdir().unwrap();

        let err = execute_on_small_stack(FineTuneConfig {
            train_dir:   train.path().to_path_buf(),
            val_dir:     val.path().to_path_buf(),
            batch_size:  2,
            weights_dir: weights.path().to_path_buf(),
            ..FineTuneConfig::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("Pretrained weights not found"));
    }

    #[test]
    fn test_directories_exist() {
        let dir = tempdir().unwrap();
        assert!(directories_exist(dir.path(), dir.path()));
        assert!(!directories_exist(dir.path(), &dir.path().join("missing")));
    }

    #[test]
    fn test_plot_skipped_without_epochs_or_fine_tuning() {
        let dir   = tempdir().unwrap();
        let empty = TrainingHistory::new(TrainingPhase::FineTuning);

        assert!(plot_fine_tuning(Some(&empty), dir.path()).unwrap().is_none());
        assert!(plot_fine_tuning(None, dir.path()).unwrap().is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_config_json_round_trip() {
        let cfg = FineTuneConfig { fine_tune: true, seed: 7, ..FineTuneConfig::default() };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: FineTuneConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
