// ============================================================
// Layer 1 — CLI Arguments
// ============================================================
// Every flag of a fine-tuning run. Flag names keep their
// underscores (--train_dir, --nb_epoch, ...).
//
// --train_dir and --val_dir are Options rather than required
// clap args: a missing directory must print the help text and
// exit with status 1, which clap's own error path (status 2)
// does not do.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::Args;
use std::path::PathBuf;

use crate::application::train_use_case::FineTuneConfig;
use crate::domain::{class_weights::ClassWeightMode, schedule::ValidationStepsMode};

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Training root: one subdirectory per class
    #[arg(long = "train_dir", value_name = "DIR")]
    pub train_dir: Option<PathBuf>,

    /// Validation root: one subdirectory per class
    #[arg(long = "val_dir", value_name = "DIR")]
    pub val_dir: Option<PathBuf>,

    /// Epochs per training phase
    #[arg(long = "nb_epoch", default_value_t = 10)]
    pub nb_epoch: usize,

    #[arg(long = "batch_size", default_value_t = 64)]
    pub batch_size: usize,

    /// Where --save_to_file writes the model
    #[arg(long = "output_model_file", default_value = "inceptionv3-ft.model")]
    pub output_model_file: PathBuf,

    /// Run the fine-tuning phase after transfer learning
    #[arg(long = "fine_tune")]
    pub fine_tune: bool,

    /// Save the trained model to --output_model_file
    #[arg(long = "save_to_file")]
    pub save_to_file: bool,

    /// Plot the fine-tuning accuracy and loss curves
    #[arg(long = "plot")]
    pub plot: bool,

    /// Directory holding inception_v3_imagenet.pth
    #[arg(long = "weights_dir", default_value = "weights")]
    pub weights_dir: PathBuf,

    /// Width of the two hidden dense layers of the head
    #[arg(long = "fc_size", default_value_t = 20)]
    pub fc_size: usize,

    /// Class imbalance weighting of the training loss
    #[arg(long = "class_weight", value_enum, default_value_t = ClassWeightMode::Auto)]
    pub class_weight: ClassWeightMode,

    /// Use floor(val_samples / batch_size) validation steps instead of val_samples / 2
    #[arg(long = "floor_val_steps")]
    pub floor_val_steps: bool,

    /// Start from a model previously saved with --save_to_file
    #[arg(long = "restore_from", value_name = "FILE")]
    pub restore_from: Option<PathBuf>,

    /// Append per-epoch metrics to this CSV file
    #[arg(long = "metrics_csv", value_name = "FILE")]
    pub metrics_csv: Option<PathBuf>,

    /// Directory for the --plot PNG files
    #[arg(long = "plot_dir", default_value = ".")]
    pub plot_dir: PathBuf,

    /// Seed for shuffling and augmentation
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,
}

/// Layer 1 → Layer 2 boundary; the application never sees clap types.
///
/// Both directories must have been checked for presence first.
impl From<TrainArgs> for FineTuneConfig {
    fn from(a: TrainArgs) -> Self {
        let defaults = FineTuneConfig::default();
        FineTuneConfig {
            train_dir:         a.train_dir.unwrap_or(defaults.train_dir.clone()),
            val_dir:           a.val_dir.unwrap_or(defaults.val_dir.clone()),
            nb_epoch:          a.nb_epoch,
            batch_size:        a.batch_size,
            output_model_file: a.output_model_file,
            fine_tune:         a.fine_tune,
            save_to_file:      a.save_to_file,
            plot:              a.plot,
            fc_size:           a.fc_size,
            validation_steps:  if a.floor_val_steps {
                ValidationStepsMode::Floored
            } else {
                ValidationStepsMode::Inherited
            },
            class_weight:      a.class_weight,
            weights_dir:       a.weights_dir,
            restore_from:      a.restore_from,
            metrics_csv:       a.metrics_csv,
            plot_dir:          a.plot_dir,
            seed:              a.seed,
            ..defaults
        }
    }
}
