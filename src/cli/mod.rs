// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses the command line with clap, validates the two
// directories, and hands a FineTuneConfig to Layer 2.
//
// Exit status:
//   1  a directory flag is missing (help is printed)
//   1  a directory does not exist
//   1  the run failed (main prints the error chain)
//   0  the run finished
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::process::ExitCode;

use crate::application::train_use_case::{directories_exist, FineTuneConfig, TrainReport, TrainUseCase};
use crate::domain::history::TrainingHistory;
use commands::TrainArgs;

#[derive(Parser, Debug)]
#[command(
    name = "inception-ft",
    version,
    about = "Transfer learning and fine-tuning of a pretrained InceptionV3 on an image folder tree."
)]
pub struct Cli {
    #[command(flatten)]
    pub args: TrainArgs,
}

impl Cli {
    pub fn run(self) -> Result<ExitCode> {
        let (Some(train_dir), Some(val_dir)) = (&self.args.train_dir, &self.args.val_dir) else {
            Cli::command().print_help()?;
            println!();
            return Ok(ExitCode::FAILURE);
        };

        if !directories_exist(train_dir, val_dir) {
            println!("directories do not exist");
            return Ok(ExitCode::FAILURE);
        }

        let config: FineTuneConfig = self.args.into();
        tracing::info!(
            "Fine-tuning on '{}' (validation '{}')",
            config.train_dir.display(),
            config.val_dir.display()
        );

        let report = TrainUseCase::new(config).execute()?;
        print_summary(&report);
        Ok(ExitCode::SUCCESS)
    }
}

fn print_summary(report: &TrainReport) {
    print!("{}", summary(report));
}

fn summary(report: &TrainReport) -> String {
    let plan = &report.plan;
    let mut out = format!("\nClasses: {}\n", report.classes.join(", "));
    out += &format!(
        "Samples: {} train / {} val, {} steps per epoch, {} validation steps\n",
        plan.train.sample_count,
        plan.val.sample_count,
        plan.schedule.steps_per_epoch,
        plan.schedule.validation_steps
    );

    let last = |h: &TrainingHistory| h.epochs.last().copied().map(|m| (h.len(), m));
    if let Some((n, m)) = last(&report.transfer) {
        out += &format!(
            "Transfer learning ({n} epochs): val_loss={:.4} val_acc={:.4}\n",
            m.val_loss, m.val_accuracy
        );
    }
    if let Some((n, m)) = report.fine_tune.as_ref().and_then(last) {
        out += &format!(
            "Fine-tuning ({n} epochs): val_loss={:.4} val_acc={:.4}\n",
            m.val_loss, m.val_accuracy
        );
    }
    if let Some(path) = &report.saved_to {
        out += &format!("Model saved to {}\n", path.display());
    }
    if let Some(plots) = &report.plots {
        out += &format!("Plots: {} {}\n", plots.accuracy.display(), plots.loss.display());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainingPlan;
    use crate::domain::{
        dataset::DatasetSummary,
        history::{EpochMetrics, TrainingPhase},
        schedule::{EpochSchedule, ValidationStepsMode},
    };
    use std::path::PathBuf;

    #[test]
    fn test_summary_reports_plan_and_phases() {
        let mut transfer = TrainingHistory::new(TrainingPhase::TransferLearning);
        transfer.record(EpochMetrics::new(1, 0.7, 0.5, 0.6, 0.55));

        let report = TrainReport {
            plan: TrainingPlan {
                train:    DatasetSummary::new(100, 2),
                val:      DatasetSummary::new(20, 2),
                schedule: EpochSchedule::new(1, 100, 20, 10, ValidationStepsMode::Inherited),
            },
            classes:   vec!["cat".into(), "dog".into()],
            transfer,
            fine_tune: None,
            saved_to:  Some(PathBuf::from("out.model")),
            plots:     None,
        };

        let text = summary(&report);
        assert!(text.contains("Classes: cat, dog"));
        assert!(text.contains("100 train / 20 val, 10 steps per epoch, 10 validation steps"));
        assert!(text.contains("Transfer learning (1 epochs): val_loss=0.6000 val_acc=0.5500"));
        assert!(!text.contains("Fine-tuning"));
        assert!(text.contains("Model saved to out.model"));
    }
}
