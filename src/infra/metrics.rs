// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records every finished epoch of both phases to a CSV file.
//
// Example CSV output:
//   phase,epoch,loss,acc,val_loss,val_acc
//   transfer,1,0.693100,0.512000,0.689000,0.540000
//   transfer,2,0.652300,0.611000,0.641200,0.630000
//   finetune,1,0.601000,0.688000,0.598800,0.702000
//
// How to read the metrics:
//   - loss should fall epoch over epoch in both phases
//   - val_loss rising while loss falls → overfitting
//   - a jump at the first finetune row is expected: more layers
//     start moving at once
//
// The header is written only when the file is new, so repeated
// runs append to the same log.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

use crate::domain::{
    history::{EpochMetrics, TrainingPhase},
    traits::HistorySink,
};

pub const CSV_HEADER: &str = "phase,epoch,loss,acc,val_loss,val_acc";

/// Appends epoch metrics to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the file (and its directory) if needed.
    pub fn new(csv_path: impl Into<PathBuf>) -> Result<Self> {
        let csv_path = csv_path.into();

        if let Some(dir) = csv_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create directory '{}'", dir.display()))?;
        }

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create metrics CSV '{}'", csv_path.display()))?;
            writeln!(f, "{CSV_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch as a new row.
    pub fn log(&self, phase: TrainingPhase, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open metrics CSV '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{},{:.6},{:.6},{:.6},{:.6}",
            phase.tag(),
            m.epoch,
            m.loss,
            m.accuracy,
            m.val_loss,
            m.val_accuracy,
        )?;

        tracing::debug!("Logged {} epoch {} metrics", phase, m.epoch);
        Ok(())
    }
}

impl HistorySink for MetricsLogger {
    fn record(&mut self, phase: TrainingPhase, metrics: &EpochMetrics) -> Result<()> {
        self.log(phase, metrics)
    }
}
