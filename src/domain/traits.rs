// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer talks to the filesystem and to the
// metrics sinks only through these traits. That keeps the
// orchestration testable with in-memory fakes:
//   - DirectoryScanner implements DatasetScanner
//   - MetricsLogger implements HistorySink
//   - tests collect rows in a shared in-memory sink
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::path::Path;

use crate::domain::{
    dataset::DatasetSummary,
    history::{EpochMetrics, TrainingPhase},
};

// ─── DatasetScanner ───────────────────────────────────────────────────────────
/// Anything that can count classes and samples below a dataset root.
pub trait DatasetScanner {
    /// A root that does not exist yields an all-zero summary.
    fn scan(&self, root: &Path) -> Result<DatasetSummary>;
}

// ─── HistorySink ──────────────────────────────────────────────────────────────
/// Receives each epoch's metrics as soon as the epoch finishes.
pub trait HistorySink {
    fn record(&mut self, phase: TrainingPhase, metrics: &EpochMetrics) -> Result<()>;
}
