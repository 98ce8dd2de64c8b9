// ============================================================
// Layer 3 — Training History
// ============================================================
// Every epoch of every phase produces one EpochMetrics row:
//
//   loss, accuracy          ← averaged over the training steps
//   val_loss, val_accuracy  ← averaged over the validation batches
//
// A TrainingHistory holds the rows of ONE phase. The plotter
// only ever reads the fine-tuning history; the transfer-learning
// history is logged and then dropped.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two training phases of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingPhase {
    /// Backbone frozen, only the new head learns (Adam)
    TransferLearning,

    /// Top of the backbone unfrozen together with the head (SGD)
    FineTuning,
}

impl TrainingPhase {
    /// Short tag used in logs and the metrics CSV
    pub fn tag(&self) -> &'static str {
        match self {
            TrainingPhase::TransferLearning => "transfer",
            TrainingPhase::FineTuning       => "finetune",
        }
    }
}

impl fmt::Display for TrainingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One row of metrics for a single epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Epoch number, starts at 1
    pub epoch: usize,

    /// Mean training loss (class-weighted when weights are active)
    pub loss: f64,

    /// Fraction of training samples classified correctly, in [0, 1]
    pub accuracy: f64,

    /// Mean unweighted validation loss
    pub val_loss: f64,

    /// Fraction of validation samples classified correctly, in [0, 1]
    pub val_accuracy: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, loss: f64, accuracy: f64, val_loss: f64, val_accuracy: f64) -> Self {
        Self { epoch, loss, accuracy, val_loss, val_accuracy }
    }
}

/// The per-epoch series recorded by one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub phase:  TrainingPhase,
    pub epochs: Vec<EpochMetrics>,
}

impl TrainingHistory {
    pub fn new(phase: TrainingPhase) -> Self {
        Self { phase, epochs: Vec::new() }
    }

    pub fn record(&mut self, metrics: EpochMetrics) {
        self.epochs.push(metrics);
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    // ── Series accessors (one value per epoch, in epoch order) ──

    pub fn accuracy(&self) -> Vec<f64> {
        self.epochs.iter().map(|m| m.accuracy).collect()
    }

    pub fn val_accuracy(&self) -> Vec<f64> {
        self.epochs.iter().map(|m| m.val_accuracy).collect()
    }

    pub fn loss(&self) -> Vec<f64> {
        self.epochs.iter().map(|m| m.loss).collect()
    }

    pub fn val_loss(&self) -> Vec<f64> {
        self.epochs.iter().map(|m| m.val_loss).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TrainingHistory {
        let mut h = TrainingHistory::new(TrainingPhase::FineTuning);
        h.record(EpochMetrics::new(1, 0.9, 0.55, 0.80, 0.60));
        h.record(EpochMetrics::new(2, 0.6, 0.70, 0.65, 0.72));
        h.record(EpochMetrics::new(3, 0.4, 0.82, 0.70, 0.71));
        h
    }

    #[test]
    fn test_series_follow_epoch_order() {
        let h = sample();
        assert_eq!(h.len(), 3);
        assert_eq!(h.accuracy(), vec![0.55, 0.70, 0.82]);
        assert_eq!(h.val_accuracy(), vec![0.60, 0.72, 0.71]);
        assert_eq!(h.loss(), vec![0.9, 0.6, 0.4]);
        assert_eq!(h.val_loss(), vec![0.80, 0.65, 0.70]);
    }

    #[test]
    fn test_phase_tags() {
        assert_eq!(TrainingPhase::TransferLearning.to_string(), "transfer");
        assert_eq!(TrainingPhase::FineTuning.tag(), "finetune");
    }
}
