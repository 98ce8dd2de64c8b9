// ============================================================
// Layer 3 — Epoch Schedule
// ============================================================
// Both training phases run the same schedule:
//
//   steps_per_epoch  = floor(train_samples / batch_size)
//   validation_steps = val_samples / 2          (inherited)
//                    = floor(val_samples / batch_size)   (corrected)
//
// The inherited validation formula divides by 2 instead of the
// batch size and does not floor. It is kept as the default so runs
// behave like the program this tool replaces; the corrected mode is
// opt-in via --floor_val_steps.
//
// A fractional validation step count s runs ceil(s) batches: the
// evaluation loop keeps pulling batches while steps_done < s.

use serde::{Deserialize, Serialize};

/// How the number of validation steps is derived from the sample count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValidationStepsMode {
    /// val_samples / 2, true division
    #[default]
    Inherited,

    /// floor(val_samples / batch_size)
    Floored,
}

/// Number of gradient updates in one epoch.
pub fn steps_per_epoch(train_samples: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    train_samples / batch_size
}

/// Validation step count as the evaluation loop sees it.
pub fn validation_steps(val_samples: usize, batch_size: usize, mode: ValidationStepsMode) -> f64 {
    match mode {
        ValidationStepsMode::Inherited => val_samples as f64 / 2.0,
        ValidationStepsMode::Floored if batch_size == 0 => 0.0,
        ValidationStepsMode::Floored => (val_samples / batch_size) as f64,
    }
}

/// Batches actually pulled for a (possibly fractional) step count.
pub fn validation_batches(steps: f64) -> usize {
    if steps <= 0.0 {
        0
    } else {
        steps.ceil() as usize
    }
}

/// The fixed schedule shared by the transfer-learning and fine-tuning phases.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochSchedule {
    pub epochs:           usize,
    pub steps_per_epoch:  usize,
    pub validation_steps: f64,
}

impl EpochSchedule {
    pub fn new(
        epochs:        usize,
        train_samples: usize,
        val_samples:   usize,
        batch_size:    usize,
        mode:          ValidationStepsMode,
    ) -> Self {
        Self {
            epochs,
            steps_per_epoch:  steps_per_epoch(train_samples, batch_size),
            validation_steps: validation_steps(val_samples, batch_size, mode),
        }
    }

    pub fn validation_batches(&self) -> usize {
        validation_batches(self.validation_steps)
    }
}
