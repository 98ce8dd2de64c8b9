// ============================================================
// Layer 3 — Class Weights
// ============================================================
// Imbalanced datasets bias the classifier towards the majority
// class. In "auto" mode every class gets the balanced weight
//
//   w_c = total_samples / (num_classes * count_c)
//
// so the weighted loss contributes equally per class. A class
// with no images keeps weight 1.0.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum ClassWeightMode {
    /// Balanced inverse-frequency weights
    #[default]
    Auto,

    /// Every class weighs 1.0
    None,
}

/// Per-class loss weights, or `None` when the loss should stay unweighted.
pub fn class_weights(counts: &[usize], mode: ClassWeightMode) -> Option<Vec<f32>> {
    match mode {
        ClassWeightMode::None => None,
        ClassWeightMode::Auto => {
            let total: usize = counts.iter().sum();
            if counts.is_empty() || total == 0 {
                return None;
            }
            let k = counts.len() as f32;
            Some(
                counts
                    .iter()
                    .map(|&c| if c == 0 { 1.0 } else { total as f32 / (k * c as f32) })
                    .collect(),
            )
        }
    }
}
