// ============================================================
// Layer 3 — Dataset Summary
// ============================================================
// What the directory scanner learns about an image folder tree:
//
//   root/
//     cat/   ← class 0
//       001.jpg  ← sample
//     dog/   ← class 1
//       001.jpg
//
// Counts are derived from the filesystem on every run and never
// stored anywhere else.

use serde::{Deserialize, Serialize};

/// Class and sample counts of one dataset root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Files found (recursively) below the class directories
    pub sample_count: usize,

    /// Number of immediate subdirectories of the root
    pub class_count: usize,
}

impl DatasetSummary {
    pub fn new(sample_count: usize, class_count: usize) -> Self {
        Self { sample_count, class_count }
    }

    /// A tree without class directories cannot feed a classifier.
    pub fn is_empty(&self) -> bool {
        self.class_count == 0 || self.sample_count == 0
    }
}
