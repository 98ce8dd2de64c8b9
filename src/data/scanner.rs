// ============================================================
// Layer 4 — Directory Scanner
// ============================================================
// Counts the classes and samples of a dataset root:
//
//   classes = immediate subdirectories of the root
//   samples = every file found recursively below those
//             subdirectories (any extension)
//
// Files sitting directly in the root are ignored. A root that
// does not exist counts as empty; the CLI checks existence
// before training ever starts.

use anyhow::{Context, Result};
use std::{fs, path::Path};
use walkdir::WalkDir;

use crate::domain::{dataset::DatasetSummary, traits::DatasetScanner};

/// Filesystem-backed DatasetScanner.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryScanner;

impl DirectoryScanner {
    pub fn new() -> Self {
        Self
    }
}

impl DatasetScanner for DirectoryScanner {
    fn scan(&self, root: &Path) -> Result<DatasetSummary> {
        if !root.is_dir() {
            return Ok(DatasetSummary::default());
        }

        let mut class_count  = 0;
        let mut sample_count = 0;

        let entries = fs::read_dir(root)
            .with_context(|| format!("Cannot list '{}'", root.display()))?;

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            class_count += 1;

            // Every regular file at any depth below the class dir
            sample_count += WalkDir::new(entry.path())
                .min_depth(1)
                .into_iter()
                .filter_map(|e| match e {
                    Ok(e) => Some(e),
                    Err(err) => {
                        tracing::warn!("Skipping unreadable entry: {err}");
                        None
                    }
                })
                .filter(|e| e.file_type().is_file())
                .count();
        }

        tracing::debug!(
            "Scanned '{}': {} classes, {} samples",
            root.display(),
            class_count,
            sample_count
        );

        Ok(DatasetSummary::new(sample_count, class_count))
    }
}
