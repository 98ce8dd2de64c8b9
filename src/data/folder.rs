// ============================================================
// Layer 4 — Image Folder
// ============================================================
// Turns a class-per-subdirectory tree into a flat list of
// (path, label) samples.
//
//   - class names are the subdirectory names, sorted
//     alphabetically; label = position in that sorted list
//   - only files with an image extension become samples
//   - the validation folder reuses the training folder's class
//     list so that label i means the same class in both

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Extensions (lower case) accepted as images.
pub const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "ppm", "tif", "tiff"];

/// One image on disk together with its class index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSample {
    pub path:  PathBuf,
    pub label: usize,
}

/// All samples of one dataset root.
#[derive(Debug, Clone)]
pub struct ImageFolder {
    root:    PathBuf,
    classes: Vec<String>,
    samples: Vec<FolderSample>,
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

/// Sorted names of the immediate subdirectories of `root`.
pub fn class_names(root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let entries = fs::read_dir(root)
        .with_context(|| format!("Cannot list dataset directory '{}'", root.display()))?;

    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

impl ImageFolder {
    /// Discover the classes from the directory itself.
    pub fn discover(root: impl AsRef<Path>) -> Result<Self> {
        let root    = root.as_ref();
        let classes = class_names(root)?;
        Self::with_classes(root, &classes)
    }

    /// Index `root` against a fixed class list. Subdirectories not in
    /// the list are skipped with a warning.
    pub fn with_classes(root: impl AsRef<Path>, classes: &[String]) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        for found in class_names(&root)? {
            if !classes.contains(&found) {
                tracing::warn!(
                    "Skipping '{}' in '{}': not a training class",
                    found,
                    root.display()
                );
            }
        }

        let mut samples = Vec::new();
        for (label, class) in classes.iter().enumerate() {
            let class_dir = root.join(class);
            if !class_dir.is_dir() {
                continue;
            }

            // sort_by_file_name keeps the sample order stable across runs
            for entry in WalkDir::new(&class_dir)
                .min_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() && is_image_file(entry.path()) {
                    samples.push(FolderSample { path: entry.into_path(), label });
                }
            }
        }

        tracing::debug!(
            "Indexed {} images belonging to {} classes in '{}'",
            samples.len(),
            classes.len(),
            root.display()
        );

        Ok(Self { root, classes: classes.to_vec(), samples })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn samples(&self) -> &[FolderSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of images per class, indexed by label.
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.classes.len()];
        for s in &self.samples {
            counts[s.label] += 1;
        }
        counts
    }
}
