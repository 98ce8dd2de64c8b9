// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from an image directory tree
// all the way to GPU-ready tensor batches.
//
// The pipeline flows in this order:
//
//   root/<class>/<image files>
//       │
//       ├──► DirectoryScanner → class / sample counts (schedule)
//       │
//       ▼
//   ImageFolder       → sorted classes, (path, label) samples
//       │
//       ▼
//   preprocess        → decode + resize to 299×299
//       │
//       ▼
//   augment           → random rotation / shift / shear / zoom / flip
//       │
//       ▼
//   preprocess        → x / 127.5 - 1, channel-first
//       │
//       ▼
//   ImageDataset      → Burn Dataset: one decoded, augmented
//       │               sample per get()
//       ▼
//   ImageBatcher      → stacks samples into tensor batches
//       │
//       ▼
//   DataPipeline      → Burn DataLoader, re-iterated forever
//
// Each module is responsible for exactly one step.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Counts classes and files below a dataset root
pub mod scanner;

/// Class-per-directory image index
pub mod folder;

/// Image decoding, resizing and InceptionV3 normalisation
pub mod preprocess;

/// Random geometric transforms
pub mod augment;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Implements Burn's Dataset trait over an image folder
pub mod dataset;

/// DataLoader construction and the endlessly cycling batch stream
pub mod pipeline;
