// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that writes run artefacts to disk:
//
//   checkpoint.rs — Saving and restoring the trained model and
//                   its optimiser state (Burn named MessagePack
//                   records) plus a JSON manifest with the class
//                   names and run config.
//
//   metrics.rs    — Per-epoch metrics of both phases appended
//                   to a CSV file.
//
//   plot.rs       — Accuracy and loss curves of the fine-tuning
//                   phase rendered to PNG with plotters.
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model file, optimiser file and manifest
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// History plots
pub mod plot;
