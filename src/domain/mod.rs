// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing what a
// fine-tuning run is made of:
//
//   - a dataset summary (how many classes, how many samples)
//   - the epoch schedule derived from those counts
//   - class weights for imbalanced datasets
//   - the per-epoch training history of each phase
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Everything here is unit-testable without a GPU.

// Class / sample counts of an image folder tree
pub mod dataset;

// Steps per epoch and validation step arithmetic
pub mod schedule;

// Balanced ("auto") class weighting
pub mod class_weights;

// Per-epoch metrics grouped by training phase
pub mod history;

// Core abstractions (traits) that other layers implement
pub mod traits;
