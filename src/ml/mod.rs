// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model-side Burn code lives here: the network, its layer
// numbering and freezing, the pretrained weights, and the
// two-phase training loop.
//
//   backend.rs   — Wgpu by default, NdArray with --features ndarray
//
//   freeze.rs    — Canonical layer indices and the freeze policies
//                  that flip each layer's trainable flag
//
//   inception.rs — Native InceptionV3 backbone (stem + mixed_5b
//                  .. mixed_7c), torchvision field names
//
//   weights.rs   — ImageNet weights from a torchvision checkpoint
//
//   model.rs     — Backbone + new classification head
//                  (GAP → dense → dropout → dense → dense)
//
//   trainer.rs   — Transfer learning (Adam) then optional
//                  fine-tuning (SGD + momentum)
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Szegedy et al. (2016) Rethinking the Inception Architecture

pub mod backend;

/// Layer indexing and trainable flags
pub mod freeze;

/// InceptionV3 backbone
pub mod inception;

/// Pretrained backbone weights
pub mod weights;

/// Fine-tuning model: backbone + classification head
pub mod model;

/// Two-phase training controller
pub mod trainer;
