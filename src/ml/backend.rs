// ============================================================
// Layer 5 — Backend Selection
// ============================================================
// Training needs gradients, so the model runs on
// Autodiff<DefaultBackend>; validation runs on the inner
// backend returned by model.valid().
//
//   default           → Wgpu   (GPU through Vulkan / Metal / DX12)
//   --features ndarray → NdArray (pure-CPU fallback)

use burn::backend::Autodiff;

#[cfg(not(feature = "ndarray"))]
pub type DefaultBackend = burn::backend::Wgpu;

#[cfg(feature = "ndarray")]
pub type DefaultBackend = burn::backend::NdArray;

/// The autodiff backend used for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

pub fn default_device() -> <DefaultBackend as burn::tensor::backend::Backend>::Device {
    Default::default()
}

/// Human-readable backend name for the startup log
pub fn backend_name() -> &'static str {
    #[cfg(not(feature = "ndarray"))]
    {
        "WGPU"
    }
    #[cfg(feature = "ndarray")]
    {
        "NdArray (CPU)"
    }
}
