// ============================================================
// Layer 5 — Layer Indexing and Freezing
// ============================================================
// Every layer of the network has a position in one flat list:
//
//   0            input
//   1 ..= 310    backbone  (conv, bn, relu per conv unit;
//                           one entry per pool / concat)
//   311 ..= 315  head      (avg-pool, dense, dropout, dense, dense)
//
// Only conv, batch-norm and dense layers own parameters, so only
// those can be frozen. Freezing a layer means its parameters
// stop requiring gradients: the autodiff graph does not track
// them and the optimiser never sees a gradient for them.
//
// Two policies are used by the training phases:
//
//   FreezeBackbone   → every backbone layer frozen, head trainable
//   FreezeBelow(t)   → trainable iff index >= t, anywhere

use burn::{
    nn::{conv::Conv2d, BatchNorm, Linear},
    prelude::*,
};
use serde::{Deserialize, Serialize};

/// Index of the input layer; the first real layer is 1.
pub const INPUT_LAYER: usize = 0;

// ─── LayerCursor ──────────────────────────────────────────────────────────────
/// Hands out consecutive layer indices while the network is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerCursor {
    next: usize,
}

impl Default for LayerCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerCursor {
    pub fn new() -> Self {
        Self { next: INPUT_LAYER + 1 }
    }

    /// Conv + batch-norm + activation: returns the conv's index.
    pub fn conv_unit(&mut self) -> usize {
        let index = self.next;
        self.next += 3;
        index
    }

    /// Pool, concat, dropout, dense: one index.
    pub fn single(&mut self) -> usize {
        let index = self.next;
        self.next += 1;
        index
    }

    /// Index the next layer would get; equals the number of layers so far.
    pub fn position(&self) -> usize {
        self.next
    }
}

// ─── FreezePolicy ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FreezePolicy {
    /// Transfer learning: only layers outside the backbone train
    FreezeBackbone,

    /// Fine-tuning: layers at or above the threshold train
    FreezeBelow(usize),
}

impl FreezePolicy {
    pub fn is_trainable(&self, index: usize, in_backbone: bool) -> bool {
        match *self {
            FreezePolicy::FreezeBackbone   => !in_backbone,
            FreezePolicy::FreezeBelow(min) => index >= min,
        }
    }
}

// ─── LayerFlag ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    Conv,
    BatchNorm,
    Dense,
}

/// Trainable state of one parameter-owning layer, as read back from
/// the parameters themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerFlag {
    pub index:       usize,
    pub kind:        LayerKind,
    pub in_backbone: bool,
    pub trainable:   bool,
}

// ─── Parameter helpers ────────────────────────────────────────────────────────
// Gradient tracking lives on the parameter tensors, so each layer
// type gets a small helper that rewrites its Param fields.

pub fn set_conv_trainable<B: Backend>(mut conv: Conv2d<B>, trainable: bool) -> Conv2d<B> {
    conv.weight = conv.weight.set_require_grad(trainable);
    conv.bias   = conv.bias.map(|b| b.set_require_grad(trainable));
    conv
}

pub fn set_bn_trainable<B: Backend>(mut bn: BatchNorm<B, 2>, trainable: bool) -> BatchNorm<B, 2> {
    bn.gamma = bn.gamma.set_require_grad(trainable);
    bn.beta  = bn.beta.set_require_grad(trainable);
    bn
}

pub fn set_linear_trainable<B: Backend>(mut linear: Linear<B>, trainable: bool) -> Linear<B> {
    linear.weight = linear.weight.set_require_grad(trainable);
    linear.bias   = linear.bias.map(|b| b.set_require_grad(trainable));
    linear
}

pub fn conv_is_trainable<B: Backend>(conv: &Conv2d<B>) -> bool {
    conv.weight.val().is_require_grad()
}

pub fn bn_is_trainable<B: Backend>(bn: &BatchNorm<B, 2>) -> bool {
    bn.gamma.val().is_require_grad()
}

pub fn linear_is_trainable<B: Backend>(linear: &Linear<B>) -> bool {
    linear.weight.val().is_require_grad()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        nn::{conv::Conv2dConfig, BatchNormConfig, LinearConfig},
    };

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_cursor_counts_conv_units_as_three() {
        let mut c = LayerCursor::new();
        assert_eq!(c.conv_unit(), 1);
        assert_eq!(c.conv_unit(), 4);
        assert_eq!(c.single(), 7);
        assert_eq!(c.position(), 8);
    }

    #[test]
    fn test_freeze_backbone_policy() {
        let p = FreezePolicy::FreezeBackbone;
        assert!(!p.is_trainable(5, true));
        assert!(!p.is_trainable(310, true));
        assert!(p.is_trainable(312, false));
    }

    #[test]
    fn test_freeze_below_threshold() {
        let p = FreezePolicy::FreezeBelow(172);
        assert!(!p.is_trainable(171, true));
        assert!(p.is_trainable(172, true));
        assert!(p.is_trainable(315, false));
    }

    #[test]
    fn test_param_flags_round_trip() {
        let device = Default::default();
        let conv   = Conv2dConfig::new([3, 4], [1, 1]).init::<TestBackend>(&device);
        let bn     = BatchNormConfig::new(4).init::<TestBackend, 2>(&device);
        let linear = LinearConfig::new(4, 2).init::<TestBackend>(&device);

        let conv = set_conv_trainable(conv, false);
        let bn   = set_bn_trainable(bn, false);
        assert!(!conv_is_trainable(&conv));
        assert!(!bn_is_trainable(&bn));
        assert!(linear_is_trainable(&linear));

        let conv   = set_conv_trainable(conv, true);
        let linear = set_linear_trainable(linear, false);
        assert!(conv_is_trainable(&conv));
        assert!(!linear_is_trainable(&linear));
    }
}
