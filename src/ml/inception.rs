// ============================================================
// Layer 5 — InceptionV3 Backbone
// ============================================================
// The convolutional part of InceptionV3 (no classifier top):
//
//   input [B, 3, 299, 299]
//     │  stem: 5 conv units + 2 max-pools
//     ▼
//   [B, 192, 35, 35]
//     │  mixed_5b, mixed_5c, mixed_5d   (InceptionA)
//     ▼
//   [B, 288, 35, 35]
//     │  mixed_6a                       (InceptionB, grid reduction)
//     ▼
//   [B, 768, 17, 17]
//     │  mixed_6b .. mixed_6e           (InceptionC, factorised 7×7)
//     ▼
//   [B, 768, 17, 17]
//     │  mixed_7a                       (InceptionD, grid reduction)
//     ▼
//   [B, 1280, 8, 8]
//     │  mixed_7b, mixed_7c             (InceptionE, expanded filters)
//     ▼
//   [B, 2048, 8, 8]
//
// Every convolution is a BasicConv2d unit: conv (no bias) →
// batch-norm (ε = 0.001) → ReLU. Field names follow the
// torchvision layout (conv2d_1a_3x3, mixed_5b.branch1x1, ...)
// so an ImageNet checkpoint maps onto this struct by name.
//
// Layer indices are assigned while building, in construction
// order: stem first, then each block branch by branch, each
// branch from input to output. Block boundaries:
//
//   stem 1..=17   mixed_5b 18..=40   mixed_6a 87..=100
//   mixed_6c ..=164   mixed_6e ..=228   mixed_7a ..=248
//   mixed_7c ..=310
//
// Reference: Szegedy et al. (2016) Rethinking the Inception
//            Architecture for Computer Vision

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AvgPool2d, AvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::ml::freeze::{
    bn_is_trainable, conv_is_trainable, set_bn_trainable, set_conv_trainable,
    FreezePolicy, LayerCursor, LayerFlag, LayerKind,
};

/// Channels of the final feature map.
pub const FEATURE_CHANNELS: usize = 2048;

/// Smallest square input the stride pattern accepts.
pub const MIN_INPUT_SIZE: usize = 75;

// ─── BasicConv2d ──────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BasicConv2d<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn:   BatchNorm<B, 2>,

    /// Layer index of the conv; bn is index + 1, relu index + 2
    pub index: usize,
}

impl<B: Backend> BasicConv2d<B> {
    fn new(
        cursor:  &mut LayerCursor,
        channels: [usize; 2],
        kernel:  [usize; 2],
        stride:  usize,
        padding: [usize; 2],
        device:  &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new(channels, kernel)
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(padding[0], padding[1]))
            .with_bias(false)
            .init(device);
        let bn = BatchNormConfig::new(channels[1]).with_epsilon(1e-3).init(device);

        Self { conv, bn, index: cursor.conv_unit() }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        relu(self.bn.forward(self.conv.forward(x)))
    }

    pub fn with_trainable(self, policy: FreezePolicy) -> Self {
        let conv_on = policy.is_trainable(self.index, true);
        let bn_on   = policy.is_trainable(self.index + 1, true);
        Self {
            conv:  set_conv_trainable(self.conv, conv_on),
            bn:    set_bn_trainable(self.bn, bn_on),
            index: self.index,
        }
    }

    pub fn flags(&self, out: &mut Vec<LayerFlag>) {
        out.push(LayerFlag {
            index:       self.index,
            kind:        LayerKind::Conv,
            in_backbone: true,
            trainable:   conv_is_trainable(&self.conv),
        });
        out.push(LayerFlag {
            index:       self.index + 1,
            kind:        LayerKind::BatchNorm,
            in_backbone: true,
            trainable:   bn_is_trainable(&self.bn),
        });
    }
}

// Shorthands for the conv shapes that repeat throughout the network.
fn conv1x1<B: Backend>(c: &mut LayerCursor, cin: usize, cout: usize, d: &B::Device) -> BasicConv2d<B> {
    BasicConv2d::new(c, [cin, cout], [1, 1], 1, [0, 0], d)
}

fn conv_same<B: Backend>(c: &mut LayerCursor, cin: usize, cout: usize, k: [usize; 2], d: &B::Device) -> BasicConv2d<B> {
    BasicConv2d::new(c, [cin, cout], k, 1, [k[0] / 2, k[1] / 2], d)
}

fn conv3x3_s2<B: Backend>(c: &mut LayerCursor, cin: usize, cout: usize, d: &B::Device) -> BasicConv2d<B> {
    BasicConv2d::new(c, [cin, cout], [3, 3], 2, [0, 0], d)
}

fn avg_pool3x3() -> AvgPool2d {
    AvgPool2dConfig::new([3, 3])
        .with_strides([1, 1])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .init()
}

fn max_pool3x3_s2() -> MaxPool2d {
    MaxPool2dConfig::new([3, 3]).with_strides([2, 2]).init()
}

// ─── Conv unit traversal ──────────────────────────────────────────────────────
/// Uniform access to the conv units of a block, in construction order.
pub trait ConvUnits<B: Backend>: Sized {
    fn map_convs(self, f: &mut impl FnMut(BasicConv2d<B>) -> BasicConv2d<B>) -> Self;
    fn visit_convs(&self, f: &mut impl FnMut(&BasicConv2d<B>));

    fn with_trainable(self, policy: FreezePolicy) -> Self {
        self.map_convs(&mut |unit| unit.with_trainable(policy))
    }

    fn flags(&self, out: &mut Vec<LayerFlag>) {
        self.visit_convs(&mut |unit| unit.flags(out));
    }
}

macro_rules! conv_units {
    ($block:ident { $($field:ident),+ $(,)? }) => {
        impl<B: Backend> ConvUnits<B> for $block<B> {
            fn map_convs(self, f: &mut impl FnMut(BasicConv2d<B>) -> BasicConv2d<B>) -> Self {
                Self { $($field: f(self.$field),)+ ..self }
            }

            fn visit_convs(&self, f: &mut impl FnMut(&BasicConv2d<B>)) {
                $(f(&self.$field);)+
            }
        }
    };
}

// ─── InceptionA (35×35) ───────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct InceptionA<B: Backend> {
    pub branch1x1:       BasicConv2d<B>,
    pub branch5x5_1:     BasicConv2d<B>,
    pub branch5x5_2:     BasicConv2d<B>,
    pub branch3x3dbl_1:  BasicConv2d<B>,
    pub branch3x3dbl_2:  BasicConv2d<B>,
    pub branch3x3dbl_3:  BasicConv2d<B>,
    pub pool:            AvgPool2d,
    pub branch_pool:     BasicConv2d<B>,
}

conv_units!(InceptionA {
    branch1x1, branch5x5_1, branch5x5_2,
    branch3x3dbl_1, branch3x3dbl_2, branch3x3dbl_3, branch_pool,
});

impl<B: Backend> InceptionA<B> {
    fn new(c: &mut LayerCursor, cin: usize, pool_features: usize, d: &B::Device) -> Self {
        let branch1x1      = conv1x1(c, cin, 64, d);
        let branch5x5_1    = conv1x1(c, cin, 48, d);
        let branch5x5_2    = conv_same(c, 48, 64, [5, 5], d);
        let branch3x3dbl_1 = conv1x1(c, cin, 64, d);
        let branch3x3dbl_2 = conv_same(c, 64, 96, [3, 3], d);
        let branch3x3dbl_3 = conv_same(c, 96, 96, [3, 3], d);
        c.single(); // avg pool
        let branch_pool    = conv1x1(c, cin, pool_features, d);
        c.single(); // concat

        Self {
            branch1x1, branch5x5_1, branch5x5_2,
            branch3x3dbl_1, branch3x3dbl_2, branch3x3dbl_3,
            pool: avg_pool3x3(), branch_pool,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let b1 = self.branch1x1.forward(x.clone());
        let b5 = self.branch5x5_2.forward(self.branch5x5_1.forward(x.clone()));
        let b3 = self.branch3x3dbl_3.forward(
            self.branch3x3dbl_2.forward(self.branch3x3dbl_1.forward(x.clone())),
        );
        let bp = self.branch_pool.forward(self.pool.forward(x));
        Tensor::cat(vec![b1, b5, b3, bp], 1)
    }
}

// ─── InceptionB (35×35 → 17×17) ───────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct InceptionB<B: Backend> {
    pub branch3x3:      BasicConv2d<B>,
    pub branch3x3dbl_1: BasicConv2d<B>,
    pub branch3x3dbl_2: BasicConv2d<B>,
    pub branch3x3dbl_3: BasicConv2d<B>,
    pub pool:           MaxPool2d,
}

conv_units!(InceptionB { branch3x3, branch3x3dbl_1, branch3x3dbl_2, branch3x3dbl_3 });

impl<B: Backend> InceptionB<B> {
    fn new(c: &mut LayerCursor, cin: usize, d: &B::Device) -> Self {
        let branch3x3      = conv3x3_s2(c, cin, 384, d);
        let branch3x3dbl_1 = conv1x1(c, cin, 64, d);
        let branch3x3dbl_2 = conv_same(c, 64, 96, [3, 3], d);
        let branch3x3dbl_3 = conv3x3_s2(c, 96, 96, d);
        c.single(); // max pool
        c.single(); // concat

        Self { branch3x3, branch3x3dbl_1, branch3x3dbl_2, branch3x3dbl_3, pool: max_pool3x3_s2() }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let b3  = self.branch3x3.forward(x.clone());
        let bd  = self.branch3x3dbl_3.forward(
            self.branch3x3dbl_2.forward(self.branch3x3dbl_1.forward(x.clone())),
        );
        let bp  = self.pool.forward(x);
        Tensor::cat(vec![b3, bd, bp], 1)
    }
}

// ─── InceptionC (17×17, factorised 7×7) ───────────────────────────────────────
#[derive(Module, Debug)]
pub struct InceptionC<B: Backend> {
    pub branch1x1:      BasicConv2d<B>,
    pub branch7x7_1:    BasicConv2d<B>,
    pub branch7x7_2:    BasicConv2d<B>,
    pub branch7x7_3:    BasicConv2d<B>,
    pub branch7x7dbl_1: BasicConv2d<B>,
    pub branch7x7dbl_2: BasicConv2d<B>,
    pub branch7x7dbl_3: BasicConv2d<B>,
    pub branch7x7dbl_4: BasicConv2d<B>,
    pub branch7x7dbl_5: BasicConv2d<B>,
    pub pool:           AvgPool2d,
    pub branch_pool:    BasicConv2d<B>,
}

conv_units!(InceptionC {
    branch1x1, branch7x7_1, branch7x7_2, branch7x7_3,
    branch7x7dbl_1, branch7x7dbl_2, branch7x7dbl_3, branch7x7dbl_4, branch7x7dbl_5,
    branch_pool,
});

impl<B: Backend> InceptionC<B> {
    fn new(c: &mut LayerCursor, cin: usize, c7: usize, d: &B::Device) -> Self {
        let branch1x1      = conv1x1(c, cin, 192, d);
        let branch7x7_1    = conv1x1(c, cin, c7, d);
        let branch7x7_2    = conv_same(c, c7, c7, [1, 7], d);
        let branch7x7_3    = conv_same(c, c7, 192, [7, 1], d);
        let branch7x7dbl_1 = conv1x1(c, cin, c7, d);
        let branch7x7dbl_2 = conv_same(c, c7, c7, [7, 1], d);
        let branch7x7dbl_3 = conv_same(c, c7, c7, [1, 7], d);
        let branch7x7dbl_4 = conv_same(c, c7, c7, [7, 1], d);
        let branch7x7dbl_5 = conv_same(c, c7, 192, [1, 7], d);
        c.single(); // avg pool
        let branch_pool    = conv1x1(c, cin, 192, d);
        c.single(); // concat

        Self {
            branch1x1, branch7x7_1, branch7x7_2, branch7x7_3,
            branch7x7dbl_1, branch7x7dbl_2, branch7x7dbl_3, branch7x7dbl_4, branch7x7dbl_5,
            pool: avg_pool3x3(), branch_pool,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let b1 = self.branch1x1.forward(x.clone());

        let b7 = self.branch7x7_1.forward(x.clone());
        let b7 = self.branch7x7_3.forward(self.branch7x7_2.forward(b7));

        let bd = self.branch7x7dbl_1.forward(x.clone());
        let bd = self.branch7x7dbl_3.forward(self.branch7x7dbl_2.forward(bd));
        let bd = self.branch7x7dbl_5.forward(self.branch7x7dbl_4.forward(bd));

        let bp = self.branch_pool.forward(self.pool.forward(x));
        Tensor::cat(vec![b1, b7, bd, bp], 1)
    }
}

// ─── InceptionD (17×17 → 8×8) ─────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct InceptionD<B: Backend> {
    pub branch3x3_1:   BasicConv2d<B>,
    pub branch3x3_2:   BasicConv2d<B>,
    pub branch7x7x3_1: BasicConv2d<B>,
    pub branch7x7x3_2: BasicConv2d<B>,
    pub branch7x7x3_3: BasicConv2d<B>,
    pub branch7x7x3_4: BasicConv2d<B>,
    pub pool:          MaxPool2d,
}

conv_units!(InceptionD {
    branch3x3_1, branch3x3_2,
    branch7x7x3_1, branch7x7x3_2, branch7x7x3_3, branch7x7x3_4,
});

impl<B: Backend> InceptionD<B> {
    fn new(c: &mut LayerCursor, cin: usize, d: &B::Device) -> Self {
        let branch3x3_1   = conv1x1(c, cin, 192, d);
        let branch3x3_2   = conv3x3_s2(c, 192, 320, d);
        let branch7x7x3_1 = conv1x1(c, cin, 192, d);
        let branch7x7x3_2 = conv_same(c, 192, 192, [1, 7], d);
        let branch7x7x3_3 = conv_same(c, 192, 192, [7, 1], d);
        let branch7x7x3_4 = conv3x3_s2(c, 192, 192, d);
        c.single(); // max pool
        c.single(); // concat

        Self {
            branch3x3_1, branch3x3_2,
            branch7x7x3_1, branch7x7x3_2, branch7x7x3_3, branch7x7x3_4,
            pool: max_pool3x3_s2(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let b3 = self.branch3x3_2.forward(self.branch3x3_1.forward(x.clone()));

        let b7 = self.branch7x7x3_1.forward(x.clone());
        let b7 = self.branch7x7x3_3.forward(self.branch7x7x3_2.forward(b7));
        let b7 = self.branch7x7x3_4.forward(b7);

        let bp = self.pool.forward(x);
        Tensor::cat(vec![b3, b7, bp], 1)
    }
}

// ─── InceptionE (8×8, expanded filter bank) ───────────────────────────────────
#[derive(Module, Debug)]
pub struct InceptionE<B: Backend> {
    pub branch1x1:       BasicConv2d<B>,
    pub branch3x3_1:     BasicConv2d<B>,
    pub branch3x3_2a:    BasicConv2d<B>,
    pub branch3x3_2b:    BasicConv2d<B>,
    pub branch3x3dbl_1:  BasicConv2d<B>,
    pub branch3x3dbl_2:  BasicConv2d<B>,
    pub branch3x3dbl_3a: BasicConv2d<B>,
    pub branch3x3dbl_3b: BasicConv2d<B>,
    pub pool:            AvgPool2d,
    pub branch_pool:     BasicConv2d<B>,
}

conv_units!(InceptionE {
    branch1x1, branch3x3_1, branch3x3_2a, branch3x3_2b,
    branch3x3dbl_1, branch3x3dbl_2, branch3x3dbl_3a, branch3x3dbl_3b,
    branch_pool,
});

impl<B: Backend> InceptionE<B> {
    fn new(c: &mut LayerCursor, cin: usize, d: &B::Device) -> Self {
        let branch1x1       = conv1x1(c, cin, 320, d);
        let branch3x3_1     = conv1x1(c, cin, 384, d);
        let branch3x3_2a    = conv_same(c, 384, 384, [1, 3], d);
        let branch3x3_2b    = conv_same(c, 384, 384, [3, 1], d);
        c.single(); // concat of the split 3×3 branch
        let branch3x3dbl_1  = conv1x1(c, cin, 448, d);
        let branch3x3dbl_2  = conv_same(c, 448, 384, [3, 3], d);
        let branch3x3dbl_3a = conv_same(c, 384, 384, [1, 3], d);
        let branch3x3dbl_3b = conv_same(c, 384, 384, [3, 1], d);
        c.single(); // concat of the split double-3×3 branch
        c.single(); // avg pool
        let branch_pool     = conv1x1(c, cin, 192, d);
        c.single(); // block concat

        Self {
            branch1x1, branch3x3_1, branch3x3_2a, branch3x3_2b,
            branch3x3dbl_1, branch3x3dbl_2, branch3x3dbl_3a, branch3x3dbl_3b,
            pool: avg_pool3x3(), branch_pool,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let b1 = self.branch1x1.forward(x.clone());

        let b3 = self.branch3x3_1.forward(x.clone());
        let b3 = Tensor::cat(
            vec![self.branch3x3_2a.forward(b3.clone()), self.branch3x3_2b.forward(b3)],
            1,
        );

        let bd = self.branch3x3dbl_2.forward(self.branch3x3dbl_1.forward(x.clone()));
        let bd = Tensor::cat(
            vec![self.branch3x3dbl_3a.forward(bd.clone()), self.branch3x3dbl_3b.forward(bd)],
            1,
        );

        let bp = self.branch_pool.forward(self.pool.forward(x));
        Tensor::cat(vec![b1, b3, bd, bp], 1)
    }
}

// ─── InceptionV3 ──────────────────────────────────────────────────────────────
// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct InceptionV3Config {
    #[config(default = "3")]
    pub in_channels: usize,
}

impl InceptionV3Config {
    pub fn init<B: Backend>(&self, device: &B::Device) -> InceptionV3<B> {
        let c = &mut LayerCursor::new();

        // ── Stem ──────────────────────────────────────────────────────────────
        let conv2d_1a_3x3 = conv3x3_s2(c, self.in_channels, 32, device);
        let conv2d_2a_3x3 = BasicConv2d::new(c, [32, 32], [3, 3], 1, [0, 0], device);
        let conv2d_2b_3x3 = conv_same(c, 32, 64, [3, 3], device);
        c.single(); // maxpool1
        let conv2d_3b_1x1 = conv1x1(c, 64, 80, device);
        let conv2d_4a_3x3 = BasicConv2d::new(c, [80, 192], [3, 3], 1, [0, 0], device);
        c.single(); // maxpool2

        // ── Inception blocks ──────────────────────────────────────────────────
        let mixed_5b = InceptionA::new(c, 192, 32, device);
        let mixed_5c = InceptionA::new(c, 256, 64, device);
        let mixed_5d = InceptionA::new(c, 288, 64, device);
        let mixed_6a = InceptionB::new(c, 288, device);
        let mixed_6b = InceptionC::new(c, 768, 128, device);
        let mixed_6c = InceptionC::new(c, 768, 160, device);
        let mixed_6d = InceptionC::new(c, 768, 160, device);
        let mixed_6e = InceptionC::new(c, 768, 192, device);
        let mixed_7a = InceptionD::new(c, 768, device);
        let mixed_7b = InceptionE::new(c, 1280, device);
        let mixed_7c = InceptionE::new(c, 2048, device);

        InceptionV3 {
            conv2d_1a_3x3, conv2d_2a_3x3, conv2d_2b_3x3,
            maxpool1: max_pool3x3_s2(),
            conv2d_3b_1x1, conv2d_4a_3x3,
            maxpool2: max_pool3x3_s2(),
            mixed_5b, mixed_5c, mixed_5d,
            mixed_6a, mixed_6b, mixed_6c, mixed_6d, mixed_6e,
            mixed_7a, mixed_7b, mixed_7c,
            layer_count: c.position(),
        }
    }
}

#[derive(Module, Debug)]
pub struct InceptionV3<B: Backend> {
    pub conv2d_1a_3x3: BasicConv2d<B>,
    pub conv2d_2a_3x3: BasicConv2d<B>,
    pub conv2d_2b_3x3: BasicConv2d<B>,
    pub maxpool1:      MaxPool2d,
    pub conv2d_3b_1x1: BasicConv2d<B>,
    pub conv2d_4a_3x3: BasicConv2d<B>,
    pub maxpool2:      MaxPool2d,
    pub mixed_5b:      InceptionA<B>,
    pub mixed_5c:      InceptionA<B>,
    pub mixed_5d:      InceptionA<B>,
    pub mixed_6a:      InceptionB<B>,
    pub mixed_6b:      InceptionC<B>,
    pub mixed_6c:      InceptionC<B>,
    pub mixed_6d:      InceptionC<B>,
    pub mixed_6e:      InceptionC<B>,
    pub mixed_7a:      InceptionD<B>,
    pub mixed_7b:      InceptionE<B>,
    pub mixed_7c:      InceptionE<B>,

    /// Number of backbone layers including the input layer
    pub layer_count: usize,
}

impl<B: Backend> InceptionV3<B> {
    /// x: [batch, 3, H, W] with H, W >= 75 → [batch, 2048, h, w]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv2d_1a_3x3.forward(x);
        let x = self.conv2d_2a_3x3.forward(x);
        let x = self.conv2d_2b_3x3.forward(x);
        let x = self.maxpool1.forward(x);
        let x = self.conv2d_3b_1x1.forward(x);
        let x = self.conv2d_4a_3x3.forward(x);
        let x = self.maxpool2.forward(x);

        let x = self.mixed_5b.forward(x);
        let x = self.mixed_5c.forward(x);
        let x = self.mixed_5d.forward(x);
        let x = self.mixed_6a.forward(x);
        let x = self.mixed_6b.forward(x);
        let x = self.mixed_6c.forward(x);
        let x = self.mixed_6d.forward(x);
        let x = self.mixed_6e.forward(x);
        let x = self.mixed_7a.forward(x);
        let x = self.mixed_7b.forward(x);
        self.mixed_7c.forward(x)
    }

    pub fn layer_count(&self) -> usize {
        self.layer_count
    }

    pub fn with_trainable(self, policy: FreezePolicy) -> Self {
        Self {
            conv2d_1a_3x3: self.conv2d_1a_3x3.with_trainable(policy),
            conv2d_2a_3x3: self.conv2d_2a_3x3.with_trainable(policy),
            conv2d_2b_3x3: self.conv2d_2b_3x3.with_trainable(policy),
            conv2d_3b_1x1: self.conv2d_3b_1x1.with_trainable(policy),
            conv2d_4a_3x3: self.conv2d_4a_3x3.with_trainable(policy),
            mixed_5b: self.mixed_5b.with_trainable(policy),
            mixed_5c: self.mixed_5c.with_trainable(policy),
            mixed_5d: self.mixed_5d.with_trainable(policy),
            mixed_6a: self.mixed_6a.with_trainable(policy),
            mixed_6b: self.mixed_6b.with_trainable(policy),
            mixed_6c: self.mixed_6c.with_trainable(policy),
            mixed_6d: self.mixed_6d.with_trainable(policy),
            mixed_6e: self.mixed_6e.with_trainable(policy),
            mixed_7a: self.mixed_7a.with_trainable(policy),
            mixed_7b: self.mixed_7b.with_trainable(policy),
            mixed_7c: self.mixed_7c.with_trainable(policy),
            ..self
        }
    }

    /// Trainable state of every conv / batch-norm layer, by index.
    pub fn flags(&self) -> Vec<LayerFlag> {
        let mut out = Vec::with_capacity(192);
        for unit in [
            &self.conv2d_1a_3x3, &self.conv2d_2a_3x3, &self.conv2d_2b_3x3,
            &self.conv2d_3b_1x1, &self.conv2d_4a_3x3,
        ] {
            unit.flags(&mut out);
        }
        self.mixed_5b.flags(&mut out);
        self.mixed_5c.flags(&mut out);
        self.mixed_5d.flags(&mut out);
        self.mixed_6a.flags(&mut out);
        self.mixed_6b.flags(&mut out);
        self.mixed_6c.flags(&mut out);
        self.mixed_6d.flags(&mut out);
        self.mixed_6e.flags(&mut out);
        self.mixed_7a.flags(&mut out);
        self.mixed_7b.flags(&mut out);
        self.mixed_7c.flags(&mut out);
        out.sort_by_key(|f| f.index);
        out
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_block_layer_counts() {
        let device = Default::default();

        // a fresh cursor starts at 1, right after the input layer
        let mut c = LayerCursor::new();
        let _: InceptionA<TestBackend> = InceptionA::new(&mut c, 8, 4, &device);
        assert_eq!(c.position() - 1, 23);

        let mut c = LayerCursor::new();
        let _: InceptionB<TestBackend> = InceptionB::new(&mut c, 8, &device);
        assert_eq!(c.position() - 1, 14);

        let mut c = LayerCursor::new();
        let _: InceptionC<TestBackend> = InceptionC::new(&mut c, 8, 4, &device);
        assert_eq!(c.position() - 1, 32);

        let mut c = LayerCursor::new();
        let _: InceptionD<TestBackend> = InceptionD::new(&mut c, 8, &device);
        assert_eq!(c.position() - 1, 20);

        let mut c = LayerCursor::new();
        let _: InceptionE<TestBackend> = InceptionE::new(&mut c, 8, &device);
        assert_eq!(c.position() - 1, 31);
    }

    #[test]
    fn test_inception_a_output_channels() {
        let device = Default::default();
        let mut c  = LayerCursor::new();
        let block: InceptionA<TestBackend> = InceptionA::new(&mut c, 8, 16, &device);

        let x = Tensor::<TestBackend, 4>::zeros([1, 8, 5, 5], &device);
        // 64 + 64 + 96 + 16
        assert_eq!(block.forward(x).dims(), [1, 240, 5, 5]);
    }

    #[test]
    fn test_inception_b_halves_the_grid() {
        let device = Default::default();
        let mut c  = LayerCursor::new();
        let block: InceptionB<TestBackend> = InceptionB::new(&mut c, 8, &device);

        let x = Tensor::<TestBackend, 4>::zeros([1, 8, 7, 7], &device);
        // 384 + 96 + 8 (pooled input)
        assert_eq!(block.forward(x).dims(), [1, 488, 3, 3]);
    }

    #[test]
    fn test_inception_e_output_channels() {
        let device = Default::default();
        let mut c  = LayerCursor::new();
        let block: InceptionE<TestBackend> = InceptionE::new(&mut c, 8, &device);

        let x = Tensor::<TestBackend, 4>::zeros([2, 8, 3, 3], &device);
        assert_eq!(block.forward(x).dims(), [2, FEATURE_CHANNELS, 3, 3]);
    }

    #[test]
    fn test_block_indices_are_branch_ordered() {
        let device = Default::default();
        let mut c  = LayerCursor::new();
        while c.position() < 165 {
            c.single();
        }
        let block: InceptionC<TestBackend> = InceptionC::new(&mut c, 8, 4, &device);

        assert_eq!(block.branch1x1.index, 165);
        assert_eq!(block.branch7x7_1.index, 168);
        assert_eq!(block.branch7x7_2.index, 171);
        // 9 conv units, then the avg pool, then the pool conv
        assert_eq!(block.branch_pool.index, 193);
        assert_eq!(c.position(), 197);
    }
}
