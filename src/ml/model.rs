// ============================================================
// Layer 5 — Fine-Tuning Model
// ============================================================
// Pretrained backbone + a new classification head:
//
//   images [B, 3, 299, 299]
//     │  InceptionV3 backbone          (layers 1 ..= 310)
//     ▼
//   features [B, 2048, 8, 8]
//     │  global average pooling        (311)
//     ▼
//   [B, 2048]
//     │  dense(fc_size) + ReLU         (312)
//     │  dropout(0.5)                  (313)
//     │  dense(fc_size) + ReLU         (314)
//     │  dense(num_classes)            (315)
//     ▼
//   logits [B, num_classes]
//
// forward() returns logits; the cross-entropy loss applies the
// log-softmax itself.

use anyhow::Result;
use burn::{
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::ml::{
    freeze::{linear_is_trainable, set_linear_trainable, FreezePolicy, LayerFlag, LayerKind},
    inception::{InceptionV3, FEATURE_CHANNELS},
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally; do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct FineTuneModelConfig {
    pub num_classes: usize,

    /// Width of both hidden dense layers
    #[config(default = "20")]
    pub fc_size: usize,

    #[config(default = "0.5")]
    pub dropout: f64,
}

impl FineTuneModelConfig {
    /// Attach a fresh head to `backbone`.
    pub fn build<B: Backend>(&self, backbone: InceptionV3<B>, device: &B::Device) -> Result<FineTuneModel<B>> {
        if self.num_classes == 0 {
            anyhow::bail!("Cannot build a classifier with 0 classes: the training directory has no class subdirectories");
        }
        let head = self.init_head(backbone.layer_count(), FEATURE_CHANNELS, device);
        Ok(FineTuneModel { backbone, head })
    }

    /// The head alone, numbered from `first_index`.
    pub fn init_head<B: Backend>(&self, first_index: usize, in_features: usize, device: &B::Device) -> ClassifierHead<B> {
        ClassifierHead {
            pool:        AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc1:         LinearConfig::new(in_features, self.fc_size).init(device),
            dropout:     DropoutConfig::new(self.dropout).init(),
            fc2:         LinearConfig::new(self.fc_size, self.fc_size).init(device),
            predictions: LinearConfig::new(self.fc_size, self.num_classes).init(device),
            first_index,
        }
    }
}

// ─── ClassifierHead ───────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    pub pool:        AdaptiveAvgPool2d,
    pub fc1:         Linear<B>,
    pub dropout:     Dropout,
    pub fc2:         Linear<B>,
    pub predictions: Linear<B>,

    /// Layer index of the pooling layer
    pub first_index: usize,
}

impl<B: Backend> ClassifierHead<B> {
    /// features: [batch, channels, h, w] → logits: [batch, num_classes]
    pub fn forward(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(features).flatten::<2>(1, 3);
        let x = relu(self.fc1.forward(x));
        let x = self.dropout.forward(x);
        let x = relu(self.fc2.forward(x));
        self.predictions.forward(x)
    }

    // Indices of fc1, fc2 and predictions
    fn dense_indices(&self) -> [usize; 3] {
        [self.first_index + 1, self.first_index + 3, self.first_index + 4]
    }

    pub fn with_trainable(self, policy: FreezePolicy) -> Self {
        let [i1, i2, i3] = self.dense_indices();
        Self {
            fc1:         set_linear_trainable(self.fc1, policy.is_trainable(i1, false)),
            fc2:         set_linear_trainable(self.fc2, policy.is_trainable(i2, false)),
            predictions: set_linear_trainable(self.predictions, policy.is_trainable(i3, false)),
            ..self
        }
    }

    pub fn flags(&self) -> Vec<LayerFlag> {
        let [i1, i2, i3] = self.dense_indices();
        [(i1, &self.fc1), (i2, &self.fc2), (i3, &self.predictions)]
            .into_iter()
            .map(|(index, layer)| LayerFlag {
                index,
                kind: LayerKind::Dense,
                in_backbone: false,
                trainable: linear_is_trainable(layer),
            })
            .collect()
    }

    /// Index of the last (output) layer
    pub fn last_index(&self) -> usize {
        self.first_index + 4
    }
}

// ─── FineTuneModel ────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct FineTuneModel<B: Backend> {
    pub backbone: InceptionV3<B>,
    pub head:     ClassifierHead<B>,
}

impl<B: Backend> FineTuneModel<B> {
    /// images: [batch, 3, H, W] → logits: [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.head.forward(self.backbone.forward(images))
    }

    pub fn apply_freeze(self, policy: FreezePolicy) -> Self {
        Self {
            backbone: self.backbone.with_trainable(policy),
            head:     self.head.with_trainable(policy),
        }
    }

    /// Trainable state of every parameter-owning layer, by index.
    pub fn layer_flags(&self) -> Vec<LayerFlag> {
        let mut flags = self.backbone.flags();
        flags.extend(self.head.flags());
        flags
    }

    pub fn num_classes(&self) -> usize {
        self.head.predictions.weight.val().dims()[1]
    }

    /// Number of layers, input layer included
    pub fn layer_count(&self) -> usize {
        self.head.last_index() + 1
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::inception::InceptionV3Config;
    use burn::{
        backend::{Autodiff, NdArray},
        tensor::activation::softmax,
    };

    type TestBackend = NdArray;
    type TestAutodiffBackend = Autodiff<NdArray>;

    #[test]
    fn test_head_output_shape_and_probs() {
        let device = Default::default();
        let head: ClassifierHead<TestBackend> = FineTuneModelConfig::new(3)
            .init_head(311, 16, &device);

        let features = Tensor::<TestBackend, 4>::ones([2, 16, 4, 4], &device);
        let logits   = head.forward(features);
        assert_eq!(logits.dims(), [2, 3]);

        let probs: Vec<f32> = softmax(logits, 1).sum_dim(1).into_data().to_vec().unwrap();
        assert!(probs.iter().all(|p| (p - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_head_indices() {
        let device = Default::default();
        let head: ClassifierHead<TestBackend> = FineTuneModelConfig::new(2).init_head(311, 8, &device);
        let idx: Vec<usize> = head.flags().iter().map(|f| f.index).collect();
        assert_eq!(idx, vec![312, 314, 315]);
        assert_eq!(head.last_index(), 315);
    }

    #[test]
    fn test_zero_classes_rejected() {
        let device   = Default::default();
        let backbone = InceptionV3Config::new().init::<TestBackend>(&device);
        assert!(FineTuneModelConfig::new(0).build(backbone, &device).is_err());
    }

    #[test]
    fn test_freeze_policies_on_full_model() {
        let device   = Default::default();
        let backbone = InceptionV3Config::new().init::<TestAutodiffBackend>(&device);
        assert_eq!(backbone.layer_count(), 311);

        let model = FineTuneModelConfig::new(2).build(backbone, &device).unwrap();
        assert_eq!(model.layer_count(), 316);
        assert_eq!(model.num_classes(), 2);

        let logits = model.forward(Tensor::zeros([1, 3, 75, 75], &device));
        assert_eq!(logits.dims(), [1, 2]);

        // ── Transfer learning: backbone frozen, head trainable ──
        let model = model.apply_freeze(FreezePolicy::FreezeBackbone);
        let flags = model.layer_flags();
        // 94 conv units → 188 backbone layers, plus 3 dense
        assert_eq!(flags.len(), 191);
        assert!(flags.iter().filter(|f| f.in_backbone).all(|f| !f.trainable));
        assert!(flags.iter().filter(|f| !f.in_backbone).all(|f| f.trainable));

        // ── Fine-tuning: index >= 172 trainable ──
        let model = model.apply_freeze(FreezePolicy::FreezeBelow(172));
        for f in model.layer_flags() {
            assert_eq!(f.trainable, f.index >= 172, "layer {}", f.index);
        }

        // mixed_6d.branch7x7_2 straddles the threshold
        let unit = &model.backbone.mixed_6d.branch7x7_2;
        assert_eq!(unit.index, 171);
        let flags = model.layer_flags();
        assert!(!flags.iter().find(|f| f.index == 171).unwrap().trainable);
        assert!(flags.iter().find(|f| f.index == 172).unwrap().trainable);
    }
}
