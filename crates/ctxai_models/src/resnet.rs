//! Residual CNN for grayscale CT scan classification.
//!
//! The architecture follows the classic residual layout: a strided stem
//! convolution adapted to single-channel input, four residual stages with
//! stage-wise downsampling, global average pooling and a linear head sized
//! to the class count.
//!
//! Normalization is `GroupNorm` rather than `BatchNorm`: burn couples
//! BatchNorm's train/eval behavior to the backend type, and the explanation
//! path runs its forward pass on an autodiff backend. GroupNorm carries no
//! batch-coupled state, so prediction and explanation see identical logits
//! for the same input.

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{
    AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig,
};
use burn::nn::{GroupNorm, GroupNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::prelude::*;
use burn::tensor::activation::softmax;
use serde::{Deserialize, Serialize};

use crate::registry::{LayerRegistry, TapPoint};

/// Configuration for the [`CtResNet`] classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtResNetConfig {
    /// Number of input channels (1 for grayscale CT).
    pub in_channels: usize,
    /// Number of output classes. Fixed at construction; a checkpoint whose
    /// head width disagrees with this value fails to load.
    pub num_classes: usize,
    /// Channel widths of the four residual stages.
    pub stage_widths: [usize; 4],
    /// Residual blocks per stage (2 gives the 18-layer layout).
    pub blocks_per_stage: usize,
    /// Groups for GroupNorm; every stage width must be divisible by this.
    pub norm_groups: usize,
}

impl Default for CtResNetConfig {
    fn default() -> Self {
        Self {
            in_channels: 1,
            num_classes: 4,
            stage_widths: [64, 128, 256, 512],
            blocks_per_stage: 2,
            norm_groups: 8,
        }
    }
}

impl CtResNetConfig {
    /// Create a config for the given class count.
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            ..Default::default()
        }
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> CtResNet<B> {
        CtResNet::new(self.clone(), device)
    }
}

/// Residual block with two convolutions and an optional projection shortcut.
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    conv1: Conv2d<B>,
    norm1: GroupNorm<B>,
    conv2: Conv2d<B>,
    norm2: GroupNorm<B>,
    projection: Option<Conv2d<B>>,
    projection_norm: Option<GroupNorm<B>>,
}

impl<B: Backend> ResidualBlock<B> {
    /// Create a new residual block.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        norm_groups: usize,
        device: &B::Device,
    ) -> Self {
        let conv1 = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let norm1 = GroupNormConfig::new(norm_groups, out_channels).init(device);

        let conv2 = Conv2dConfig::new([out_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let norm2 = GroupNormConfig::new(norm_groups, out_channels).init(device);

        // Projection shortcut when spatial or channel dimensions change
        let (projection, projection_norm) = if stride != 1 || in_channels != out_channels {
            let proj = Conv2dConfig::new([in_channels, out_channels], [1, 1])
                .with_stride([stride, stride])
                .with_bias(false)
                .init(device);
            let proj_norm = GroupNormConfig::new(norm_groups, out_channels).init(device);
            (Some(proj), Some(proj_norm))
        } else {
            (None, None)
        };

        Self {
            conv1,
            norm1,
            conv2,
            norm2,
            projection,
            projection_norm,
        }
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let relu = Relu::new();

        let out = self.conv1.forward(x.clone());
        let out = self.norm1.forward(out);
        let out = relu.forward(out);

        let out = self.conv2.forward(out);
        let out = self.norm2.forward(out);

        let shortcut = if let (Some(ref proj), Some(ref proj_norm)) =
            (&self.projection, &self.projection_norm)
        {
            let s = proj.forward(x);
            proj_norm.forward(s)
        } else {
            x
        };

        let out = out + shortcut;
        relu.forward(out)
    }
}

/// Residual CNN classifier for grayscale CT scans.
#[derive(Module, Debug)]
pub struct CtResNet<B: Backend> {
    stem: Conv2d<B>,
    stem_norm: GroupNorm<B>,
    stem_pool: MaxPool2d,
    layer1: Vec<ResidualBlock<B>>,
    layer2: Vec<ResidualBlock<B>>,
    layer3: Vec<ResidualBlock<B>>,
    layer4: Vec<ResidualBlock<B>>,
    gap: AdaptiveAvgPool2d,
    fc: Linear<B>,
}

impl<B: Backend> CtResNet<B> {
    /// Create a new classifier from a config.
    pub fn new(config: CtResNetConfig, device: &B::Device) -> Self {
        let [w1, w2, w3, w4] = config.stage_widths;

        let stem = Conv2dConfig::new([config.in_channels, w1], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let stem_norm = GroupNormConfig::new(config.norm_groups, w1).init(device);
        let stem_pool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let layer1 = Self::make_stage(w1, w1, config.blocks_per_stage, 1, config.norm_groups, device);
        let layer2 = Self::make_stage(w1, w2, config.blocks_per_stage, 2, config.norm_groups, device);
        let layer3 = Self::make_stage(w2, w3, config.blocks_per_stage, 2, config.norm_groups, device);
        let layer4 = Self::make_stage(w3, w4, config.blocks_per_stage, 2, config.norm_groups, device);

        let gap = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc = LinearConfig::new(w4, config.num_classes).init(device);

        Self {
            stem,
            stem_norm,
            stem_pool,
            layer1,
            layer2,
            layer3,
            layer4,
            gap,
            fc,
        }
    }

    fn make_stage(
        in_channels: usize,
        out_channels: usize,
        blocks: usize,
        stride: usize,
        norm_groups: usize,
        device: &B::Device,
    ) -> Vec<ResidualBlock<B>> {
        let mut stage = vec![ResidualBlock::new(
            in_channels,
            out_channels,
            stride,
            norm_groups,
            device,
        )];
        for _ in 1..blocks {
            stage.push(ResidualBlock::new(
                out_channels,
                out_channels,
                1,
                norm_groups,
                device,
            ));
        }
        stage
    }

    fn forward_stem(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.stem.forward(x);
        let out = self.stem_norm.forward(out);
        let out = Relu::new().forward(out);
        self.stem_pool.forward(out)
    }

    fn forward_stage(stage: &[ResidualBlock<B>], x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut out = x;
        for block in stage {
            out = block.forward(out);
        }
        out
    }

    fn stages(&self) -> [&[ResidualBlock<B>]; 4] {
        [&self.layer1, &self.layer2, &self.layer3, &self.layer4]
    }

    /// Number of residual stages already applied once the given tap's
    /// activation has been produced.
    fn stages_before(tap: TapPoint) -> usize {
        match tap {
            TapPoint::Stem => 0,
            TapPoint::Layer1 => 1,
            TapPoint::Layer2 => 2,
            TapPoint::Layer3 => 3,
            TapPoint::Layer4 => 4,
        }
    }

    /// Forward pass up to and including the given tap point.
    ///
    /// Returns the activation of that layer, shape `(batch, K, u, v)`.
    pub fn forward_until(&self, x: Tensor<B, 4>, tap: TapPoint) -> Tensor<B, 4> {
        let mut out = self.forward_stem(x);
        for &stage in &self.stages()[..Self::stages_before(tap)] {
            out = Self::forward_stage(stage, out);
        }
        out
    }

    /// Forward pass from a tap activation to class logits.
    ///
    /// `activation` must be the output of [`Self::forward_until`] with the
    /// same tap; the remaining stages and the head are applied.
    pub fn forward_from(&self, activation: Tensor<B, 4>, tap: TapPoint) -> Tensor<B, 2> {
        let mut out = activation;
        for &stage in &self.stages()[Self::stages_before(tap)..] {
            out = Self::forward_stage(stage, out);
        }
        self.forward_head(out)
    }

    fn forward_head(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let out = self.gap.forward(x);
        let [batch, channels, _, _] = out.dims();
        let out = out.reshape([batch, channels]);
        self.fc.forward(out)
    }

    /// Full forward pass returning class logits.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.forward_until(x, TapPoint::LAST);
        self.forward_from(features, TapPoint::LAST)
    }

    /// Forward pass returning probabilities.
    pub fn forward_probs(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let logits = self.forward(x);
        softmax(logits, 1)
    }

    /// Width of the classification head (the configured class count).
    pub fn num_classes(&self) -> usize {
        self.fc.weight.val().dims()[1]
    }

    /// Number of input channels accepted by the stem.
    pub fn in_channels(&self) -> usize {
        self.stem.weight.val().dims()[1]
    }

    /// The layer registry for this architecture.
    pub fn layer_registry(&self) -> LayerRegistry {
        LayerRegistry::for_classifier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn tiny_config() -> CtResNetConfig {
        CtResNetConfig {
            in_channels: 1,
            num_classes: 4,
            stage_widths: [8, 8, 16, 16],
            blocks_per_stage: 1,
            norm_groups: 4,
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = CtResNetConfig::default();
        assert_eq!(config.in_channels, 1);
        assert_eq!(config.num_classes, 4);
        assert_eq!(config.stage_widths, [64, 128, 256, 512]);
        assert_eq!(config.blocks_per_stage, 2);
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::zeros([1, 1, 32, 32], &device);

        let logits = model.forward(x);
        assert_eq!(logits.dims(), [1, 4]);
    }

    #[test]
    fn test_probs_sum_to_one() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::ones([1, 1, 32, 32], &device);

        let probs = model.forward_probs(x);
        let sum: f32 = probs.sum().into_scalar().elem();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_tap_activation_shapes() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::zeros([1, 1, 32, 32], &device);

        // 32 -> stem conv /2 -> 16 -> pool /2 -> 8, then /2 per later stage
        let stem = model.forward_until(x.clone(), TapPoint::Stem);
        assert_eq!(stem.dims(), [1, 8, 8, 8]);

        let l4 = model.forward_until(x, TapPoint::Layer4);
        assert_eq!(l4.dims(), [1, 16, 1, 1]);
    }

    #[test]
    fn test_split_forward_matches_full_forward() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::random(
            [1, 1, 32, 32],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );

        let full = model.forward(x.clone());

        for tap in TapPoint::all() {
            let activation = model.forward_until(x.clone(), tap);
            let split = model.forward_from(activation, tap);
            split
                .into_data()
                .assert_approx_eq(&full.clone().into_data(), 3);
        }
    }

    #[test]
    fn test_head_and_stem_widths() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        assert_eq!(model.num_classes(), 4);
        assert_eq!(model.in_channels(), 1);
    }
}
