//! Gradient-weighted class activation mapping.
//!
//! The algorithm instruments one internal layer of the classifier: the
//! forward pass records that layer's activation, a backward pass seeded from
//! a single class score records the gradient flowing into the layer, and the
//! two are combined into a spatial saliency map.
//!
//! Instrumentation is expressed through the computation graph rather than
//! hooks: the forward runs to the tap, the activation is detached and
//! re-rooted with `require_grad`, the remainder of the network runs from that
//! root, and the backward pass then reports the gradient with respect to the
//! re-rooted activation. The captured pair lives in a call-local
//! [`ActivationCapture`], so the model instance is back to an uninstrumented
//! state the moment the call returns — it never left it.

use burn::prelude::*;
use burn::tensor::activation::softmax;
use burn::tensor::backend::AutodiffBackend;
use thiserror::Error;
use tracing::debug;

use ctxai_core::argmax;
use ctxai_models::{CtResNet, TapPoint};

use crate::capture::{ActivationCapture, CaptureError};

/// Result type for explanation operations.
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors raised while computing an activation map.
#[derive(Debug, Error)]
pub enum ExplainError {
    /// Requested class index is outside `[0, num_classes)`.
    #[error("Class index {index} out of range for {num_classes} classes")]
    InvalidClassIndex {
        /// The offending index.
        index: usize,
        /// The model's class count.
        num_classes: usize,
    },

    /// The backward pass produced no gradient at the tapped layer.
    #[error("No gradient reached layer '{layer}' during the backward pass")]
    NoGradientFlow {
        /// Name of the tapped layer.
        layer: String,
    },

    /// The capture was read before both halves were populated.
    #[error("Activation capture incomplete: {0}")]
    Capture(CaptureError),

    /// Failed to extract data from a tensor.
    #[error("Tensor data error: {0}")]
    TensorData(String),
}

/// A normalized single-channel saliency map.
///
/// Values are in `[0, 1]` with the spatial layout of the tapped layer's
/// activation (row-major, `height × width`), before any upsampling.
#[derive(Debug, Clone)]
pub struct SaliencyMap {
    values: Vec<f32>,
    height: usize,
    width: usize,
    target_class: usize,
}

impl SaliencyMap {
    /// Create a map from row-major values.
    ///
    /// `values.len()` must equal `height * width`.
    pub fn new(values: Vec<f32>, height: usize, width: usize, target_class: usize) -> Self {
        Self {
            values,
            height,
            width,
            target_class,
        }
    }

    /// Map height (spatial `u` of the tapped activation).
    pub fn height(&self) -> usize {
        self.height
    }

    /// Map width (spatial `v` of the tapped activation).
    pub fn width(&self) -> usize {
        self.width
    }

    /// Row-major saliency values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// The class whose score seeded the backward pass.
    pub fn target_class(&self) -> usize {
        self.target_class
    }

    /// Largest saliency value (0.0 for an empty map).
    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(0.0_f32, f32::max)
    }

    /// True when every value is zero — the rectified map carried no signal.
    pub fn is_uniformly_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }
}

/// Output of a Grad-CAM run: the saliency map plus the forward-pass
/// prediction it is consistent with.
#[derive(Debug, Clone)]
pub struct GradCamOutput {
    /// The normalized saliency map.
    pub saliency: SaliencyMap,
    /// Arg-max class of the forward pass (the model's own prediction,
    /// regardless of which class seeded the backward pass).
    pub class_index: usize,
    /// Softmax probabilities from the forward pass.
    pub probabilities: Vec<f32>,
}

/// Compute a Grad-CAM saliency map for one preprocessed scan.
///
/// # Arguments
///
/// * `model` - the classifier, on an autodiff backend
/// * `input` - preprocessed scan tensor `(1, 1, H, W)` on the inner backend
/// * `tap` - the layer to instrument (resolved beforehand by the registry)
/// * `target_class` - class whose score seeds the backward pass; defaults to
///   the forward pass's arg-max, keeping the explanation class-consistent
///   with the prediction
///
/// An explicit out-of-range `target_class` fails with
/// [`ExplainError::InvalidClassIndex`] before any pass runs. A backward pass
/// that leaves no gradient at the tap is [`ExplainError::NoGradientFlow`],
/// never a silently zeroed map.
pub fn grad_cam<B: AutodiffBackend>(
    model: &CtResNet<B>,
    input: Tensor<B::InnerBackend, 4>,
    tap: TapPoint,
    target_class: Option<usize>,
) -> Result<GradCamOutput> {
    let num_classes = model.num_classes();
    if let Some(index) = target_class {
        if index >= num_classes {
            return Err(ExplainError::InvalidClassIndex { index, num_classes });
        }
    }

    let mut capture = ActivationCapture::new();

    // Forward to the tap, then re-root the activation so the backward pass
    // reports the gradient with respect to it.
    let x = Tensor::<B, 4>::from_inner(input);
    let activation = model.forward_until(x, tap).detach().require_grad();
    capture.record_activation(activation.clone().inner());

    let logits = model.forward_from(activation.clone(), tap);

    let probabilities: Vec<f32> = softmax(logits.clone().inner(), 1)
        .into_data()
        .to_vec()
        .map_err(|e| ExplainError::TensorData(format!("{e:?}")))?;
    let class_index = argmax(&probabilities);
    let target = target_class.unwrap_or(class_index);
    debug!(layer = %tap, target, predicted = class_index, "seeding backward pass");

    // Backward from the single target-class score (gradient 1 at that output,
    // 0 everywhere else).
    let score = logits.slice([0..1, target..target + 1]);
    let grads = score.backward();
    if let Some(gradient) = activation.grad(&grads) {
        capture.record_gradient(gradient);
    }

    let (activation, gradient) = capture.finish().map_err(|e| match e {
        CaptureError::MissingGradient => ExplainError::NoGradientFlow {
            layer: tap.name().to_string(),
        },
        other => ExplainError::Capture(other),
    })?;

    // Per-channel weights: spatial mean of the gradient, (1, K, 1, 1).
    let weights = gradient.mean_dim(3).mean_dim(2);

    // Channel-weighted sum of activations, rectified.
    let cam = (activation * weights).sum_dim(1);
    let cam = cam.clamp_min(0.0);
    let [_, _, u, v] = cam.dims();
    let cam = cam.reshape([u, v]);

    // Normalize to [0, 1]; a uniformly zero map stays zero.
    let min: f32 = cam.clone().min().into_scalar().elem();
    let cam = cam - min;
    let max: f32 = cam.clone().max().into_scalar().elem();
    let cam = if max > 0.0 { cam / max } else { cam };

    let values: Vec<f32> = cam
        .into_data()
        .to_vec()
        .map_err(|e| ExplainError::TensorData(format!("{e:?}")))?;

    Ok(GradCamOutput {
        saliency: SaliencyMap::new(values, u, v, target),
        class_index,
        probabilities,
    })
}
