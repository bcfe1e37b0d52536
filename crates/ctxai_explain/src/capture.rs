//! Call-local activation and gradient capture.

use burn::prelude::*;
use thiserror::Error;

/// Errors raised when reading an incomplete capture.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// The forward pass never recorded the tapped layer's activation.
    #[error("forward activation was never captured")]
    MissingActivation,

    /// The backward pass never recorded a gradient at the tapped layer.
    #[error("no gradient was captured at the tapped layer")]
    MissingGradient,
}

/// Transient capture of one layer's forward activation and backward
/// gradient, both of shape `(1, K, u, v)`.
///
/// One capture belongs to exactly one explanation call: it is created on the
/// call's stack, filled by that call's forward and backward passes, and
/// consumed by [`ActivationCapture::finish`]. Neither half may be read until
/// both are populated.
#[derive(Debug)]
pub struct ActivationCapture<B: Backend> {
    activation: Option<Tensor<B, 4>>,
    gradient: Option<Tensor<B, 4>>,
}

impl<B: Backend> ActivationCapture<B> {
    /// Create an empty capture.
    pub fn new() -> Self {
        Self {
            activation: None,
            gradient: None,
        }
    }

    /// Record the tapped layer's forward activation.
    pub fn record_activation(&mut self, activation: Tensor<B, 4>) {
        self.activation = Some(activation);
    }

    /// Record the gradient that reached the tapped layer.
    pub fn record_gradient(&mut self, gradient: Tensor<B, 4>) {
        self.gradient = Some(gradient);
    }

    /// True once both halves are populated.
    pub fn is_complete(&self) -> bool {
        self.activation.is_some() && self.gradient.is_some()
    }

    /// Consume the capture, yielding `(activation, gradient)`.
    ///
    /// Fails if either half is missing; an explanation must never proceed
    /// from a partial capture.
    pub fn finish(self) -> Result<(Tensor<B, 4>, Tensor<B, 4>), CaptureError> {
        let activation = self.activation.ok_or(CaptureError::MissingActivation)?;
        let gradient = self.gradient.ok_or(CaptureError::MissingGradient)?;
        Ok((activation, gradient))
    }
}

impl<B: Backend> Default for ActivationCapture<B> {
    fn default() -> Self {
        Self::new()
    }
}
