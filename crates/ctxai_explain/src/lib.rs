//! # ctxai_explain
//!
//! Explainability for the CT scan classifier: gradient-weighted class
//! activation mapping (Grad-CAM) and heatmap overlay rendering.
//!
//! This crate provides:
//! - [`ActivationCapture`] - call-local activation/gradient capture
//! - [`grad_cam`] - the activation-mapping algorithm
//! - [`overlay_heatmap`] - colorized saliency blended onto the original scan
//!
//! Capture state is owned by the explanation call, never by the model, so
//! concurrent explanations against one shared model instance cannot observe
//! each other's activations or gradients.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod capture;
mod gradcam;
mod overlay;

pub use capture::{ActivationCapture, CaptureError};
pub use gradcam::{grad_cam, ExplainError, GradCamOutput, SaliencyMap};
pub use overlay::{overlay_heatmap, OverlayError, DEFAULT_ALPHA};
