//! Engine error umbrella.

use thiserror::Error;

use ctxai_explain::{ExplainError, OverlayError};
use ctxai_models::{CheckpointError, RegistryError};

use crate::device::DeviceError;
use crate::preprocess::PreprocessError;

/// Errors surfaced by the engine API.
///
/// Each variant keeps its source kind distinguishable so the service layer
/// can translate it into the right caller-facing response. None of these are
/// transient; the engine never retries internally.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input image could not be preprocessed.
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    /// Checkpoint missing, unreadable or structurally incompatible.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Requested compute device is not available.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Target layer name did not resolve.
    #[error(transparent)]
    Layer(#[from] RegistryError),

    /// Activation mapping failed.
    #[error(transparent)]
    Explain(#[from] ExplainError),

    /// Heatmap rendering failed.
    #[error(transparent)]
    Overlay(#[from] OverlayError),

    /// Invalid engine configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to encode the heatmap image.
    #[error("Failed to encode heatmap: {0}")]
    Encode(String),

    /// Failed to extract data from a tensor.
    #[error("Tensor data error: {0}")]
    Tensor(String),
}
