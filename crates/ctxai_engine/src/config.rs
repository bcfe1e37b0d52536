//! Engine configuration.
//!
//! The checkpoint path and class count are environment-provided handoffs
//! from the external training pipeline; everything else has fixed defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use ctxai_models::CtResNetConfig;

use crate::device::DevicePreference;
use crate::error::EngineError;

/// Default square input size in pixels.
pub const DEFAULT_IMAGE_SIZE: usize = 224;

/// Default diagnostic class count.
pub const DEFAULT_NUM_CLASSES: usize = 4;

/// Default instrumentation target: the last residual stage.
pub const DEFAULT_TARGET_LAYER: &str = "layer4";

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the trained parameter checkpoint.
    pub checkpoint: PathBuf,
    /// Classifier architecture configuration.
    pub model: CtResNetConfig,
    /// Square input size scans are resized to.
    pub image_size: usize,
    /// Default layer for activation mapping.
    pub target_layer: String,
    /// Device placement preference.
    pub device: DevicePreference,
}

impl EngineConfig {
    /// Config with defaults for the given checkpoint path.
    pub fn new(checkpoint: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint: checkpoint.into(),
            model: CtResNetConfig::new(DEFAULT_NUM_CLASSES),
            image_size: DEFAULT_IMAGE_SIZE,
            target_layer: DEFAULT_TARGET_LAYER.to_string(),
            device: DevicePreference::default(),
        }
    }

    /// Build the config from environment variables.
    ///
    /// `CTXAI_CHECKPOINT` is required; `CTXAI_NUM_CLASSES`,
    /// `CTXAI_IMAGE_SIZE` and `CTXAI_TARGET_LAYER` override their defaults.
    pub fn from_env() -> Result<Self, EngineError> {
        let checkpoint = std::env::var("CTXAI_CHECKPOINT")
            .map_err(|_| EngineError::Config("CTXAI_CHECKPOINT is not set".to_string()))?;
        let mut config = Self::new(checkpoint);

        if let Ok(value) = std::env::var("CTXAI_NUM_CLASSES") {
            config.model.num_classes = value
                .parse()
                .map_err(|_| EngineError::Config(format!("invalid CTXAI_NUM_CLASSES: {value}")))?;
        }
        if let Ok(value) = std::env::var("CTXAI_IMAGE_SIZE") {
            config.image_size = value
                .parse()
                .map_err(|_| EngineError::Config(format!("invalid CTXAI_IMAGE_SIZE: {value}")))?;
        }
        if let Ok(value) = std::env::var("CTXAI_TARGET_LAYER") {
            config.target_layer = value;
        }

        Ok(config)
    }

    /// The configured class count.
    pub fn num_classes(&self) -> usize {
        self.model.num_classes
    }
}
