//! Checkpoint save/load for the classifier.
//!
//! Checkpoints are written with burn's record system in named MessagePack
//! format (`*.mpk`) — a serialized mapping from parameter name to numeric
//! array, produced by the external training process.
//!
//! Loading validates the checkpoint structurally against the configured
//! model: a head width or stem channel count that disagrees with the config
//! aborts the load with [`CheckpointError::ShapeMismatch`] rather than
//! keeping the foreign shapes.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};

use crate::resnet::{CtResNet, CtResNetConfig};

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Checkpoint-related errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Checkpoint file does not exist.
    #[error("Checkpoint not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Error deserializing the checkpoint.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),

    /// Error saving the checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// A parameter in the checkpoint disagrees with the configured model.
    #[error("Checkpoint shape mismatch for {param}: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Name of the offending parameter.
        param: String,
        /// Size expected by the configured model.
        expected: usize,
        /// Size found in the checkpoint.
        got: usize,
    },
}

/// Save a trained classifier to a checkpoint file.
pub fn save_classifier<B: Backend>(model: &CtResNet<B>, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    recorder
        .record(model.clone().into_record(), path.to_path_buf())
        .map_err(|e| CheckpointError::Save(e.to_string()))?;
    Ok(())
}

/// Load a classifier from a checkpoint file.
///
/// Constructs the model from `config`, applies the checkpoint record, then
/// validates that the loaded head width and stem channel count match the
/// config. Validation failures abort the load; no partially-loaded model is
/// returned.
pub fn load_classifier<B: Backend>(
    config: &CtResNetConfig,
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<CtResNet<B>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(CheckpointError::NotFound(path.to_path_buf()));
    }

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let record = recorder
        .load(path.to_path_buf(), device)
        .map_err(|e| CheckpointError::Load(e.to_string()))?;

    let model = config.init::<B>(device).load_record(record);

    if model.num_classes() != config.num_classes {
        return Err(CheckpointError::ShapeMismatch {
            param: "fc.weight".to_string(),
            expected: config.num_classes,
            got: model.num_classes(),
        });
    }
    if model.in_channels() != config.in_channels {
        return Err(CheckpointError::ShapeMismatch {
            param: "stem.weight".to_string(),
            expected: config.in_channels,
            got: model.in_channels(),
        });
    }

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn tiny_config(num_classes: usize) -> CtResNetConfig {
        CtResNetConfig {
            in_channels: 1,
            num_classes,
            stage_widths: [8, 8, 16, 16],
            blocks_per_stage: 1,
            norm_groups: 4,
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ctxai_ckpt_{}_{}.mpk", std::process::id(), name))
    }

    #[test]
    fn test_save_load_round_trip() {
        let device = Default::default();
        let config = tiny_config(4);
        let model = config.init::<TestBackend>(&device);
        let path = temp_path("round_trip");

        save_classifier(&model, &path).unwrap();
        let loaded = load_classifier::<TestBackend>(&config, &path, &device).unwrap();

        let x = Tensor::<TestBackend, 4>::ones([1, 1, 32, 32], &device);
        let original = model.forward(x.clone()).into_data();
        let reloaded = loaded.forward(x).into_data();
        reloaded.assert_approx_eq(&original, 4);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file() {
        let device = Default::default();
        let config = tiny_config(4);
        let err =
            load_classifier::<TestBackend>(&config, temp_path("does_not_exist"), &device)
                .unwrap_err();
        assert!(matches!(err, CheckpointError::NotFound(_)));
    }

    #[test]
    fn test_load_head_width_mismatch() {
        let device = Default::default();
        let path = temp_path("head_mismatch");

        // Checkpoint trained with 3 classes, engine configured for 4.
        let trained = tiny_config(3).init::<TestBackend>(&device);
        save_classifier(&trained, &path).unwrap();

        let err = load_classifier::<TestBackend>(&tiny_config(4), &path, &device).unwrap_err();
        match err {
            CheckpointError::ShapeMismatch {
                param,
                expected,
                got,
            } => {
                assert_eq!(param, "fc.weight");
                assert_eq!(expected, 4);
                assert_eq!(got, 3);
            }
            other => panic!("expected ShapeMismatch, got {other:?}"),
        }

        let _ = std::fs::remove_file(&path);
    }
}
