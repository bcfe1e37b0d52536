//! Forward-pass prediction.

use burn::module::AutodiffModule;
use burn::tensor::activation::softmax;
use serde::{Deserialize, Serialize};

use ctxai_core::argmax;

use crate::error::EngineError;
use crate::lifecycle::LoadedScanModel;
use crate::preprocess::PreprocessedScan;
use crate::InnerBackend;

/// A classification result: the predicted class and the full probability
/// distribution it was taken from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Arg-max index of `probabilities`.
    pub class_index: usize,
    /// Softmax probabilities, one per class, summing to 1.
    pub probabilities: Vec<f32>,
}

/// Run a single forward pass and return the predicted class with its
/// probability distribution.
///
/// Runs on the inner backend — no gradient tracking, no capture state
/// touched. The class index is computed from the returned probability
/// vector itself, so the two output fields cannot disagree.
pub fn predict(
    model: &LoadedScanModel,
    scan: &PreprocessedScan<InnerBackend>,
) -> Result<Prediction, EngineError> {
    let logits = model.model().valid().forward(scan.tensor.clone());
    let probabilities: Vec<f32> = softmax(logits, 1)
        .into_data()
        .to_vec()
        .map_err(|e| EngineError::Tensor(format!("{e:?}")))?;
    let class_index = argmax(&probabilities);

    Ok(Prediction {
        class_index,
        probabilities,
    })
}
