//! Byte-level engine API consumed by the service layer.

use std::io::Cursor;

use tracing::info;

use ctxai_explain::{grad_cam, overlay_heatmap, DEFAULT_ALPHA};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::lifecycle::{global_cache, LoadedScanModel};
use crate::predict::{predict, Prediction};
use crate::preprocess::preprocess_scan;

/// Options for an explanation call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplainOptions<'a> {
    /// Layer to instrument; defaults to the configured target layer.
    pub target_layer: Option<&'a str>,
    /// Class whose score seeds the backward pass; defaults to the predicted
    /// class.
    pub target_class: Option<usize>,
    /// Heatmap blend weight; defaults to 0.4.
    pub alpha: Option<f32>,
}

/// An explanation result: the prediction plus the rendered heatmap.
///
/// Either every field is populated from one completed forward+backward
/// cycle, or the call failed — there are no partial results.
#[derive(Debug, Clone)]
pub struct Explanation {
    /// Class predicted by the explanation's own forward pass.
    pub class_index: usize,
    /// Softmax probabilities from that forward pass.
    pub probabilities: Vec<f32>,
    /// PNG-encoded heatmap overlay at the original image resolution.
    pub heatmap_png: Vec<u8>,
}

/// The inference and explainability engine.
///
/// Cheap to clone per request or worker thread: the loaded model inside is
/// a shallow clone sharing the cached instance's parameter storage.
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    model: LoadedScanModel,
}

impl InferenceEngine {
    /// Initialize against the process-wide model cache, loading the
    /// checkpoint on first use.
    pub fn initialize(config: &EngineConfig) -> Result<Self, EngineError> {
        let model = global_cache().get_or_load(config)?;
        Ok(Self { model })
    }

    /// Build an engine around an already-loaded model.
    pub fn from_model(model: LoadedScanModel) -> Self {
        Self { model }
    }

    /// The loaded model.
    pub fn model(&self) -> &LoadedScanModel {
        &self.model
    }

    /// Classify an encoded PNG/JPEG scan.
    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<Prediction, EngineError> {
        let scan = preprocess_scan(bytes, self.model.config().image_size, self.model.device())?;
        predict(&self.model, &scan)
    }

    /// Classify an encoded scan and render a Grad-CAM heatmap for it.
    ///
    /// The target layer is resolved before any forward pass runs, so an
    /// unknown name costs no compute.
    pub fn explain_bytes(
        &self,
        bytes: &[u8],
        options: ExplainOptions<'_>,
    ) -> Result<Explanation, EngineError> {
        let config = self.model.config();
        let layer_name = options.target_layer.unwrap_or(&config.target_layer);
        let tap = self.model.registry().resolve(layer_name)?;

        let scan = preprocess_scan(bytes, config.image_size, self.model.device())?;
        let output = grad_cam(
            self.model.model(),
            scan.tensor.clone(),
            tap,
            options.target_class,
        )?;
        info!(
            layer = %tap,
            class = output.class_index,
            zero_map = output.saliency.is_uniformly_zero(),
            "computed activation map"
        );

        let heatmap = overlay_heatmap(
            &scan.original,
            &output.saliency,
            options.alpha.unwrap_or(DEFAULT_ALPHA),
        )?;
        let mut png = Cursor::new(Vec::new());
        heatmap
            .write_to(&mut png, image::ImageFormat::Png)
            .map_err(|e| EngineError::Encode(e.to_string()))?;

        Ok(Explanation {
            class_index: output.class_index,
            probabilities: output.probabilities,
            heatmap_png: png.into_inner(),
        })
    }
}
