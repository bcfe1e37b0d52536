//! # ctxai
//!
//! CT lung scan classification with gradient-based explanations in Rust.
//!
//! ctxai classifies grayscale CT lung images into a fixed set of diagnostic
//! categories and renders a Grad-CAM heatmap showing where the model looked:
//!
//! - **Models**: a residual CNN with a single-channel stem, a named-layer
//!   registry for instrumentation, and validated checkpoint loading
//! - **Engine**: preprocessing, guarded load-once model lifecycle, and the
//!   byte-level predict/explain API
//! - **Explain**: call-local activation/gradient capture, Grad-CAM, and
//!   heatmap overlay rendering
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ctxai::prelude::*;
//!
//! let config = EngineConfig::new("checkpoints/ct_classifier.mpk");
//! let engine = InferenceEngine::initialize(&config)?;
//!
//! let bytes = std::fs::read("scan.png")?;
//! let prediction = engine.predict_bytes(&bytes)?;
//! let explanation = engine.explain_bytes(&bytes, ExplainOptions::default())?;
//! std::fs::write("cam_output.png", &explanation.heatmap_png)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray
//! - `backend-wgpu`: GPU backend using WGPU (Metal on macOS, Vulkan on
//!   Linux/Windows)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use ctxai_core as core;
pub use ctxai_engine as engine;
pub use ctxai_explain as explain;
pub use ctxai_models as models;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use ctxai::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use ctxai_core::{argmax, CoreError, ScanShape};

    // Models
    pub use ctxai_models::{
        load_classifier, save_classifier, CheckpointError, CtResNet, CtResNetConfig,
        LayerRegistry, TapPoint,
    };

    // Engine
    pub use ctxai_engine::{
        predict, preprocess_scan, DevicePreference, EngineConfig, EngineError, ExplainOptions,
        Explanation, InferenceEngine, LoadedScanModel, ModelCache, Prediction, PreprocessedScan,
    };

    // Explain
    pub use ctxai_explain::{
        grad_cam, overlay_heatmap, ExplainError, GradCamOutput, SaliencyMap, DEFAULT_ALPHA,
    };
}
