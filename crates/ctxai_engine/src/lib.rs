//! # ctxai_engine
//!
//! Inference engine for CT lung scan classification.
//!
//! This crate provides:
//! - [`preprocess_scan`] - decode, resize and normalize a scan image
//! - [`ModelCache`] / [`LoadedScanModel`] - guarded load-once model lifecycle
//! - [`predict`] - forward-pass prediction with softmax probabilities
//! - [`InferenceEngine`] - the byte-level API consumed by a service layer
//!
//! ## Concurrency
//!
//! Model parameters are never mutated after the checkpoint is applied, and
//! the cache hands out shallow clones that share the cached instance's
//! parameter storage, so predictions may run freely in parallel across
//! worker threads. Explanation state is call-local (see `ctxai_explain`),
//! so concurrent explanations do not interfere either. The first load is a
//! load-once barrier: exactly one loader runs, every caller is served from
//! the same cached instance, and a failed load leaves the cache empty for a
//! corrected retry.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod device;
mod engine;
mod error;
mod lifecycle;
mod predict;
mod preprocess;

pub use config::{EngineConfig, DEFAULT_IMAGE_SIZE, DEFAULT_NUM_CLASSES, DEFAULT_TARGET_LAYER};
pub use device::{
    select_device, DeviceError, DevicePreference, EngineBackend, InferenceDevice, InnerBackend,
};
pub use engine::{ExplainOptions, Explanation, InferenceEngine};
pub use error::EngineError;
pub use lifecycle::{global_cache, LoadedScanModel, ModelCache};
pub use predict::{predict, Prediction};
pub use preprocess::{preprocess_scan, PreprocessError, PreprocessedScan};
