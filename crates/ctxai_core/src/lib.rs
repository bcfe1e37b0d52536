//! # ctxai_core
//!
//! Core types for ctxai, a CT lung classification and explainability engine.
//!
//! This crate provides:
//! - [`ScanShape`] for single-channel image tensor shape metadata
//! - Error types and common utilities
//! - Backend type aliases behind feature flags
//!
//! ## Shape Convention
//!
//! Scan tensors follow the convention `(B, C, H, W)`:
//! - `B`: Batch size (always 1 for the inference engine)
//! - `C`: Channels (1, grayscale)
//! - `H`: Height in pixels
//! - `W`: Width in pixels

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod num;
mod shape;

pub use error::{CoreError, Result};
pub use num::argmax;
pub use shape::ScanShape;

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;

    #[cfg(feature = "backend-wgpu")]
    pub use burn_wgpu::Wgpu;
}
