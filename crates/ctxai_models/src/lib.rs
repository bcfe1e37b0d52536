//! # ctxai_models
//!
//! Classifier model for CT lung scans.
//!
//! This crate provides:
//! - [`CtResNet`] - a residual CNN with a single-channel input stem and a
//!   replaceable classification head
//! - [`LayerRegistry`] - stable layer names resolved to [`TapPoint`] handles
//!   for activation-map instrumentation
//! - Checkpoint save/load with structural validation against the configured
//!   model

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod registry;
pub mod resnet;

pub use checkpoint::{load_classifier, save_classifier, CheckpointError};
pub use registry::{LayerRegistry, RegistryError, TapPoint};
pub use resnet::{CtResNet, CtResNetConfig, ResidualBlock};
