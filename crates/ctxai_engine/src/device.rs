//! Compute device and backend selection.
//!
//! burn fixes the backend at compile time, so "fastest available" is
//! expressed as a feature-gated backend alias: with `backend-wgpu` the
//! engine runs on the GPU backend, otherwise on the CPU ndarray backend.
//! The preference enum still matters at runtime: an explicit accelerator
//! request in a CPU-only build fails with [`DeviceError::Unavailable`]
//! instead of silently degrading.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn_autodiff::Autodiff;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Backend the model lives on. Autodiff-wrapped: the explanation path needs
/// a backward pass; prediction runs on the inner backend via
/// `AutodiffModule::valid`.
#[cfg(feature = "backend-wgpu")]
pub type EngineBackend = Autodiff<ctxai_core::backend::Wgpu>;

/// Backend the model lives on. Autodiff-wrapped: the explanation path needs
/// a backward pass; prediction runs on the inner backend via
/// `AutodiffModule::valid`.
#[cfg(not(feature = "backend-wgpu"))]
pub type EngineBackend = Autodiff<ctxai_core::backend::NdArray>;

/// Non-autodiff backend used for prediction and preprocessed tensors.
pub type InnerBackend = <EngineBackend as AutodiffBackend>::InnerBackend;

/// Device type of the engine backend.
pub type InferenceDevice = <EngineBackend as Backend>::Device;

/// Device placement preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DevicePreference {
    /// Accelerator when the build has one, CPU otherwise.
    #[default]
    Auto,
    /// CPU only.
    Cpu,
    /// Accelerator required; fail if the build has none.
    Accelerator,
}

/// Device selection errors.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The requested device is not available.
    #[error("Device unavailable: {0}")]
    Unavailable(String),
}

/// Select the compute device for the given preference.
#[cfg(feature = "backend-wgpu")]
pub fn select_device(preference: DevicePreference) -> Result<InferenceDevice, DeviceError> {
    let device = match preference {
        DevicePreference::Cpu => burn_wgpu::WgpuDevice::Cpu,
        DevicePreference::Auto | DevicePreference::Accelerator => burn_wgpu::WgpuDevice::default(),
    };
    info!(?device, "selected compute device");
    Ok(device)
}

/// Select the compute device for the given preference.
#[cfg(not(feature = "backend-wgpu"))]
pub fn select_device(preference: DevicePreference) -> Result<InferenceDevice, DeviceError> {
    match preference {
        DevicePreference::Accelerator => Err(DeviceError::Unavailable(
            "accelerator requested but this build has no accelerator backend \
             (enable the `backend-wgpu` feature)"
                .to_string(),
        )),
        DevicePreference::Auto | DevicePreference::Cpu => {
            let device = InferenceDevice::default();
            info!(?device, "selected compute device");
            Ok(device)
        }
    }
}
