//! Model lifecycle: load once, cache process-wide, share immutably.
//!
//! burn modules are `Clone + Send` but not `Sync` (parameter state uses
//! interior mutability), so the cache hands out shallow clones instead of
//! references: a clone shares the cached instance's parameter storage, and
//! parameters are never mutated after the checkpoint is applied. The
//! checkpoint itself is deserialized exactly once per process.

use std::sync::Mutex;

use tracing::info;

use ctxai_models::{load_classifier, CtResNet, LayerRegistry};

use crate::config::EngineConfig;
use crate::device::{select_device, EngineBackend, InferenceDevice};
use crate::error::EngineError;

/// A classifier with its checkpoint applied, placed on its device.
///
/// Cloning is cheap: parameter tensors are reference-counted and shared.
#[derive(Debug, Clone)]
pub struct LoadedScanModel {
    model: CtResNet<EngineBackend>,
    device: InferenceDevice,
    registry: LayerRegistry,
    config: EngineConfig,
}

impl LoadedScanModel {
    /// Select a device, load the checkpoint and validate it structurally.
    pub fn load(config: &EngineConfig) -> Result<Self, EngineError> {
        let device = select_device(config.device)?;
        let model = load_classifier::<EngineBackend>(&config.model, &config.checkpoint, &device)?;
        info!(
            checkpoint = %config.checkpoint.display(),
            num_classes = config.num_classes(),
            "loaded classifier checkpoint"
        );
        Ok(Self::from_parts(model, device, config.clone()))
    }

    /// Assemble from an already-constructed model. Used by tests and by
    /// [`Self::load`]; performs no I/O.
    pub fn from_parts(
        model: CtResNet<EngineBackend>,
        device: InferenceDevice,
        config: EngineConfig,
    ) -> Self {
        let registry = model.layer_registry();
        Self {
            model,
            device,
            registry,
            config,
        }
    }

    /// The classifier.
    pub fn model(&self) -> &CtResNet<EngineBackend> {
        &self.model
    }

    /// The device the model lives on.
    pub fn device(&self) -> &InferenceDevice {
        &self.device
    }

    /// The layer registry for activation mapping.
    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    /// The engine configuration this model was loaded with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Guarded load-once cache for a [`LoadedScanModel`].
///
/// Concurrent first use runs exactly one load: the slot mutex serializes
/// loaders, the slot is only populated on success, and later callers receive
/// shallow clones of the one cached instance. A failed load leaves the slot
/// empty so a corrected configuration can retry.
#[derive(Debug)]
pub struct ModelCache {
    slot: Mutex<Option<LoadedScanModel>>,
}

impl ModelCache {
    /// Create an empty cache.
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// A clone of the cached model, if a load has succeeded.
    pub fn get(&self) -> Option<LoadedScanModel> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Return the cached model, loading it on first use.
    pub fn get_or_load(&self, config: &EngineConfig) -> Result<LoadedScanModel, EngineError> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(model) = slot.as_ref() {
            return Ok(model.clone());
        }

        let loaded = LoadedScanModel::load(config)?;
        *slot = Some(loaded.clone());
        Ok(loaded)
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide model cache.
pub fn global_cache() -> &'static ModelCache {
    static CACHE: ModelCache = ModelCache::new();
    &CACHE
}
