//! Named layer registry for activation-map instrumentation.
//!
//! The activation-mapping engine instruments one internal layer of the
//! classifier. Callers address that layer by a stable name; the registry
//! resolves the name to a [`TapPoint`] handle before any forward pass runs,
//! so an unknown name fails early with no wasted compute.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for layer registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Layer name not found in the registry.
    #[error("Layer '{name}' not found in registry (known layers: {known})")]
    UnknownLayer {
        /// The name that failed to resolve.
        name: String,
        /// Comma-separated list of registered layer names.
        known: String,
    },
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Handle to an internal layer of [`crate::CtResNet`] that can be tapped
/// for activation and gradient capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TapPoint {
    /// Output of the stem convolution block (after pooling).
    Stem,
    /// Output of the first residual stage.
    Layer1,
    /// Output of the second residual stage.
    Layer2,
    /// Output of the third residual stage.
    Layer3,
    /// Output of the fourth (last) residual stage.
    Layer4,
}

impl TapPoint {
    /// The last convolutional stage, the default explanation target.
    pub const LAST: TapPoint = TapPoint::Layer4;

    /// Stable name of this tap point.
    pub fn name(&self) -> &'static str {
        match self {
            TapPoint::Stem => "stem",
            TapPoint::Layer1 => "layer1",
            TapPoint::Layer2 => "layer2",
            TapPoint::Layer3 => "layer3",
            TapPoint::Layer4 => "layer4",
        }
    }

    /// All tap points, in forward order.
    pub fn all() -> [TapPoint; 5] {
        [
            TapPoint::Stem,
            TapPoint::Layer1,
            TapPoint::Layer2,
            TapPoint::Layer3,
            TapPoint::Layer4,
        ]
    }
}

impl std::fmt::Display for TapPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Registry mapping stable layer names to [`TapPoint`] handles.
///
/// Built at model construction time so the set of instrumentable layers is
/// fixed and validated up front.
#[derive(Debug, Clone)]
pub struct LayerRegistry {
    layers: HashMap<String, TapPoint>,
}

impl LayerRegistry {
    /// Registry for the classifier architecture.
    pub fn for_classifier() -> Self {
        let mut layers = HashMap::new();
        for tap in TapPoint::all() {
            layers.insert(tap.name().to_string(), tap);
        }
        Self { layers }
    }

    /// Resolve a layer name to a tap handle.
    pub fn resolve(&self, name: &str) -> Result<TapPoint> {
        self.layers
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::UnknownLayer {
                name: name.to_string(),
                known: self.names().join(", "),
            })
    }

    /// All registered layer names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.layers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for LayerRegistry {
    fn default() -> Self {
        Self::for_classifier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_layers() {
        let registry = LayerRegistry::for_classifier();
        assert_eq!(registry.resolve("layer4").unwrap(), TapPoint::Layer4);
        assert_eq!(registry.resolve("stem").unwrap(), TapPoint::Stem);
    }

    #[test]
    fn test_resolve_unknown_layer() {
        let registry = LayerRegistry::for_classifier();
        let err = registry.resolve("backbone.conv9").unwrap_err();
        match err {
            RegistryError::UnknownLayer { name, known } => {
                assert_eq!(name, "backbone.conv9");
                assert!(known.contains("layer4"));
            }
        }
    }

    #[test]
    fn test_tap_point_names_round_trip() {
        let registry = LayerRegistry::for_classifier();
        for tap in TapPoint::all() {
            assert_eq!(registry.resolve(tap.name()).unwrap(), tap);
        }
    }

    #[test]
    fn test_last_is_layer4() {
        assert_eq!(TapPoint::LAST, TapPoint::Layer4);
        assert_eq!(TapPoint::LAST.name(), "layer4");
    }
}
