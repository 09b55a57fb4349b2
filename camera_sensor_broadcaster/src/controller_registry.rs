//! Controller registry.
//!
//! Maps controller type names to factories so the host can instantiate a
//! controller from a configuration string. Constructed at startup and
//! passed by reference; no global state.

use crate::broadcaster::{CAMERA_SENSOR_BROADCASTER, create_controller};
use crate::controller::{Controller, ControllerFactory};
use std::collections::HashMap;
use thiserror::Error;

/// Error types for registry operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// A factory is already registered under this name.
    #[error("Controller type '{0}' is already registered")]
    Duplicate(String),

    /// No factory registered under this name.
    #[error("Controller type not found: {0}")]
    NotFound(String),
}

/// Registry of available controller types.
pub struct ControllerRegistry {
    factories: HashMap<&'static str, ControllerFactory>,
}

impl ControllerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in controller type.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        // Fresh registry: cannot collide.
        let _ = registry.register(CAMERA_SENSOR_BROADCASTER, create_controller);
        registry
    }

    /// Register a controller factory.
    ///
    /// # Errors
    /// `RegistryError::Duplicate` if `name` is taken.
    pub fn register(
        &mut self,
        name: &'static str,
        factory: ControllerFactory,
    ) -> Result<(), RegistryError> {
        if self.factories.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Instantiate a controller by type name.
    ///
    /// # Errors
    /// `RegistryError::NotFound` for unknown names.
    pub fn create(&self, name: &str) -> Result<Box<dyn Controller>, RegistryError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        Ok(factory())
    }

    /// All registered type names, sorted.
    pub fn list(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for ControllerRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_contains_camera_broadcaster() {
        let registry = ControllerRegistry::with_builtin();
        assert_eq!(registry.list(), vec![CAMERA_SENSOR_BROADCASTER]);

        let controller = registry.create(CAMERA_SENSOR_BROADCASTER).expect("should create");
        assert_eq!(controller.type_name(), CAMERA_SENSOR_BROADCASTER);
    }

    #[test]
    fn unknown_type_not_found() {
        let registry = ControllerRegistry::new();
        assert!(matches!(
            registry.create("range_sensor_broadcaster/RangeSensorBroadcaster"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = ControllerRegistry::new();
        registry.register("alpha", create_controller).unwrap();
        assert!(matches!(
            registry.register("alpha", create_controller),
            Err(RegistryError::Duplicate(_))
        ));
        registry.register("beta", create_controller).unwrap();
        assert_eq!(registry.list(), vec!["alpha", "beta"]);
    }
}
