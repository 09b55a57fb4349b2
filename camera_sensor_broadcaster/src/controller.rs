//! Controller trait, interface declarations and error types.
//!
//! This module defines:
//! - `Controller` trait - Capability interface implemented by every broadcaster/controller
//! - `ControllerError` enum - Errors reported by lifecycle hooks
//! - `ControllerContext` - Everything a controller receives at init time
//! - `InterfaceConfiguration` - Declared command/state interfaces
//! - `ControllerFactory` type alias - Factory function type
//!
//! # Lifecycle
//!
//! 1. `on_init()` - Once, right after construction
//! 2. `on_configure()` - `Unconfigured → Inactive`
//! 3. `on_activate()` - `Inactive → Active`, hardware interfaces become available
//! 4. `update()` - Every host cycle while `Active`
//! 5. `on_deactivate()` - `Active → Inactive`
//! 6. `on_shutdown()` - Any state `→ Finalized`
//!
//! # Timing Contracts
//!
//! | Operation | RT Constraint |
//! |-----------|---------------|
//! | `on_init()` / `on_configure()` | None (may allocate, may block) |
//! | `on_activate()` / `on_deactivate()` | None (between cycles) |
//! | `update()` | **HARD**: no blocking, no allocation |

use crate::transport::{Transport, TransportError};
use broadcaster_common::hal::StateInterfaceProvider;
use broadcaster_common::msgs::{Image, Time};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Error types for controller lifecycle hooks.
#[derive(Debug, Clone, Error)]
pub enum ControllerError {
    /// Init stage failed (bad name, unparseable parameters).
    #[error("Init failed: {0}")]
    Init(String),

    /// Parameters are present but invalid for the requested transition.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport endpoint could not be created.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Real-time publisher could not be started.
    #[error("Publisher error: {0}")]
    Publisher(String),
}

impl ControllerError {
    /// True for failures caused by the transport rather than by parameters.
    pub fn is_transport(&self) -> bool {
        matches!(self, ControllerError::Transport(_) | ControllerError::Publisher(_))
    }
}

/// Result of a single `update()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    /// Cycle completed (published or cleanly skipped).
    Ok,
    /// Cycle hit a fault the host should know about.
    Error,
}

/// How a controller claims interfaces from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceConfigurationType {
    /// Claims every available interface.
    All,
    /// Claims exactly the listed interfaces.
    Individual,
    /// Claims nothing.
    None,
}

/// Declared set of interfaces a controller consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceConfiguration {
    /// Claim kind.
    pub kind: InterfaceConfigurationType,
    /// Full interface names, meaningful for `Individual`.
    pub names: Vec<String>,
}

impl InterfaceConfiguration {
    /// Claim nothing.
    pub fn none() -> Self {
        Self {
            kind: InterfaceConfigurationType::None,
            names: Vec::new(),
        }
    }

    /// Claim exactly `names`.
    pub fn individual(names: Vec<String>) -> Self {
        Self {
            kind: InterfaceConfigurationType::Individual,
            names,
        }
    }
}

/// Everything a controller receives at init time.
#[derive(Clone)]
pub struct ControllerContext {
    /// Instance name; also the namespace of published topics.
    pub name: String,
    /// Raw controller parameters, deserialized by the controller itself.
    pub params: toml::Table,
    /// Transport used to create publish endpoints at configure time.
    pub transport: Arc<dyn Transport<Image>>,
}

/// Factory function type for creating controller instances.
pub type ControllerFactory = fn() -> Box<dyn Controller>;

/// Capability interface every host-managed controller implements.
///
/// The host serializes all calls: lifecycle hooks never run concurrently
/// with `update()`.
pub trait Controller: Send {
    /// Registered type name (e.g. `camera_sensor_broadcaster/CameraSensorBroadcaster`).
    fn type_name(&self) -> &'static str;

    /// Receive name, parameters and transport.
    ///
    /// # Errors
    /// Return `ControllerError::Init` if parameters cannot be parsed.
    fn on_init(&mut self, ctx: ControllerContext) -> Result<(), ControllerError>;

    /// Interfaces this controller writes to.
    fn command_interface_configuration(&self) -> InterfaceConfiguration;

    /// Interfaces this controller reads from.
    fn state_interface_configuration(&self) -> InterfaceConfiguration;

    /// Validate parameters and allocate everything `update()` needs.
    ///
    /// On error no partial state may remain.
    fn on_configure(&mut self) -> Result<(), ControllerError>;

    /// Bind to hardware interfaces.
    fn on_activate(&mut self, interfaces: &dyn StateInterfaceProvider)
    -> Result<(), ControllerError>;

    /// Release hardware interfaces.
    fn on_deactivate(&mut self) -> Result<(), ControllerError>;

    /// Release everything before the instance is finalized.
    fn on_shutdown(&mut self) -> Result<(), ControllerError> {
        Ok(())
    }

    /// Execute one cycle.
    ///
    /// # Arguments
    /// * `time` - Host time at cycle start
    /// * `period` - Elapsed time since the previous cycle
    fn update(&mut self, time: Time, period: Duration) -> ReturnType;
}

/// Validate a controller instance name.
///
/// Names become topic namespaces: non-empty, ASCII alphanumerics and `_`,
/// not starting with a digit.
pub fn validate_controller_name(name: &str) -> Result<(), ControllerError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(ControllerError::Init("controller name cannot be empty".to_string()));
    };
    if first.is_ascii_digit() {
        return Err(ControllerError::Init(format!(
            "controller name '{name}' must not start with a digit"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ControllerError::Init(format!(
            "controller name '{name}' may only contain [A-Za-z0-9_]"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_name_rules() {
        assert!(validate_controller_name("test_camera_sensor_broadcaster").is_ok());
        assert!(validate_controller_name("cam2").is_ok());
        assert!(matches!(validate_controller_name(""), Err(ControllerError::Init(_))));
        assert!(validate_controller_name("2cam").is_err());
        assert!(validate_controller_name("cam/raw").is_err());
        assert!(validate_controller_name("cam raw").is_err());
    }

    #[test]
    fn interface_configuration_constructors() {
        let none = InterfaceConfiguration::none();
        assert_eq!(none.kind, InterfaceConfigurationType::None);
        assert!(none.names.is_empty());

        let ind = InterfaceConfiguration::individual(vec!["cam/data".into()]);
        assert_eq!(ind.kind, InterfaceConfigurationType::Individual);
        assert_eq!(ind.names, vec!["cam/data".to_string()]);
    }

    #[test]
    fn transport_errors_are_classified() {
        let err: ControllerError = TransportError::Unavailable("down".into()).into();
        assert!(err.is_transport());
        assert!(err.to_string().contains("down"));
        assert!(!ControllerError::Configuration("x".into()).is_transport());
    }
}
