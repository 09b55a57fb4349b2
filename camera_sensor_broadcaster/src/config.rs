//! Broadcaster process configuration (`broadcaster.toml`).
//!
//! ```toml
//! [shared]
//! service_name = "camera-broadcaster-01"
//! log_level = "info"
//!
//! [host]
//! cycle_time_us = 10000
//! controller_name = "camera_sensor_broadcaster"
//! controller_type = "camera_sensor_broadcaster/CameraSensorBroadcaster"
//! max_configure_failures = 3
//!
//! [params]
//! sensor_name = "camera_sensor"
//! frame_id = "camera_sensor_frame"
//! ```

use crate::broadcaster::{BroadcasterParams, CAMERA_SENSOR_BROADCASTER};
use crate::controller::validate_controller_name;
use broadcaster_common::config::{ConfigError, SharedConfig};
use broadcaster_common::consts::{CYCLE_TIME_US, DEFAULT_MAX_CONFIGURE_FAILURES};
use serde::{Deserialize, Serialize};

/// Host loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Cycle period in microseconds.
    pub cycle_time_us: u64,
    /// Controller instance name (topic namespace).
    pub controller_name: String,
    /// Registered controller type to instantiate.
    pub controller_type: String,
    /// Consecutive configure transport failures before finalizing.
    pub max_configure_failures: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: CYCLE_TIME_US,
            controller_name: "camera_sensor_broadcaster".to_string(),
            controller_type: CAMERA_SENSOR_BROADCASTER.to_string(),
            max_configure_failures: DEFAULT_MAX_CONFIGURE_FAILURES,
        }
    }
}

/// Complete broadcaster process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcasterConfig {
    /// Common settings.
    pub shared: SharedConfig,
    /// Host loop settings.
    #[serde(default)]
    pub host: HostConfig,
    /// Raw controller parameters, handed to the controller at init.
    #[serde(default)]
    pub params: toml::Table,
}

impl BroadcasterConfig {
    /// Typed view of `params`.
    pub fn broadcaster_params(&self) -> Result<BroadcasterParams, ConfigError> {
        BroadcasterParams::from_table(self.params.clone())
    }

    /// Validate everything the process needs before bring-up.
    ///
    /// Empty `sensor_name`/`frame_id` are deliberately not checked here:
    /// the component reports those itself when configured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.host.cycle_time_us == 0 {
            return Err(ConfigError::ValidationError(
                "cycle_time_us must be positive".to_string(),
            ));
        }
        if self.host.max_configure_failures == 0 {
            return Err(ConfigError::ValidationError(
                "max_configure_failures must be positive".to_string(),
            ));
        }
        validate_controller_name(&self.host.controller_name)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        self.broadcaster_params()?.validate_layout()
    }
}
