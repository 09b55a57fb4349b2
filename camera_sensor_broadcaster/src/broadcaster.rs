//! Camera sensor broadcaster.
//!
//! Reads the raw frame of one camera from the HAL every cycle and publishes
//! it as an [`Image`] on `/<controller_name>/raw`. Pure observer: claims the
//! camera's state interfaces and no command interfaces.

use crate::camera_sensor::{CameraSensor, SensorRead};
use crate::controller::{
    Controller, ControllerContext, ControllerError, InterfaceConfiguration, ReturnType,
};
use crate::realtime_publisher::{PublishStats, RealtimePublisher};
use crate::transport::Transport;
use broadcaster_common::config::ConfigError;
use broadcaster_common::consts::{MAX_FRAME_BYTES, RAW_TOPIC_SUFFIX};
use broadcaster_common::hal::StateInterfaceProvider;
use broadcaster_common::msgs::{Image, Time};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Registered type name of [`CameraSensorBroadcaster`].
pub const CAMERA_SENSOR_BROADCASTER: &str = "camera_sensor_broadcaster/CameraSensorBroadcaster";

/// Parameters of a camera sensor broadcaster.
///
/// # TOML Example
///
/// ```toml
/// [params]
/// sensor_name = "camera_sensor"
/// frame_id = "camera_sensor_frame"
/// height = 480
/// width = 640
/// encoding = "bgr8"
/// is_bigendian = false
/// step = 1920
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BroadcasterParams {
    /// Camera name; state interfaces are looked up as `<sensor_name>/data`.
    pub sensor_name: String,
    /// Coordinate frame stamped on every message.
    pub frame_id: String,
    /// Image rows.
    pub height: u32,
    /// Image columns.
    pub width: u32,
    /// Pixel encoding tag.
    pub encoding: String,
    /// Multi-byte pixel values are big-endian.
    pub is_bigendian: bool,
    /// Row length in bytes.
    pub step: u32,
    /// Consecutive unbound cycles after which `update` reports an error.
    /// `None` keeps the fault soft forever.
    pub binding_fault_limit: Option<u32>,
}

impl Default for BroadcasterParams {
    fn default() -> Self {
        Self {
            sensor_name: String::new(),
            frame_id: String::new(),
            height: 480,
            width: 640,
            encoding: "rgb8".to_string(),
            is_bigendian: false,
            step: 1920,
            binding_fault_limit: None,
        }
    }
}

impl BroadcasterParams {
    /// Deserialize from a raw parameter table.
    pub fn from_table(table: toml::Table) -> Result<Self, ConfigError> {
        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError(e.to_string()))
    }

    /// Check the image layout description.
    ///
    /// Name checks are left to `configure`, which reports them as
    /// configuration errors of the component itself.
    pub fn validate_layout(&self) -> Result<(), ConfigError> {
        if self.height == 0 || self.width == 0 {
            return Err(ConfigError::ValidationError(format!(
                "image size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.step < self.width {
            return Err(ConfigError::ValidationError(format!(
                "step {} is shorter than width {}",
                self.step, self.width
            )));
        }
        if self.encoding.is_empty() {
            return Err(ConfigError::ValidationError(
                "encoding cannot be empty".to_string(),
            ));
        }
        self.frame_len().map(|_| ())
    }

    /// Payload length `step * height` in bytes, bounded by [`MAX_FRAME_BYTES`].
    pub fn frame_len(&self) -> Result<usize, ConfigError> {
        (self.step as usize)
            .checked_mul(self.height as usize)
            .filter(|len| *len <= MAX_FRAME_BYTES)
            .ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "frame of {} rows x {} bytes exceeds {} bytes",
                    self.height, self.step, MAX_FRAME_BYTES
                ))
            })
    }
}

/// Fully-qualified topic a broadcaster named `controller_name` publishes on.
pub fn raw_topic(controller_name: &str) -> String {
    format!("/{controller_name}/{RAW_TOPIC_SUFFIX}")
}

/// Latent binding fault tracking.
#[derive(Debug, Default)]
struct BindingFault {
    consecutive: u32,
    reported: bool,
    escalated: bool,
}

impl BindingFault {
    fn record(&mut self, sensor: &str, limit: Option<u32>) -> ReturnType {
        self.consecutive = self.consecutive.saturating_add(1);
        if !self.reported {
            self.reported = true;
            error!(
                "Camera '{}' has no bound state interfaces; skipping publication",
                sensor
            );
        }
        match limit {
            Some(limit) if self.consecutive >= limit => {
                if !self.escalated {
                    self.escalated = true;
                    error!(
                        "Camera '{}' unbound for {} consecutive cycles; reporting error",
                        sensor, self.consecutive
                    );
                }
                ReturnType::Error
            }
            _ => ReturnType::Ok,
        }
    }

    #[inline]
    fn clear(&mut self) {
        if self.consecutive != 0 {
            *self = Self::default();
        }
    }
}

/// Broadcaster publishing one camera's raw frames.
pub struct CameraSensorBroadcaster {
    name: String,
    params: BroadcasterParams,
    transport: Option<Arc<dyn Transport<Image>>>,
    camera_sensor: Option<CameraSensor>,
    realtime_publisher: Option<RealtimePublisher<Image>>,
    /// Set between `on_activate` and `on_deactivate`.
    active: bool,
    fault: BindingFault,
}

impl CameraSensorBroadcaster {
    /// Create an uninitialized broadcaster.
    pub fn new() -> Self {
        Self {
            name: String::new(),
            params: BroadcasterParams::default(),
            transport: None,
            camera_sensor: None,
            realtime_publisher: None,
            active: false,
            fault: BindingFault::default(),
        }
    }

    /// Current parameters.
    pub fn params(&self) -> &BroadcasterParams {
        &self.params
    }

    /// Delivery counters of the configured publisher.
    pub fn publish_stats(&self) -> Option<PublishStats> {
        self.realtime_publisher.as_ref().map(RealtimePublisher::stats)
    }

    fn reset(&mut self) {
        self.camera_sensor = None;
        self.realtime_publisher = None;
        self.active = false;
        self.fault = BindingFault::default();
    }
}

impl Default for CameraSensorBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Factory function registered under [`CAMERA_SENSOR_BROADCASTER`].
pub fn create_controller() -> Box<dyn Controller> {
    Box::new(CameraSensorBroadcaster::new())
}

impl Controller for CameraSensorBroadcaster {
    fn type_name(&self) -> &'static str {
        CAMERA_SENSOR_BROADCASTER
    }

    fn on_init(&mut self, ctx: ControllerContext) -> Result<(), ControllerError> {
        self.params = BroadcasterParams::from_table(ctx.params).map_err(|e| {
            error!("Exception thrown during init stage: {}", e);
            ControllerError::Init(e.to_string())
        })?;
        self.name = ctx.name;
        self.transport = Some(ctx.transport);
        Ok(())
    }

    fn command_interface_configuration(&self) -> InterfaceConfiguration {
        InterfaceConfiguration::none()
    }

    fn state_interface_configuration(&self) -> InterfaceConfiguration {
        let names = self
            .camera_sensor
            .as_ref()
            .map(|sensor| sensor.get_state_interface_names().to_vec())
            .unwrap_or_default();
        InterfaceConfiguration::individual(names)
    }

    fn on_configure(&mut self) -> Result<(), ControllerError> {
        self.reset();

        if self.params.sensor_name.is_empty() {
            error!("'sensor_name' parameter has to be specified.");
            return Err(ControllerError::Configuration(
                "'sensor_name' parameter has to be specified".to_string(),
            ));
        }
        if self.params.frame_id.is_empty() {
            error!("'frame_id' parameter has to be provided.");
            return Err(ControllerError::Configuration(
                "'frame_id' parameter has to be provided".to_string(),
            ));
        }
        let frame_len = self
            .params
            .validate_layout()
            .and_then(|()| self.params.frame_len())
            .map_err(|e| {
                error!("Invalid image layout: {}", e);
                ControllerError::Configuration(e.to_string())
            })?;
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| ControllerError::Init("broadcaster was not initialized".to_string()))?;

        let camera_sensor = CameraSensor::new(&self.params.sensor_name);

        let topic = raw_topic(&self.name);
        let publisher = transport.create_publisher(&topic).map_err(|e| {
            error!("Publisher creation on {} failed at configure stage: {}", topic, e);
            ControllerError::Transport(e)
        })?;
        let realtime_publisher = RealtimePublisher::new(publisher, Image::default())
            .map_err(|e| ControllerError::Publisher(e.to_string()))?;

        {
            let p = &self.params;
            let mut msg = realtime_publisher.lock();
            msg.header.frame_id = p.frame_id.clone();
            msg.height = p.height;
            msg.width = p.width;
            msg.encoding = p.encoding.clone();
            msg.is_bigendian = u8::from(p.is_bigendian);
            msg.step = p.step;
            msg.data = vec![0; frame_len];
        }

        self.camera_sensor = Some(camera_sensor);
        self.realtime_publisher = Some(realtime_publisher);
        debug!("configure successful (topic {})", topic);
        Ok(())
    }

    fn on_activate(
        &mut self,
        interfaces: &dyn StateInterfaceProvider,
    ) -> Result<(), ControllerError> {
        let sensor = self
            .camera_sensor
            .as_mut()
            .ok_or_else(|| ControllerError::Configuration("not configured".to_string()))?;
        sensor.assign_loaned_state_interfaces(interfaces);
        if !sensor.is_bound() {
            debug!(
                "Camera '{}' interfaces {:?} not available at activation",
                sensor.name(),
                sensor.get_state_interface_names()
            );
        }
        self.fault = BindingFault::default();
        self.active = true;
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<(), ControllerError> {
        self.active = false;
        if let Some(sensor) = self.camera_sensor.as_mut() {
            sensor.release_interfaces();
        }
        self.fault = BindingFault::default();
        Ok(())
    }

    fn on_shutdown(&mut self) -> Result<(), ControllerError> {
        if let Some(stats) = self.publish_stats() {
            info!(
                "Broadcaster '{}' shutting down: {} published, {} skipped, {} failed",
                self.name, stats.published, stats.skipped, stats.failed
            );
        }
        self.reset();
        Ok(())
    }

    fn update(&mut self, _time: Time, _period: Duration) -> ReturnType {
        if !self.active {
            return ReturnType::Ok;
        }
        let (Some(publisher), Some(sensor)) =
            (self.realtime_publisher.as_ref(), self.camera_sensor.as_ref())
        else {
            return ReturnType::Ok;
        };

        if !sensor.is_bound() {
            return self.fault.record(sensor.name(), self.params.binding_fault_limit);
        }
        self.fault.clear();

        if let Some(mut msg) = publisher.try_lock() {
            msg.header.stamp = Time::now();
            if let SensorRead::Fresh(_) = sensor.get_values_as_message(&mut msg) {
                msg.unlock_and_publish();
            }
        }
        ReturnType::Ok
    }
}
