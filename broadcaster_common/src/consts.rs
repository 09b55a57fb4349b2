//! Workspace-wide constants.
//!
//! Single source of truth for interface naming, default paths and limits.

/// Default host cycle time in microseconds (100 Hz).
pub const CYCLE_TIME_US: u64 = 10_000;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/broadcaster/broadcaster.toml";

/// Separator between a sensor prefix and an interface name (`camera/data`).
pub const INTERFACE_SEPARATOR: char = '/';

/// Interface name under which a camera exposes its raw frame bytes.
pub const CAMERA_DATA_INTERFACE: &str = "data";

/// Upper bound of state interfaces a single semantic sensor may bind.
pub const MAX_SENSOR_INTERFACES: usize = 8;

/// Largest frame payload a broadcaster will allocate, in bytes (256 MiB).
pub const MAX_FRAME_BYTES: usize = 256 * 1024 * 1024;

/// Topic suffix for raw sensor messages (`/<controller>/raw`).
pub const RAW_TOPIC_SUFFIX: &str = "raw";

/// Consecutive transport failures during configure before a component is finalized.
pub const DEFAULT_MAX_CONFIGURE_FAILURES: u32 = 3;

/// Join a sensor prefix and interface name into a full interface name.
pub fn full_interface_name(prefix: &str, interface: &str) -> String {
    format!("{prefix}{INTERFACE_SEPARATOR}{interface}")
}
