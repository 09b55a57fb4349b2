//! Prelude module for common re-exports.
//!
//! ```rust
//! use broadcaster_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{CAMERA_DATA_INTERFACE, CYCLE_TIME_US, full_interface_name};

// ─── HAL ────────────────────────────────────────────────────────────
pub use crate::hal::{
    HalError, LoanedStateInterface, StateInterface, StateInterfaceProvider, StateInterfaceTable,
    ValueBuffer,
};

// ─── Messages ───────────────────────────────────────────────────────
pub use crate::msgs::{Header, Image, Time};
