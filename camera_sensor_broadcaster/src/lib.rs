//! # Camera Sensor Broadcaster
//!
//! Lifecycle-managed broadcaster that republishes a camera's raw frame from
//! the hardware abstraction layer on a messaging transport, once per
//! control-loop cycle, without ever blocking or allocating in the cycle.
//!
//! # Module Structure
//!
//! - [`controller`] - `Controller` trait, interface declarations, errors
//! - [`lifecycle`] - Lifecycle state machine and `LifecycleController`
//! - [`broadcaster`] - `CameraSensorBroadcaster` and its parameters
//! - [`camera_sensor`] - Camera semantic component (HAL → `Image`)
//! - [`realtime_publisher`] - Try-acquire single-slot publisher
//! - [`transport`] - Transport traits and in-process transport
//! - [`controller_registry`] - Controller factory registration
//! - [`config`] - Process configuration
//! - [`host`] - Host loop driving lifecycle and cycles
//! - [`simulation`] - Simulated camera hardware
//! - [`monitor`] - Delivered-frame summaries
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      BroadcasterHost (loop)                     │
//! │  ┌───────────────────┐   ┌────────────────────────────────────┐ │
//! │  │ StateInterface    │   │ LifecycleController                │ │
//! │  │ Table (HAL)       │──►│  └─ CameraSensorBroadcaster        │ │
//! │  │  ▲ SimulatedCamera│   │      ├─ CameraSensor (adapter)     │ │
//! │  └──┴────────────────┘   │      └─ RealtimePublisher ──► Transport
//! │                          └────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod broadcaster;
pub mod camera_sensor;
pub mod config;
pub mod controller;
pub mod controller_registry;
pub mod host;
pub mod lifecycle;
pub mod monitor;
pub mod realtime_publisher;
pub mod simulation;
pub mod transport;

// Re-export key types for convenience
pub use crate::broadcaster::{BroadcasterParams, CAMERA_SENSOR_BROADCASTER, CameraSensorBroadcaster};
pub use crate::controller::{Controller, ControllerContext, ControllerError, ReturnType};
pub use crate::controller_registry::ControllerRegistry;
pub use crate::host::BroadcasterHost;
pub use crate::lifecycle::{LifecycleController, LifecycleError, LifecycleState};
pub use crate::transport::{InProcessTransport, Transport};
