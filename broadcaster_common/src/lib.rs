//! Broadcaster Common Library
//!
//! Shared types for the camera sensor broadcaster workspace.
//!
//! # Module Structure
//!
//! - [`config`] - TOML configuration loading traits and shared config
//! - [`consts`] - Interface naming, default paths and limits
//! - [`hal`] - Hardware abstraction layer state interfaces
//! - [`msgs`] - Published message types
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod consts;
pub mod hal;
pub mod msgs;
pub mod prelude;
