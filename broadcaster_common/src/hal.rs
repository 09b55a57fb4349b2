//! Hardware abstraction layer state interfaces.
//!
//! A hardware backend exposes named, read-only *state interfaces*
//! (`<prefix>/<interface>`), each backed by a shared byte buffer that the
//! backend rewrites as new samples arrive. Consumers never own those buffers:
//! they *loan* an interface from a [`StateInterfaceProvider`] and read through
//! the loan.
//!
//! # Timing Contracts
//!
//! | Operation | RT Constraint |
//! |-----------|---------------|
//! | `StateInterfaceTable::register()` | None (setup) |
//! | `StateInterfaceProvider::loan_state_interface()` | None (lifecycle transition) |
//! | `LoanedStateInterface::try_read_into()` | **HARD**: no blocking, no allocation |

use crate::consts::full_interface_name;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Shared byte buffer holding the latest value of one state interface.
pub type ValueBuffer = Arc<Mutex<Vec<u8>>>;

/// Error types for HAL interface management.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// An interface with the same full name is already registered.
    #[error("State interface already registered: {0}")]
    DuplicateInterface(String),

    /// Requested interface does not exist.
    #[error("State interface not found: {0}")]
    InterfaceNotFound(String),
}

/// A named state interface owned by the hardware side.
#[derive(Debug, Clone)]
pub struct StateInterface {
    prefix: String,
    interface: String,
    full_name: String,
    value: ValueBuffer,
}

impl StateInterface {
    /// Create a state interface `<prefix>/<interface>` backed by `value`.
    pub fn new(prefix: &str, interface: &str, value: ValueBuffer) -> Self {
        Self {
            prefix: prefix.to_string(),
            interface: interface.to_string(),
            full_name: full_interface_name(prefix, interface),
            value,
        }
    }

    /// Sensor/group prefix (e.g. `camera_sensor`).
    pub fn prefix_name(&self) -> &str {
        &self.prefix
    }

    /// Interface name within the group (e.g. `data`).
    pub fn interface_name(&self) -> &str {
        &self.interface
    }

    /// Full name (`camera_sensor/data`).
    pub fn name(&self) -> &str {
        &self.full_name
    }

    /// Handle to the backing buffer, for the writing side.
    pub fn value(&self) -> ValueBuffer {
        Arc::clone(&self.value)
    }
}

/// A consumer's loan of a state interface.
///
/// Holds a lookup binding to the hardware buffer; never owns the value.
#[derive(Debug, Clone)]
pub struct LoanedStateInterface {
    name: String,
    value: ValueBuffer,
}

impl LoanedStateInterface {
    /// Full interface name this loan refers to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy the current value into `out` without blocking.
    ///
    /// Copies `min(out.len(), value.len())` bytes and zero-fills the rest of
    /// `out`. Returns the number of bytes copied, or `None` if the hardware
    /// side currently holds the buffer (in which case `out` is untouched).
    #[inline]
    pub fn try_read_into(&self, out: &mut [u8]) -> Option<usize> {
        let value = self.value.try_lock()?;
        let n = out.len().min(value.len());
        out[..n].copy_from_slice(&value[..n]);
        out[n..].fill(0);
        Some(n)
    }
}

/// Capability handed to consumers at activation time to resolve loans.
pub trait StateInterfaceProvider {
    /// Loan the interface with the given full name, if it exists.
    fn loan_state_interface(&self, name: &str) -> Option<LoanedStateInterface>;

    /// Full names of all interfaces this provider can loan.
    fn available_state_interfaces(&self) -> Vec<String>;
}

/// In-process table of state interfaces, keyed by full name.
#[derive(Debug, Default)]
pub struct StateInterfaceTable {
    interfaces: HashMap<String, StateInterface>,
}

impl StateInterfaceTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a state interface.
    ///
    /// # Errors
    /// Returns `HalError::DuplicateInterface` if the full name is taken.
    pub fn register(&mut self, interface: StateInterface) -> Result<(), HalError> {
        if self.interfaces.contains_key(interface.name()) {
            return Err(HalError::DuplicateInterface(interface.name().to_string()));
        }
        debug!("Registered state interface '{}'", interface.name());
        self.interfaces.insert(interface.name().to_string(), interface);
        Ok(())
    }

    /// Backing buffer of a registered interface, for the writing side.
    ///
    /// # Errors
    /// Returns `HalError::InterfaceNotFound` for unknown names.
    pub fn value(&self, name: &str) -> Result<ValueBuffer, HalError> {
        self.interfaces
            .get(name)
            .map(StateInterface::value)
            .ok_or_else(|| HalError::InterfaceNotFound(name.to_string()))
    }

    /// Number of registered interfaces.
    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    /// True if no interface is registered.
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

impl StateInterfaceProvider for StateInterfaceTable {
    fn loan_state_interface(&self, name: &str) -> Option<LoanedStateInterface> {
        self.interfaces.get(name).map(|si| LoanedStateInterface {
            name: si.full_name.clone(),
            value: si.value(),
        })
    }

    fn available_state_interfaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.interfaces.keys().cloned().collect();
        names.sort();
        names
    }
}
