//! Controller lifecycle: Unconfigured → Inactive ↔ Active → Finalized.
//!
//! [`LifecycleStateMachine`] is the pure transition table.
//! [`LifecycleController`] owns a controller instance, runs its hooks and
//! only commits a transition when the hook succeeds.
//!
//! | From | Event | To |
//! |------|-------|----|
//! | Unconfigured | Configure | Inactive |
//! | Inactive | Activate | Active |
//! | Active | Deactivate | Inactive |
//! | Inactive | Deactivate | Inactive (no-op) |
//! | any but Finalized | Shutdown / Fault | Finalized |

use crate::controller::{
    Controller, ControllerContext, ControllerError, InterfaceConfiguration, ReturnType,
    validate_controller_name,
};
use broadcaster_common::consts::DEFAULT_MAX_CONFIGURE_FAILURES;
use broadcaster_common::hal::StateInterfaceProvider;
use broadcaster_common::msgs::Time;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Primary lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed and initialized, nothing allocated.
    Unconfigured,
    /// Configured, not bound to hardware.
    Inactive,
    /// Bound to hardware, cycling.
    Active,
    /// Terminal. A new instance is required.
    Finalized,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Unconfigured => "unconfigured",
            LifecycleState::Inactive => "inactive",
            LifecycleState::Active => "active",
            LifecycleState::Finalized => "finalized",
        };
        f.write_str(s)
    }
}

/// Event that can trigger a lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Validate parameters and allocate.
    Configure,
    /// Bind to hardware.
    Activate,
    /// Release hardware.
    Deactivate,
    /// Explicit teardown.
    Shutdown,
    /// Unrecoverable failure.
    Fault,
}

/// Result of a transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition allowed, with the new state.
    Ok(LifecycleState),
    /// Transition rejected, with the reason.
    Rejected(&'static str),
}

/// Lifecycle transition table holding the current state.
#[derive(Debug, Clone)]
pub struct LifecycleStateMachine {
    state: LifecycleState,
}

impl LifecycleStateMachine {
    /// Create a state machine in `Unconfigured`.
    pub const fn new() -> Self {
        Self {
            state: LifecycleState::Unconfigured,
        }
    }

    /// Current state.
    #[inline]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Where `event` would lead from `state`, without changing anything.
    pub const fn transition(state: LifecycleState, event: LifecycleEvent) -> TransitionResult {
        use LifecycleEvent::*;
        use LifecycleState::*;

        match (state, event) {
            (Finalized, _) => TransitionResult::Rejected("Finalized: no transitions allowed"),
            (Unconfigured, Configure) => TransitionResult::Ok(Inactive),
            (Inactive, Activate) => TransitionResult::Ok(Active),
            (Active, Deactivate) => TransitionResult::Ok(Inactive),
            (Inactive, Deactivate) => TransitionResult::Ok(Inactive),
            (_, Shutdown) | (_, Fault) => TransitionResult::Ok(Finalized),
            (Unconfigured, _) => TransitionResult::Rejected("Unconfigured: only Configure allowed"),
            (Inactive, _) => TransitionResult::Rejected("Inactive: already configured"),
            (Active, _) => TransitionResult::Rejected("Active: only Deactivate allowed"),
        }
    }

    /// Apply `event`.
    pub fn handle_event(&mut self, event: LifecycleEvent) -> TransitionResult {
        let result = Self::transition(self.state, event);
        if let TransitionResult::Ok(next) = result {
            self.state = next;
        }
        result
    }
}

impl Default for LifecycleStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Error types for lifecycle operations.
#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    /// Event not allowed in the current state.
    #[error("Invalid transition {event:?} from {state}: {reason}")]
    InvalidTransition {
        /// State the event was issued in.
        state: LifecycleState,
        /// Rejected event.
        event: LifecycleEvent,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The controller hook failed; state unchanged unless finalized.
    #[error("Controller '{name}' failed: {source}")]
    Controller {
        /// Controller instance name.
        name: String,
        /// Hook error.
        source: ControllerError,
    },

    /// Component is finalized and must be re-created.
    #[error("Controller '{0}' is finalized")]
    Finalized(String),
}

/// Host-side wrapper enforcing the lifecycle around a controller.
pub struct LifecycleController {
    name: String,
    controller: Box<dyn Controller>,
    machine: LifecycleStateMachine,
    transport_failures: u32,
    max_configure_failures: u32,
}

impl LifecycleController {
    /// Initialize `controller` with `ctx` and wrap it in `Unconfigured`.
    ///
    /// # Errors
    /// `LifecycleError::Controller` if the name is invalid or `on_init` fails.
    pub fn new(
        mut controller: Box<dyn Controller>,
        ctx: ControllerContext,
    ) -> Result<Self, LifecycleError> {
        let name = ctx.name.clone();
        validate_controller_name(&name)
            .and_then(|()| controller.on_init(ctx))
            .map_err(|source| LifecycleError::Controller {
                name: name.clone(),
                source,
            })?;

        info!("Controller '{}' ({}) initialized", name, controller.type_name());
        Ok(Self {
            name,
            controller,
            machine: LifecycleStateMachine::new(),
            transport_failures: 0,
            max_configure_failures: DEFAULT_MAX_CONFIGURE_FAILURES,
        })
    }

    /// Consecutive transport failures during configure before finalizing.
    pub fn with_max_configure_failures(mut self, limit: u32) -> Self {
        self.max_configure_failures = limit.max(1);
        self
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.machine.state()
    }

    /// Declared command interfaces.
    pub fn command_interface_configuration(&self) -> InterfaceConfiguration {
        self.controller.command_interface_configuration()
    }

    /// Declared state interfaces.
    pub fn state_interface_configuration(&self) -> InterfaceConfiguration {
        self.controller.state_interface_configuration()
    }

    fn check(&self, event: LifecycleEvent) -> Result<LifecycleState, LifecycleError> {
        let state = self.state();
        match LifecycleStateMachine::transition(state, event) {
            TransitionResult::Ok(next) => Ok(next),
            TransitionResult::Rejected(_) if state == LifecycleState::Finalized => {
                Err(LifecycleError::Finalized(self.name.clone()))
            }
            TransitionResult::Rejected(reason) => Err(LifecycleError::InvalidTransition {
                state,
                event,
                reason,
            }),
        }
    }

    fn hook_failed(&self, source: ControllerError) -> LifecycleError {
        LifecycleError::Controller {
            name: self.name.clone(),
            source,
        }
    }

    /// `Unconfigured → Inactive`.
    ///
    /// On failure the state stays `Unconfigured`, except after
    /// `max_configure_failures` consecutive transport failures, which
    /// finalize the component.
    pub fn configure(&mut self) -> Result<(), LifecycleError> {
        self.check(LifecycleEvent::Configure)?;

        match self.controller.on_configure() {
            Ok(()) => {
                self.transport_failures = 0;
                self.machine.handle_event(LifecycleEvent::Configure);
                info!("Controller '{}' configured", self.name);
                Ok(())
            }
            Err(e) => {
                if e.is_transport() {
                    self.transport_failures += 1;
                    warn!(
                        "Controller '{}' configure transport failure {}/{}",
                        self.name, self.transport_failures, self.max_configure_failures
                    );
                    if self.transport_failures >= self.max_configure_failures {
                        self.finalize_on_fault();
                    }
                }
                Err(self.hook_failed(e))
            }
        }
    }

    /// `Inactive → Active`, binding against `interfaces`.
    pub fn activate(
        &mut self,
        interfaces: &dyn StateInterfaceProvider,
    ) -> Result<(), LifecycleError> {
        self.check(LifecycleEvent::Activate)?;
        self.controller
            .on_activate(interfaces)
            .map_err(|e| self.hook_failed(e))?;
        self.machine.handle_event(LifecycleEvent::Activate);
        info!("Controller '{}' activated", self.name);
        Ok(())
    }

    /// `Active → Inactive`. No-op success when already `Inactive`.
    pub fn deactivate(&mut self) -> Result<(), LifecycleError> {
        self.check(LifecycleEvent::Deactivate)?;
        if self.state() == LifecycleState::Inactive {
            debug!("Controller '{}' already inactive", self.name);
            return Ok(());
        }
        self.controller.on_deactivate().map_err(|e| self.hook_failed(e))?;
        self.machine.handle_event(LifecycleEvent::Deactivate);
        info!("Controller '{}' deactivated", self.name);
        Ok(())
    }

    /// Any state `→ Finalized`, releasing bindings first if active.
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        self.check(LifecycleEvent::Shutdown)?;
        if self.state() == LifecycleState::Active {
            if let Err(e) = self.controller.on_deactivate() {
                warn!("Controller '{}' deactivate during shutdown failed: {}", self.name, e);
            }
        }
        let result = self.controller.on_shutdown().map_err(|e| self.hook_failed(e));
        self.machine.handle_event(LifecycleEvent::Shutdown);
        info!("Controller '{}' finalized", self.name);
        result
    }

    fn finalize_on_fault(&mut self) {
        if let Err(e) = self.controller.on_shutdown() {
            warn!("Controller '{}' cleanup after fault failed: {}", self.name, e);
        }
        self.machine.handle_event(LifecycleEvent::Fault);
        error!("Controller '{}' finalized after unrecoverable failure", self.name);
    }

    /// Run one cycle. Outside `Active` this does nothing and returns `Ok`.
    #[inline]
    pub fn update(&mut self, time: Time, period: Duration) -> ReturnType {
        if self.state() != LifecycleState::Active {
            return ReturnType::Ok;
        }
        self.controller.update(time, period)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleEvent::*;
    use LifecycleState::*;

    #[test]
    fn initial_state_is_unconfigured() {
        assert_eq!(LifecycleStateMachine::new().state(), Unconfigured);
    }

    #[test]
    fn normal_sequence() {
        let mut sm = LifecycleStateMachine::new();
        assert_eq!(sm.handle_event(Configure), TransitionResult::Ok(Inactive));
        assert_eq!(sm.handle_event(Activate), TransitionResult::Ok(Active));
        assert_eq!(sm.handle_event(Deactivate), TransitionResult::Ok(Inactive));
        assert_eq!(sm.handle_event(Deactivate), TransitionResult::Ok(Inactive));
        assert_eq!(sm.handle_event(Activate), TransitionResult::Ok(Active));
    }

    #[test]
    fn shutdown_and_fault_from_any_live_state() {
        for initial in [Unconfigured, Inactive, Active] {
            for event in [Shutdown, Fault] {
                let mut sm = LifecycleStateMachine { state: initial };
                assert_eq!(
                    sm.handle_event(event),
                    TransitionResult::Ok(Finalized),
                    "{event:?} from {initial:?} should → Finalized"
                );
            }
        }
    }

    #[test]
    fn finalized_rejects_everything() {
        for event in [Configure, Activate, Deactivate, Shutdown, Fault] {
            let mut sm = LifecycleStateMachine { state: Finalized };
            assert!(matches!(sm.handle_event(event), TransitionResult::Rejected(_)));
            assert_eq!(sm.state(), Finalized);
        }
    }

    #[test]
    fn invalid_transitions_rejected() {
        let mut sm = LifecycleStateMachine::new();
        assert!(matches!(sm.handle_event(Activate), TransitionResult::Rejected(_)));
        assert!(matches!(sm.handle_event(Deactivate), TransitionResult::Rejected(_)));
        assert_eq!(sm.state(), Unconfigured);

        sm.handle_event(Configure);
        assert!(matches!(sm.handle_event(Configure), TransitionResult::Rejected(_)));

        sm.handle_event(Activate);
        assert!(matches!(sm.handle_event(Activate), TransitionResult::Rejected(_)));
        assert!(matches!(sm.handle_event(Configure), TransitionResult::Rejected(_)));
        assert_eq!(sm.state(), Active);
    }

    #[test]
    fn state_display() {
        assert_eq!(Unconfigured.to_string(), "unconfigured");
        assert_eq!(Finalized.to_string(), "finalized");
    }
}
