//! Broadcaster host and RT loop management.
//!
//! `BroadcasterHost` plays the role of the controller manager: it owns the
//! simulated hardware, instantiates the configured controller through the
//! registry, drives its lifecycle and calls `update()` once per cycle.

use crate::config::BroadcasterConfig;
use crate::controller::{ControllerContext, ReturnType};
use crate::controller_registry::{ControllerRegistry, RegistryError};
use crate::lifecycle::{LifecycleController, LifecycleError, LifecycleState};
use crate::simulation::SimulatedCamera;
use crate::transport::Transport;
use broadcaster_common::config::ConfigError;
use broadcaster_common::hal::{HalError, StateInterfaceTable};
use broadcaster_common::msgs::{Image, Time};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error types for host operations.
#[derive(Debug, Error)]
pub enum HostError {
    /// Configuration invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Controller type unknown.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Simulated hardware could not be set up.
    #[error(transparent)]
    Hal(#[from] HalError),

    /// Lifecycle transition failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Timing statistics for RT loop monitoring.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimingStats {
    /// Number of cycles executed.
    pub cycle_count: u64,
    /// Cycles whose body exceeded the cycle time.
    pub timing_violations: u64,
    /// Cycles for which the controller returned `ReturnType::Error`.
    pub update_errors: u64,
    /// Longest cycle body [µs].
    pub max_cycle_time_us: u64,
    /// Sum of cycle bodies [µs].
    pub total_cycle_time_us: u64,
}

impl TimingStats {
    /// Average cycle body [µs], 0 before the first cycle.
    pub fn avg_cycle_time_us(&self) -> u64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.total_cycle_time_us / self.cycle_count
        }
    }
}

/// Hosts one controller against simulated hardware.
pub struct BroadcasterHost {
    controller: LifecycleController,
    hardware: StateInterfaceTable,
    camera: SimulatedCamera,
    running: Arc<AtomicBool>,
    cycle_time: Duration,
    stats: TimingStats,
}

impl BroadcasterHost {
    /// Validate `config`, register simulated hardware and instantiate the controller.
    ///
    /// # Errors
    /// Returns error if validation, controller lookup or `on_init` fails.
    pub fn new(
        config: &BroadcasterConfig,
        registry: &ControllerRegistry,
        transport: Arc<dyn Transport<Image>>,
    ) -> Result<Self, HostError> {
        config.validate()?;
        let params = config.broadcaster_params()?;

        let mut hardware = StateInterfaceTable::new();
        let camera = SimulatedCamera::register(&mut hardware, &params)?;

        let controller = registry.create(&config.host.controller_type)?;
        let controller = LifecycleController::new(
            controller,
            ControllerContext {
                name: config.host.controller_name.clone(),
                params: config.params.clone(),
                transport,
            },
        )?
        .with_max_configure_failures(config.host.max_configure_failures);

        info!(
            "BroadcasterHost created for '{}' ({}), cycle_time={}us",
            config.host.controller_name, config.host.controller_type, config.host.cycle_time_us
        );

        Ok(Self {
            controller,
            hardware,
            camera,
            running: Arc::new(AtomicBool::new(false)),
            cycle_time: Duration::from_micros(config.host.cycle_time_us),
            stats: TimingStats::default(),
        })
    }

    /// Configure and activate the controller.
    pub fn bring_up(&mut self) -> Result<(), HostError> {
        let state_if = self.controller.state_interface_configuration();
        debug!("Pre-configure state interfaces: {:?}", state_if.names);

        self.controller.configure()?;
        let state_if = self.controller.state_interface_configuration();
        info!(
            "Controller '{}' claims state interfaces {:?} ({} command interfaces)",
            self.controller.name(),
            state_if.names,
            self.controller.command_interface_configuration().names.len()
        );

        self.controller.activate(&self.hardware)?;
        Ok(())
    }

    /// Execute a single cycle: advance the hardware, then update the controller.
    pub fn cycle(&mut self, period: Duration) -> ReturnType {
        self.camera.tick();
        self.controller.update(Time::now(), period)
    }

    /// Run the RT loop until shutdown is requested or `max_cycles` is reached.
    pub fn run(&mut self, max_cycles: Option<u64>) {
        info!(
            "Starting RT loop (cycle_time={}us, rt_mode={})...",
            self.cycle_time.as_micros(),
            detect_rt_mode()
        );
        self.running.store(true, Ordering::SeqCst);

        let mut last_cycle = Instant::now();
        while self.running.load(Ordering::SeqCst) {
            if max_cycles.is_some_and(|max| self.stats.cycle_count >= max) {
                break;
            }

            let cycle_start = Instant::now();
            let period = cycle_start.duration_since(last_cycle);
            last_cycle = cycle_start;

            if self.cycle(period) == ReturnType::Error {
                self.stats.update_errors += 1;
                if self.stats.update_errors == 1 {
                    warn!("Controller '{}' reported a cycle error", self.controller.name());
                }
            }

            let cycle_time_us = cycle_start.elapsed().as_micros() as u64;
            self.stats.cycle_count += 1;
            self.stats.total_cycle_time_us += cycle_time_us;
            self.stats.max_cycle_time_us = self.stats.max_cycle_time_us.max(cycle_time_us);

            if cycle_time_us > self.cycle_time.as_micros() as u64 {
                self.stats.timing_violations += 1;
                if self.stats.timing_violations <= 10 || self.stats.timing_violations % 1000 == 0 {
                    warn!(
                        "Timing violation #{}: cycle took {}us (target {}us)",
                        self.stats.timing_violations,
                        cycle_time_us,
                        self.cycle_time.as_micros()
                    );
                }
            }

            let elapsed = cycle_start.elapsed();
            if elapsed < self.cycle_time {
                std::thread::sleep(self.cycle_time - elapsed);
            }

            if self.stats.cycle_count % 1000 == 0 {
                debug!(
                    "RT loop: {} cycles, avg={}us, max={}us, violations={}, frames={}",
                    self.stats.cycle_count,
                    self.stats.avg_cycle_time_us(),
                    self.stats.max_cycle_time_us,
                    self.stats.timing_violations,
                    self.camera.frame_count()
                );
            }
        }

        info!(
            "RT loop stopped after {} cycles (violations: {}, update errors: {})",
            self.stats.cycle_count, self.stats.timing_violations, self.stats.update_errors
        );
    }

    /// Deactivate and finalize the controller.
    pub fn shutdown(&mut self) -> Result<(), HostError> {
        info!("Shutdown requested");
        self.running.store(false, Ordering::SeqCst);
        if self.controller.state() == LifecycleState::Finalized {
            return Ok(());
        }
        self.controller.deactivate().or_else(|e| match e {
            // Never configured: nothing to deactivate.
            LifecycleError::InvalidTransition { .. } => Ok(()),
            other => Err(other),
        })?;
        self.controller.shutdown()?;
        Ok(())
    }

    /// Running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Lifecycle state of the hosted controller.
    pub fn controller_state(&self) -> LifecycleState {
        self.controller.state()
    }

    /// Timing statistics.
    pub fn stats(&self) -> TimingStats {
        self.stats
    }
}

/// Detect if running in real-time mode by checking scheduler policy.
fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        // SAFETY: queries the calling thread's policy; no pointers involved.
        let policy = unsafe { sched_getscheduler(0) };
        policy == SCHED_FIFO || policy == SCHED_RR
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}
