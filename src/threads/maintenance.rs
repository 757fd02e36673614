//! Maintenance loop runner: periodic caller hook with the remaining
//! route distance, deferred while the agent is busy with an
//! uninterruptible action.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::info;

use crate::actuator::Actuator;
use crate::config::NavConfig;
use crate::hooks::NavHooks;
use crate::shared::{MotionStatus, SharedNav};

/// Granularity of the cancellable busy-wait.
const BUSY_POLL: Duration = Duration::from_millis(50);
/// Upper bound on waiting out a busy actuator within one tick.
const BUSY_LIMIT: Duration = Duration::from_secs(10);

pub struct MaintenanceThread {
    shared: Arc<SharedNav>,
    actuator: Arc<dyn Actuator + Sync>,
    hooks: Arc<NavHooks>,
    interval: Duration,
}

impl MaintenanceThread {
    pub fn new(
        config: NavConfig,
        shared: Arc<SharedNav>,
        actuator: Arc<dyn Actuator + Sync>,
        hooks: Arc<NavHooks>,
    ) -> Self {
        Self {
            shared,
            actuator,
            hooks,
            interval: Duration::from_millis(config.maintenance_tick_ms),
        }
    }

    pub fn run(&mut self) {
        info!("maintenance loop started");
        loop {
            if self.shared.shutdown_requested() {
                info!("maintenance loop shutting down");
                break;
            }

            if self.wait_while_busy() {
                let (active, remaining) = {
                    let st = self.shared.lock();
                    (st.motion == MotionStatus::Moving, st.total_remaining)
                };
                if active {
                    self.hooks.fire_maintenance(remaining);
                }
            }

            thread::sleep(self.interval);
        }
    }

    /// Bounded, cancellable wait on the busy collaborator. Returns false
    /// when shutdown was requested or the bound ran out.
    fn wait_while_busy(&self) -> bool {
        let mut waited = Duration::ZERO;
        while self.actuator.is_busy() {
            if self.shared.shutdown_requested() || waited >= BUSY_LIMIT {
                return false;
            }
            thread::sleep(BUSY_POLL);
            waited += BUSY_POLL;
        }
        true
    }
}
