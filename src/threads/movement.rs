//! Movement loop runner.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::actuator::Actuator;
use crate::config::NavConfig;
use crate::hooks::NavHooks;
use crate::motion::MotionController;
use crate::route::RouteGenerator;
use crate::shared::{MotionStatus, SharedNav, SteerStatus};

/// Backoff after a tick-level fault; the loop must keep running.
const FAULT_BACKOFF: Duration = Duration::from_millis(500);

pub struct MovementThread {
    shared: Arc<SharedNav>,
    controller: MotionController,
    interval: Duration,
}

impl MovementThread {
    pub fn new(
        config: NavConfig,
        shared: Arc<SharedNav>,
        actuator: Arc<dyn Actuator + Sync>,
        routes: Arc<RouteGenerator>,
        hooks: Arc<NavHooks>,
    ) -> Self {
        let interval = Duration::from_millis(config.move_tick_ms);
        let controller =
            MotionController::new(Arc::clone(&shared), actuator, routes, hooks, config);
        Self {
            shared,
            controller,
            interval,
        }
    }

    pub fn run(&mut self) {
        info!("movement loop started");
        loop {
            if self.shared.shutdown_requested() {
                info!("movement loop shutting down");
                let mut st = self.shared.lock();
                st.motion = MotionStatus::Terminated;
                st.steering = SteerStatus::Terminated;
                drop(st);
                // Terminated tick quiesces every latched actuator.
                self.controller.tick(Instant::now());
                break;
            }

            let tick = catch_unwind(AssertUnwindSafe(|| {
                self.controller.tick(Instant::now());
            }));
            if tick.is_err() {
                error!("movement tick panicked");
                thread::sleep(FAULT_BACKOFF);
            }

            thread::sleep(self.interval);
        }
    }
}
