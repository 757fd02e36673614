//! Steering loop runner.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::actuator::Actuator;
use crate::config::NavConfig;
use crate::shared::SharedNav;
use crate::steering::SteeringController;

const FAULT_BACKOFF: Duration = Duration::from_millis(500);

pub struct SteeringThread {
    shared: Arc<SharedNav>,
    controller: SteeringController,
    interval: Duration,
}

impl SteeringThread {
    pub fn new(
        config: NavConfig,
        shared: Arc<SharedNav>,
        actuator: Arc<dyn Actuator + Sync>,
    ) -> Self {
        let controller = SteeringController::new(Arc::clone(&shared), actuator);
        Self {
            shared,
            controller,
            interval: Duration::from_millis(config.steer_tick_ms),
        }
    }

    pub fn run(&mut self) {
        info!("steering loop started");
        loop {
            if self.shared.shutdown_requested() {
                info!("steering loop shutting down");
                self.controller.release_rotation();
                break;
            }

            let tick = catch_unwind(AssertUnwindSafe(|| {
                self.controller.tick(Instant::now());
            }));
            if tick.is_err() {
                error!("steering tick panicked");
                thread::sleep(FAULT_BACKOFF);
            }

            thread::sleep(self.interval);
        }
    }
}
