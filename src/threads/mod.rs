//! Multi-threaded architecture for the navigation engine.
//!
//! Separates concerns into three loops:
//! - Movement loop: waypoint advancement, stuck recovery, drift re-routing
//! - Steering loop: higher-frequency heading control
//! - Maintenance loop: periodic caller hook with the remaining distance

mod maintenance;
mod movement;
mod steering;

pub use maintenance::MaintenanceThread;
pub use movement::MovementThread;
pub use steering::SteeringThread;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::actuator::Actuator;
use crate::config::NavConfig;
use crate::error::Result;
use crate::hooks::NavHooks;
use crate::route::RouteGenerator;
use crate::shared::SharedNav;

/// Thread handles for the running loops.
pub struct LoopHandles {
    pub movement: JoinHandle<()>,
    pub steering: JoinHandle<()>,
    pub maintenance: JoinHandle<()>,
}

impl LoopHandles {
    /// Wait for every loop to exit. Called after the shutdown signal.
    pub fn join(self) {
        let _ = self.movement.join();
        let _ = self.steering.join();
        let _ = self.maintenance.join();
    }
}

/// Spawn all loops and return their handles.
pub fn spawn_loops(
    config: NavConfig,
    shared: Arc<SharedNav>,
    actuator: Arc<dyn Actuator + Sync>,
    routes: Arc<RouteGenerator>,
    hooks: Arc<NavHooks>,
) -> Result<LoopHandles> {
    let movement_shared = Arc::clone(&shared);
    let movement_actuator = Arc::clone(&actuator);
    let movement_hooks = Arc::clone(&hooks);
    let movement_config = config.clone();

    let steering_shared = Arc::clone(&shared);
    let steering_actuator = Arc::clone(&actuator);

    let maintenance_shared = Arc::clone(&shared);
    let maintenance_actuator = Arc::clone(&actuator);
    let maintenance_config = config.clone();

    let movement = thread::Builder::new()
        .name("movement".into())
        .spawn(move || {
            let mut t = MovementThread::new(
                movement_config,
                movement_shared,
                movement_actuator,
                routes,
                movement_hooks,
            );
            t.run();
        })
        .expect("Failed to spawn movement thread");

    let steering = thread::Builder::new()
        .name("steering".into())
        .spawn(move || {
            let mut t = SteeringThread::new(config, steering_shared, steering_actuator);
            t.run();
        })
        .expect("Failed to spawn steering thread");

    let maintenance = thread::Builder::new()
        .name("maintenance".into())
        .spawn(move || {
            let mut t = MaintenanceThread::new(
                maintenance_config,
                maintenance_shared,
                maintenance_actuator,
                hooks,
            );
            t.run();
        })
        .expect("Failed to spawn maintenance thread");

    Ok(LoopHandles {
        movement,
        steering,
        maintenance,
    })
}
