//! Public front end: owns the control loops and exposes the move /
//! pause / resume / stop surface.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::actuator::{Actuator, HeightMap};
use crate::config::NavConfig;
use crate::error::{NavFailure, Result};
use crate::geometry::Point;
use crate::graph::RouteGraph;
use crate::hooks::NavHooks;
use crate::pause::{DEFAULT_TICKET_LIFE, PauseTicket};
use crate::route::RouteGenerator;
use crate::shared::{ActionBinding, MotionStatus, SharedNav};
use crate::threads::{LoopHandles, spawn_loops};

/// Where to go: an explicit point or a named graph node.
pub enum Destination {
    Point(Point),
    Named(String),
}

/// Per-request options for [`Navigator::move_to`].
#[derive(Default)]
pub struct MoveOptions {
    /// Max distance from the start to its graph anchor; `None` uses half
    /// the drift distance.
    pub start_offset: Option<f64>,
    /// Same bound for the destination end.
    pub end_offset: Option<f64>,
    /// Fired once on arrival at the destination point.
    pub on_arrive: Option<Box<dyn Fn(&Point) + Send>>,
    /// Quiesce propulsion before the arrival action runs.
    pub stop_before_action: bool,
    /// Run the mount hook after the arrival action returns.
    pub mount_after_action: bool,
}

pub struct Navigator {
    shared: Arc<SharedNav>,
    actuator: Arc<dyn Actuator + Sync>,
    routes: Arc<RouteGenerator>,
    handles: Option<LoopHandles>,
}

impl Navigator {
    /// Build the engine around an in-memory graph and spawn the loops.
    pub fn new(
        graph: RouteGraph,
        heights: Box<dyn HeightMap + Sync>,
        actuator: Arc<dyn Actuator + Sync>,
        hooks: NavHooks,
        config: NavConfig,
    ) -> Result<Self> {
        config.validate()?;
        let shared = Arc::new(SharedNav::new());
        let routes = Arc::new(RouteGenerator::new(Box::new(graph), heights, &config));
        let handles = spawn_loops(
            config,
            Arc::clone(&shared),
            Arc::clone(&actuator),
            Arc::clone(&routes),
            Arc::new(hooks),
        )?;
        info!("navigation engine started");
        Ok(Self {
            shared,
            actuator,
            routes,
            handles: Some(handles),
        })
    }

    /// Same, loading the graph from a TOML node/link file.
    pub fn from_graph_file(
        path: &Path,
        heights: Box<dyn HeightMap + Sync>,
        actuator: Arc<dyn Actuator + Sync>,
        hooks: NavHooks,
        config: NavConfig,
    ) -> Result<Self> {
        let graph = RouteGraph::load_file(path)?;
        Self::new(graph, heights, actuator, hooks, config)
    }

    /// Request movement to `destination`. Appends to the live route when
    /// one is active. Returns false with `last_error` set on failure.
    pub fn move_to(&self, destination: Destination, options: MoveOptions) -> bool {
        let target = match destination {
            Destination::Point(p) => p,
            Destination::Named(name) => {
                if name.is_empty() {
                    return self.fail(NavFailure::EmptyDestination);
                }
                match self.routes.node_named(&name) {
                    Some(p) => p,
                    None => return self.fail(NavFailure::DestinationNotFound),
                }
            }
        };

        // Chained requests start where the current route ends.
        let start = {
            let st = self.shared.lock();
            st.queue
                .back()
                .cloned()
                .unwrap_or_else(|| self.actuator.position())
        };

        let plan = match self
            .routes
            .generate(&start, &target, options.start_offset, options.end_offset)
        {
            Ok(plan) => plan,
            Err(err) => return self.fail(err),
        };

        let mut st = self.shared.lock();
        st.last_error = plan.advisory;
        if let Some(last) = plan.points.last()
            && (options.on_arrive.is_some()
                || options.stop_before_action
                || options.mount_after_action)
        {
            st.actions.insert(
                last.key(),
                ActionBinding {
                    stop_before: options.stop_before_action,
                    mount_after: options.mount_after_action,
                    callback: options.on_arrive,
                },
            );
        }
        let chained = st.has_route();
        if chained {
            st.extend_route(plan.points);
        } else {
            st.set_route(plan.points);
            if st.motion == MotionStatus::Idle {
                st.motion = MotionStatus::Resuming;
            }
        }
        debug!(chained, remaining = st.total_remaining, "move accepted");
        true
    }

    /// [`Navigator::move_to`], then block until the route finishes or is
    /// abandoned. Polls with bounded sleeps so shutdown is never held up.
    pub fn move_to_blocking(&self, destination: Destination, options: MoveOptions) -> bool {
        if !self.move_to(destination, options) {
            return false;
        }
        while self.is_working() && !self.shared.shutdown_requested() {
            thread::sleep(Duration::from_millis(100));
        }
        !matches!(self.last_error(), Some(NavFailure::TargetLost))
    }

    /// Hold movement. Returns `None` when there is nothing to pause.
    /// Movement resumes after every outstanding ticket is released,
    /// dropped, or expired.
    pub fn pause(&self, duration: Option<Duration>) -> Option<Arc<PauseTicket>> {
        let mut st = self.shared.lock();
        if !st.has_route() {
            return None;
        }
        let ticket = st.tickets.issue(duration.unwrap_or(DEFAULT_TICKET_LIFE));
        if matches!(
            st.motion,
            MotionStatus::Moving
                | MotionStatus::Resuming
                | MotionStatus::Pilot
                | MotionStatus::PilotEngaging
        ) {
            st.motion = MotionStatus::Pausing;
        }
        Some(ticket)
    }

    /// Release a pause ticket. Double release is a no-op.
    pub fn resume(&self, ticket: &PauseTicket) {
        ticket.dispose();
    }

    /// Unbind the action attached to `point`. Returns whether one was
    /// bound there.
    pub fn remove_action(&self, point: &Point) -> bool {
        self.shared.lock().actions.remove(&point.key()).is_some()
    }

    /// Abandon the route, clear bound actions and tickets, reset the
    /// last error, and quiesce.
    pub fn stop(&self) {
        let mut st = self.shared.lock();
        st.clear_route();
        st.last_error = None;
        if st.motion != MotionStatus::Terminated {
            st.motion = MotionStatus::Pausing;
        }
        debug!("route stopped");
    }

    /// Toggle the assisted direct-move mode. Refused under tow.
    pub fn set_pilot(&self, on: bool) -> bool {
        let mut st = self.shared.lock();
        if !on {
            st.pilot_target = None;
            return true;
        }
        if self.actuator.is_towed() || st.motion != MotionStatus::Moving {
            return false;
        }
        let Some(aim) = st.aim.clone() else {
            return false;
        };
        st.pilot_target = Some(aim);
        st.motion = MotionStatus::PilotEngaging;
        true
    }

    pub fn is_moving(&self) -> bool {
        matches!(
            self.shared.lock().motion,
            MotionStatus::Moving | MotionStatus::PilotEngaging | MotionStatus::Pilot
        )
    }

    pub fn is_paused(&self) -> bool {
        let st = self.shared.lock();
        st.motion == MotionStatus::Idle && st.has_route()
    }

    /// True while a route is loaded, whether moving or paused.
    pub fn is_working(&self) -> bool {
        self.shared.lock().has_route()
    }

    pub fn last_error(&self) -> Option<NavFailure> {
        self.shared.lock().last_error
    }

    pub fn remaining_distance(&self) -> f64 {
        self.shared.lock().total_remaining
    }

    fn fail(&self, err: NavFailure) -> bool {
        debug!(%err, "move rejected");
        self.shared.lock().last_error = Some(err);
        false
    }
}

impl Drop for Navigator {
    fn drop(&mut self) {
        self.shared.request_shutdown();
        if let Some(handles) = self.handles.take() {
            handles.join();
        }
        info!("navigation engine stopped");
    }
}
