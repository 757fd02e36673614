//! State shared between the movement, steering, and maintenance loops.
//!
//! Everything mutable lives behind a single mutex so the loops always see
//! a consistent snapshot of the route, the statuses, and the action
//! bindings. Lock hold times are short; no loop sleeps while holding it.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::error::NavFailure;
use crate::geometry::{Point, PointKey};
use crate::pause::PauseRegistry;

/// Movement loop status. Transitions are owned by the movement loop;
/// other threads only request transitions through the shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionStatus {
    /// Actively following the waypoint queue.
    Moving,
    /// Holding still; at least one pause ticket outstanding (or was).
    Idle,
    /// Quiescing actuators on the way to `Idle`.
    Pausing,
    /// Re-engaging after a pause (hooks, drift check, assist).
    Resuming,
    /// Handing control to the assisted direct move.
    PilotEngaging,
    /// Assisted direct move in progress.
    Pilot,
    /// Loop has shut down; actuators quiesced.
    Terminated,
}

/// Steering loop status, deliberately separate from [`MotionStatus`] so
/// heading control can pause independently of propulsion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteerStatus {
    Active,
    Paused,
    Pausing,
    Resuming,
    Terminated,
}

/// A callback bound to a waypoint, fired once when the agent arrives.
pub struct ActionBinding {
    /// Quiesce propulsion before invoking the callback.
    pub stop_before: bool,
    /// Run the mount hook after the callback returns.
    pub mount_after: bool,
    pub callback: Option<Box<dyn Fn(&Point) + Send>>,
}

/// Everything the three loops coordinate through.
pub struct NavState {
    /// Waypoints still ahead, front first.
    pub queue: VecDeque<Point>,
    /// Sum of `seg_dist` over everything still in the queue.
    pub total_remaining: f64,
    pub motion: MotionStatus,
    pub steering: SteerStatus,
    /// The waypoint currently steered toward.
    pub aim: Option<Point>,
    /// The waypoint after `aim`, for corner anticipation.
    pub next2: Option<Point>,
    /// The waypoint most recently reached.
    pub prev: Option<Point>,
    /// Planar speed observed by the movement loop, units per tick.
    pub speed: f64,
    /// Smoothed route speed used for corner braking and steering gates.
    pub path_speed: f64,
    pub last_error: Option<NavFailure>,
    pub actions: HashMap<PointKey, ActionBinding>,
    /// Set by the steering loop to suspend forward drive during hard turns.
    pub steer_hold: bool,
    /// Target of a requested assisted direct move, if any.
    pub pilot_target: Option<Point>,
    pub tickets: PauseRegistry,
}

impl NavState {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            total_remaining: 0.0,
            motion: MotionStatus::Idle,
            steering: SteerStatus::Paused,
            aim: None,
            next2: None,
            prev: None,
            speed: 0.0,
            path_speed: 0.0,
            last_error: None,
            actions: HashMap::new(),
            steer_hold: false,
            pilot_target: None,
            tickets: PauseRegistry::default(),
        }
    }

    /// True while there is a route to follow or one is being paused over.
    pub fn has_route(&self) -> bool {
        !self.queue.is_empty() || self.aim.is_some()
    }

    /// Drop the route and everything bound to it. Statuses are left for
    /// the owning loops to transition.
    pub fn clear_route(&mut self) {
        self.queue.clear();
        self.total_remaining = 0.0;
        self.aim = None;
        self.next2 = None;
        self.actions.clear();
        self.tickets.clear();
        self.pilot_target = None;
    }

    /// Replace the queue and recompute the remaining distance.
    pub fn set_route(&mut self, points: Vec<Point>) {
        self.queue = points.into();
        self.recount_remaining();
    }

    /// Append waypoints to the live queue (chained destinations).
    pub fn extend_route(&mut self, points: Vec<Point>) {
        self.queue.extend(points);
        self.recount_remaining();
    }

    pub fn recount_remaining(&mut self) {
        self.total_remaining = self.queue.iter().map(|p| p.seg_dist).sum();
    }

    /// Pop the front waypoint into the aim slot. The outgoing aim point
    /// has been reached, so its leg leaves the remaining total.
    pub fn advance(&mut self) -> Option<Point> {
        let next = self.queue.pop_front()?;
        if let Some(reached) = self.aim.take() {
            self.total_remaining = (self.total_remaining - reached.seg_dist).max(0.0);
            self.prev = Some(reached);
        }
        self.aim = Some(next.clone());
        self.next2 = self.queue.front().cloned();
        Some(next)
    }

    /// Take the action bound to `point`, if any. The binding fires at most
    /// once; taking it removes it.
    pub fn take_action(&mut self, point: &Point) -> Option<ActionBinding> {
        self.actions.remove(&point.key())
    }

    pub fn paused(&self, now: Instant) -> bool {
        self.tickets.any_active(now)
    }
}

/// Handle shared by the loops and the front-end API.
pub struct SharedNav {
    state: Mutex<NavState>,
    shutdown: AtomicBool,
}

impl SharedNav {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(NavState::new()),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Lock the navigation state. Poisoning is unrecoverable for the
    /// control loops, so a poisoned lock yields the inner state anyway.
    pub fn lock(&self) -> std::sync::MutexGuard<'_, NavState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

impl Default for SharedNav {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wp(x: f64, seg: f64) -> Point {
        let mut p = Point::new(x, 0.0, 0.0);
        p.seg_dist = seg;
        p
    }

    #[test]
    fn advance_moves_aim_and_counts_down() {
        let shared = SharedNav::new();
        let mut st = shared.lock();
        st.set_route(vec![wp(1.0, 1.0), wp(2.0, 1.0), wp(3.0, 1.0)]);
        assert!((st.total_remaining - 3.0).abs() < 1e-9);

        st.advance();
        assert_eq!(st.aim.as_ref().map(|p| p.x), Some(1.0));
        assert_eq!(st.next2.as_ref().map(|p| p.x), Some(2.0));
        // First advance only loads the aim slot; nothing was reached yet.
        assert!((st.total_remaining - 3.0).abs() < 1e-9);

        st.advance();
        assert_eq!(st.prev.as_ref().map(|p| p.x), Some(1.0));
        assert!((st.total_remaining - 2.0).abs() < 1e-9);
    }

    #[test]
    fn action_fires_at_most_once() {
        let shared = SharedNav::new();
        let mut st = shared.lock();
        let target = Point::new(5.0, 0.0, 0.0);
        st.actions.insert(
            target.key(),
            ActionBinding {
                stop_before: false,
                mount_after: false,
                callback: None,
            },
        );
        assert!(st.take_action(&target).is_some());
        assert!(st.take_action(&target).is_none());
    }

    #[test]
    fn clear_route_empties_everything() {
        let shared = SharedNav::new();
        let mut st = shared.lock();
        st.set_route(vec![wp(1.0, 1.0)]);
        st.advance();
        st.clear_route();
        assert!(!st.has_route());
        assert_eq!(st.total_remaining, 0.0);
    }
}
