//! Movement state machine: consumes the waypoint queue, advances through
//! it, brakes on sharp corners, recovers from being stuck, and re-routes
//! on drift.
//!
//! All transitions of [`MotionStatus`] are made here, on the movement
//! loop's thread. Other threads only request transitions by writing the
//! shared state; this loop observes and acts within one tick. Recovery
//! pulses and corner braking use lazily-checked deadlines instead of
//! blocking sleeps so shutdown is never delayed by them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::actuator::Actuator;
use crate::config::NavConfig;
use crate::error::NavFailure;
use crate::geometry::{Point, azimuth_deg, normalize_deg, turn_angle_deg};
use crate::hooks::NavHooks;
use crate::route::RouteGenerator;
use crate::shared::{ActionBinding, MotionStatus, SharedNav, SteerStatus};

/// Upper bound on queue advancements per tick.
const MAX_ADVANCE_PER_TICK: usize = 5;
/// Stuck counter restart value after an advancement; gives the agent a
/// grace window before recovery kicks in.
const STUCK_GRACE: i32 = -10;
/// Closure below this, per tick, counts as no progress.
const STALL_CLOSURE: f64 = 0.001;
/// Heading errors beyond this suppress stuck counting; the agent is
/// still turning, not wedged.
const STUCK_HEADING_LIMIT: f64 = 75.0;
/// Length of the reverse pulse used for towed stuck recovery.
const REVERSE_PULSE: Duration = Duration::from_millis(1351);
/// Length of the vertical displacement pulse.
const JUMP_PULSE: Duration = Duration::from_millis(70);

/// Work gathered under the shared lock, executed after releasing it so
/// action callbacks can re-enter the public API.
#[derive(Default)]
struct TickPlan {
    fire: Vec<(ActionBinding, Point)>,
    pre_move: Option<Point>,
    arrived: bool,
}

pub struct MotionController {
    shared: Arc<SharedNav>,
    actuator: Arc<dyn Actuator + Sync>,
    routes: Arc<RouteGenerator>,
    hooks: Arc<NavHooks>,
    config: NavConfig,
    stuck: i32,
    last_dist: f64,
    /// Turn angle (degrees) at the upcoming waypoint, refreshed on
    /// advancement; drives corner braking.
    turn_ahead: f64,
    brake_until: Option<Instant>,
    reverse_until: Option<Instant>,
    jump_until: Option<Instant>,
}

impl MotionController {
    pub fn new(
        shared: Arc<SharedNav>,
        actuator: Arc<dyn Actuator + Sync>,
        routes: Arc<RouteGenerator>,
        hooks: Arc<NavHooks>,
        config: NavConfig,
    ) -> Self {
        Self {
            shared,
            actuator,
            routes,
            hooks,
            config,
            stuck: 0,
            last_dist: 0.0,
            turn_ahead: 0.0,
            brake_until: None,
            reverse_until: None,
            jump_until: None,
        }
    }

    /// One movement tick. Safe to call at any rate; all timing inside is
    /// measured against `now`.
    pub fn tick(&mut self, now: Instant) {
        let status = {
            let mut st = self.shared.lock();
            st.tickets.sweep(now);
            st.motion
        };

        match status {
            MotionStatus::Terminated => self.quiesce_all(),
            MotionStatus::Pausing => self.tick_pausing(),
            MotionStatus::Idle => self.tick_idle(now),
            MotionStatus::Resuming => self.tick_resuming(),
            MotionStatus::PilotEngaging => self.tick_pilot_engage(),
            MotionStatus::Pilot => self.tick_pilot(),
            MotionStatus::Moving => self.tick_moving(now),
        }
    }

    /// Stop every latched actuator. Run on any path out of active motion.
    pub fn quiesce_all(&self) {
        if self.actuator.move_forward_state() {
            self.actuator.move_forward(false);
        }
        if self.actuator.move_backward_state() {
            self.actuator.move_backward(false);
        }
        if self.actuator.jump_state() {
            self.actuator.jump(false);
        }
        if self.actuator.rotate_left_state() {
            self.actuator.rotate_left(false);
        }
        if self.actuator.rotate_right_state() {
            self.actuator.rotate_right(false);
        }
    }

    fn tick_pausing(&mut self) {
        self.quiesce_all();
        self.reset_progress();
        self.brake_until = None;
        self.reverse_until = None;
        self.jump_until = None;
        let mut st = self.shared.lock();
        st.steering = SteerStatus::Pausing;
        st.motion = MotionStatus::Idle;
        debug!("movement paused");
    }

    fn tick_idle(&mut self, now: Instant) {
        let mut st = self.shared.lock();
        if st.queue.is_empty() && st.aim.is_none() {
            return;
        }
        let held = st.tickets.any_active(now);
        let idle_resume = self.config.auto_resume_on_idle && self.actuator.is_idle();
        if !held || idle_resume {
            st.tickets.clear();
            st.motion = MotionStatus::Resuming;
            debug!(idle_resume, "resuming movement");
        }
    }

    fn tick_resuming(&mut self) {
        let me = self.actuator.position();
        let (aim, remaining, pilot) = {
            let mut st = self.shared.lock();
            if st.aim.is_none() && st.advance().is_none() {
                warn!("cannot resume, route is empty");
                st.motion = MotionStatus::Idle;
                return;
            }
            (
                st.aim.clone(),
                st.total_remaining,
                st.pilot_target.is_some(),
            )
        };
        let Some(aim) = aim else { return };

        self.hooks.fire_pre_move(&aim);
        self.hooks.fire_mount(remaining);
        if !self.actuator.is_towed() {
            self.actuator.come_to(&aim);
        }

        // Long pauses can leave the agent far from where it stopped.
        if me.distance_full(&aim) > self.config.lazy_distance && !self.regenerate_to(&me, &aim) {
            return;
        }

        self.reset_progress();
        let mut st = self.shared.lock();
        if pilot && !self.actuator.is_towed() {
            st.motion = MotionStatus::PilotEngaging;
            return;
        }
        st.motion = MotionStatus::Moving;
        st.steering = SteerStatus::Resuming;
        if !st.steer_hold && !self.actuator.move_forward_state() {
            self.actuator.move_forward(true);
        }
    }

    fn tick_pilot_engage(&mut self) {
        if self.actuator.is_towed() {
            error!("pilot mode refused while under tow");
            let mut st = self.shared.lock();
            st.pilot_target = None;
            st.motion = MotionStatus::Moving;
            return;
        }
        self.quiesce_all();
        let mut st = self.shared.lock();
        st.steering = SteerStatus::Paused;
        if st.aim.is_none() && st.advance().is_none() {
            st.motion = MotionStatus::Idle;
            return;
        }
        st.motion = MotionStatus::Pilot;
    }

    fn tick_pilot(&mut self) {
        let (aim, engaged) = {
            let st = self.shared.lock();
            (st.aim.clone(), st.pilot_target.is_some())
        };
        let Some(aim) = aim else {
            self.shared.lock().motion = MotionStatus::Idle;
            return;
        };
        if !engaged {
            self.shared.lock().motion = MotionStatus::Moving;
            return;
        }

        if self.actuator.come_to(&aim) {
            let mut st = self.shared.lock();
            if st.advance().is_none() {
                st.clear_route();
                st.motion = MotionStatus::Idle;
                debug!("pilot reached destination");
            }
        } else {
            warn!("assisted move failed, falling back to normal movement");
            let mut st = self.shared.lock();
            st.pilot_target = None;
            st.motion = MotionStatus::Moving;
        }
    }

    fn tick_moving(&mut self, now: Instant) {
        let me = self.actuator.position();
        let towed = self.actuator.is_towed();
        let forward = self.actuator.move_forward_state();
        let (vx, vy) = self.actuator.velocity();
        let speed = (vx * vx + vy * vy).sqrt();

        let plan = self.advance_queue(&me, speed, towed || forward);

        for (binding, point) in plan.fire {
            if binding.stop_before {
                self.quiesce_all();
            }
            if let Some(cb) = binding.callback
                && std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(&point))).is_err()
            {
                error!("arrival action panicked at {point}");
            }
            if binding.mount_after {
                let remaining = self.shared.lock().total_remaining;
                self.hooks.fire_mount(remaining);
            }
        }
        if plan.arrived {
            self.quiesce_all();
            debug!("destination reached");
            return;
        }
        if let Some(next) = plan.pre_move {
            self.hooks.fire_pre_move(&next);
        }

        let (aim, next2, steer_hold) = {
            let mut st = self.shared.lock();
            st.speed = speed;
            (st.aim.clone(), st.next2.clone(), st.steer_hold)
        };
        let Some(aim) = aim else {
            // Queue drained outside the advancement path (stop, pause).
            return;
        };

        self.manage_braking(now, &me, &aim, next2.as_ref());

        // Keep the forward latch on unless braking or steering holds it.
        let braking = self.brake_until.is_some_and(|t| now < t);
        let reversing = self.reverse_until.is_some_and(|t| now < t);
        if !braking && !reversing && !steer_hold && !self.actuator.move_forward_state() {
            if self.actuator.move_backward_state() {
                self.actuator.move_backward(false);
            }
            self.actuator.move_forward(true);
        }

        self.track_progress(now, &me, &aim, towed);

        // Drift: the world moved us (or the route is stale). Rebuild the
        // prefix toward the current aim before giving up on it.
        let drift = me.distance_full(&aim);
        if drift > self.config.lazy_distance {
            warn!(drift, "drifted beyond route, regenerating prefix");
            self.regenerate_to(&me, &aim);
        }
    }

    /// Pop waypoints the agent has reached or overshot, collecting bound
    /// actions and hook work. Lock is held for the whole pass.
    fn advance_queue(&mut self, me: &Point, speed: f64, engaged: bool) -> TickPlan {
        let mut plan = TickPlan::default();
        if !engaged {
            return plan;
        }
        let mut st = self.shared.lock();
        let mut advanced = false;

        for _ in 0..MAX_ADVANCE_PER_TICK {
            let Some(aim) = st.aim.clone() else { break };
            let within = me.distance_planar(&aim) <= aim.radius + me.radius + speed * 0.2;
            // Corner cutting: the head is already behind us relative to
            // the next leg, so driving back to it would be a detour.
            let corner_cut = st.next2.as_ref().is_some_and(|n2| {
                aim.distance_planar(n2) >= me.distance_planar(n2) + n2.radius + me.radius + speed * 0.2
            });
            if !within && !corner_cut {
                break;
            }

            if let Some(binding) = st.take_action(&aim) {
                plan.fire.push((binding, aim.clone()));
            }
            if st.queue.is_empty() {
                st.clear_route();
                st.motion = MotionStatus::Idle;
                st.steering = SteerStatus::Pausing;
                plan.arrived = true;
                return plan;
            }
            st.advance();
            advanced = true;
        }

        if advanced {
            plan.pre_move = st.aim.clone();
            self.last_dist = 0.0;
            self.stuck = STUCK_GRACE;
            self.turn_ahead = match (&st.prev, &st.aim, &st.next2) {
                (Some(prev), Some(aim), Some(next2)) => turn_angle_deg(prev, aim, next2),
                _ => 0.0,
            };
            debug!(
                left = st.queue.len(),
                turn_ahead = self.turn_ahead,
                "advanced to {:?}",
                st.aim.as_ref().map(|p| p.to_string())
            );
        }
        plan
    }

    /// Corner braking: drop the forward latch ahead of a sharp turn for a
    /// duration proportional to angle and route speed.
    fn manage_braking(&mut self, now: Instant, me: &Point, aim: &Point, next2: Option<&Point>) {
        if let Some(t) = self.brake_until
            && now >= t
        {
            self.brake_until = None;
        }
        if self.brake_until.is_some() || next2.is_none() {
            return;
        }
        let path_speed = self.shared.lock().path_speed;
        if self.turn_ahead > self.config.corner_brake_deg
            && self.actuator.move_forward_state()
            && path_speed > self.config.corner_brake_min_speed
            && me.distance_full(aim) < path_speed * 4.0
        {
            let hold = Duration::from_millis((self.turn_ahead * path_speed).round() as u64);
            debug!(
                angle = self.turn_ahead,
                path_speed,
                ?hold,
                "braking for corner"
            );
            self.actuator.move_forward(false);
            self.brake_until = Some(now + hold);
        }
    }

    /// Closure-rate bookkeeping and the stuck recovery ladder.
    fn track_progress(&mut self, now: Instant, me: &Point, aim: &Point, towed: bool) {
        // Finish any outstanding recovery pulse first.
        if let Some(t) = self.reverse_until
            && now >= t
        {
            self.reverse_until = None;
            if self.actuator.move_backward_state() {
                self.actuator.move_backward(false);
            }
        }
        if let Some(t) = self.jump_until
            && now >= t
        {
            self.jump_until = None;
            if self.actuator.jump_state() {
                self.actuator.jump(false);
            }
        }

        let dist = me.distance_planar(aim);
        let closure = self.last_dist - dist;
        self.shared.lock().path_speed = closure;

        let heading_err =
            normalize_deg(azimuth_deg(me, aim) - self.actuator.heading_deg()).abs();
        if closure <= STALL_CLOSURE && self.last_dist > 0.0 && heading_err < STUCK_HEADING_LIMIT {
            self.stuck += 1;
            if towed && self.actuator.move_forward_state() {
                if self.stuck > 3 && self.reverse_until.is_none() {
                    debug!("towed and stuck, reverse pulse");
                    self.actuator.move_forward(false);
                    self.actuator.move_backward(true);
                    self.reverse_until = Some(now + REVERSE_PULSE);
                    self.last_dist = 0.0;
                    self.stuck = 0;
                    return;
                }
            } else if self.stuck == 5 {
                debug!("stuck, probing for a passage");
                self.actuator.move_forward(false);
                if self.actuator.interact_ahead(aim) {
                    self.last_dist = 0.0;
                }
            } else if self.stuck == 6 && self.jump_until.is_none() {
                debug!("stuck, vertical displacement");
                self.actuator.jump(true);
                self.jump_until = Some(now + JUMP_PULSE);
            } else if self.stuck > 12 {
                warn!("stuck recovery exhausted, repositioning onto {aim}");
                self.actuator.reposition(aim);
                self.stuck = 0;
                self.last_dist = 0.0;
            }
        } else if closure > STALL_CLOSURE && self.stuck > 0 {
            self.stuck = 0;
        }
        self.last_dist = dist;
    }

    /// Rebuild a route from `from` to `target` and splice it ahead of the
    /// remaining queue. On failure the route is abandoned with
    /// [`NavFailure::TargetLost`].
    fn regenerate_to(&mut self, from: &Point, target: &Point) -> bool {
        match self.routes.generate(from, target, None, None) {
            Ok(plan) => {
                {
                    let mut st = self.shared.lock();
                    let mut queue: Vec<Point> = plan.points;
                    queue.extend(st.queue.drain(..));
                    st.set_route(queue);
                    st.aim = None;
                    st.next2 = None;
                    st.advance();
                }
                self.reset_progress();
                true
            }
            Err(err) => {
                error!(%err, "route regeneration failed, target lost");
                let mut st = self.shared.lock();
                st.last_error = Some(NavFailure::TargetLost);
                st.clear_route();
                st.motion = MotionStatus::Idle;
                st.steering = SteerStatus::Pausing;
                drop(st);
                self.quiesce_all();
                false
            }
        }
    }

    fn reset_progress(&mut self) {
        self.last_dist = 0.0;
        self.stuck = STUCK_GRACE;
    }
}
