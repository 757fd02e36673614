//! Heading-control loop, independent of propulsion.
//!
//! Runs faster than the movement loop (default 50ms vs 100ms). Free
//! agents get direct turn-by-angle commands; towed agents only have
//! discrete left/right toggles, so large errors hold a toggle and small
//! errors pulse it briefly (lazily-timed, never a blocking sleep).
//! When a towed agent cannot out-turn its forward motion the loop raises
//! `steer_hold` so the movement loop keeps the forward latch off.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::actuator::Actuator;
use crate::geometry::{azimuth_deg, normalize_deg};
use crate::shared::{SharedNav, SteerStatus};

/// Achievable turn rate, degrees per speed unit of remaining distance.
const TURN_RATE: f64 = 22.2;
/// Micro-correction pulse length per degree of error.
const PULSE_PER_DEG: Duration = Duration::from_millis(22);
/// Length of the reverse tap used to kill speed on a hard free-mode turn.
const REVERSE_TAP: Duration = Duration::from_millis(50);
/// Errors past this mean the turn cannot finish under tow; hold forward.
const TOW_ANGLE_CEILING: f64 = 45.0;

#[derive(Clone, Copy, PartialEq, Eq)]
enum PulseSide {
    Left,
    Right,
}

pub struct SteeringController {
    shared: Arc<SharedNav>,
    actuator: Arc<dyn Actuator + Sync>,
    pulse_until: Option<(Instant, PulseSide)>,
    tap_until: Option<Instant>,
}

impl SteeringController {
    pub fn new(shared: Arc<SharedNav>, actuator: Arc<dyn Actuator + Sync>) -> Self {
        Self {
            shared,
            actuator,
            pulse_until: None,
            tap_until: None,
        }
    }

    pub fn tick(&mut self, now: Instant) {
        self.finish_pulses(now);

        let (status, working) = {
            let st = self.shared.lock();
            (st.steering, st.has_route())
        };
        match status {
            SteerStatus::Terminated => {
                self.release_rotation();
                return;
            }
            SteerStatus::Pausing => {
                self.release_rotation();
                self.clear_hold();
                self.shared.lock().steering = SteerStatus::Paused;
                return;
            }
            SteerStatus::Paused => return,
            SteerStatus::Resuming => {
                self.shared.lock().steering = SteerStatus::Active;
            }
            SteerStatus::Active => {}
        }
        if !working {
            self.shared.lock().steering = SteerStatus::Pausing;
            return;
        }

        let me = self.actuator.position();
        let (vx, vy) = self.actuator.velocity();
        let speed = (vx * vx + vy * vy).sqrt();
        let (aim, next2) = {
            let mut st = self.shared.lock();
            st.speed = speed;
            (st.aim.clone(), st.next2.clone())
        };
        let Some(aim) = aim else { return };

        let dist = me.distance_planar(&aim);
        let mut an = normalize_deg(azimuth_deg(&me, &aim) - self.actuator.heading_deg());
        // Deadband, widened when already close to the aim point.
        if an.abs() <= 2.0 || (an.abs() <= 5.0 && dist < 5.0) {
            an = 0.0;
        }

        if self.actuator.is_towed() {
            self.steer_towed(now, an, dist, speed);
        } else {
            self.steer_free(now, an, dist, speed, next2.is_some());
        }
    }

    fn steer_free(&mut self, now: Instant, an: f64, dist: f64, speed: f64, has_next2: bool) {
        // Hard turn at speed: tap the brakes so the turn lands.
        if has_next2
            && an.abs() > 50.0
            && speed > 0.0
            && an.abs() > (dist / speed) * TURN_RATE
            && self.actuator.move_forward_state()
            && self.tap_until.is_none()
        {
            debug!(an, dist, speed, "hard turn, reverse tap");
            self.set_hold(true);
            self.actuator.move_forward(false);
            self.actuator.move_backward(true);
            self.tap_until = Some(now + REVERSE_TAP);
        }
        if an != 0.0 {
            self.actuator.turn_by(-an.to_radians());
        }
    }

    fn steer_towed(&mut self, now: Instant, an: f64, dist: f64, speed: f64) {
        // The tow keeps pulling forward; suspend it when the error cannot
        // close over the remaining distance.
        let unreachable_turn = speed > 0.0 && an.abs() > (dist / speed) * TURN_RATE;
        if an.abs() > 3.0 && (unreachable_turn || an.abs() > TOW_ANGLE_CEILING || dist < 4.0) {
            if self.actuator.move_forward_state() {
                self.actuator.move_forward(false);
            }
            self.set_hold(true);
        } else {
            self.clear_hold();
        }

        if self.pulse_until.is_some() {
            return;
        }
        if an < -3.0 {
            if self.actuator.rotate_right_state() {
                self.actuator.rotate_right(false);
            }
            if !self.actuator.rotate_left_state() {
                self.actuator.rotate_left(true);
                if an.abs() <= 6.0 {
                    // Micro-correction: a timed tap instead of a hold.
                    self.pulse_until =
                        Some((now + PULSE_PER_DEG * an.abs().ceil() as u32, PulseSide::Left));
                }
            }
        } else if an > 3.0 {
            if self.actuator.rotate_left_state() {
                self.actuator.rotate_left(false);
            }
            if !self.actuator.rotate_right_state() {
                self.actuator.rotate_right(true);
                if an.abs() <= 6.0 {
                    self.pulse_until =
                        Some((now + PULSE_PER_DEG * an.abs().ceil() as u32, PulseSide::Right));
                }
            }
        } else {
            self.release_rotation();
        }
    }

    /// Expire timed pulses and taps.
    fn finish_pulses(&mut self, now: Instant) {
        if let Some((t, side)) = self.pulse_until
            && now >= t
        {
            self.pulse_until = None;
            match side {
                PulseSide::Left => self.actuator.rotate_left(false),
                PulseSide::Right => self.actuator.rotate_right(false),
            }
        }
        if let Some(t) = self.tap_until
            && now >= t
        {
            self.tap_until = None;
            if self.actuator.move_backward_state() {
                self.actuator.move_backward(false);
            }
            self.set_hold(false);
        }
    }

    pub fn release_rotation(&mut self) {
        self.pulse_until = None;
        if self.actuator.rotate_left_state() {
            self.actuator.rotate_left(false);
        }
        if self.actuator.rotate_right_state() {
            self.actuator.rotate_right(false);
        }
    }

    fn set_hold(&self, hold: bool) {
        self.shared.lock().steer_hold = hold;
    }

    fn clear_hold(&self) {
        let mut st = self.shared.lock();
        if st.steer_hold {
            st.steer_hold = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::shared::MotionStatus;
    use crate::sim::SimActuator;

    fn setup(aim: Point, towed: bool) -> (SteeringController, Arc<SharedNav>, Arc<SimActuator>) {
        let shared = Arc::new(SharedNav::new());
        {
            let mut st = shared.lock();
            st.queue.push_back(aim.clone());
            st.advance();
            st.motion = MotionStatus::Moving;
            st.steering = SteerStatus::Active;
        }
        let actuator = Arc::new(SimActuator::new(Point::new(0.0, 0.0, 0.0)));
        actuator.set_towed(towed);
        let ctrl = SteeringController::new(shared.clone(), actuator.clone());
        (ctrl, shared, actuator)
    }

    #[test]
    fn free_mode_turns_toward_aim() {
        let (mut ctrl, _shared, actuator) = setup(Point::new(0.0, 10.0, 0.0), false);
        actuator.set_heading(0.0);
        ctrl.tick(Instant::now());
        let correction = actuator.last_turn();
        assert!(correction.abs() > 0.1, "no turn issued");
    }

    #[test]
    fn deadband_suppresses_small_errors() {
        let (mut ctrl, _shared, actuator) = setup(Point::new(10.0, 0.0, 0.0), false);
        actuator.set_heading_toward(&Point::new(10.0, 0.3, 0.0));
        ctrl.tick(Instant::now());
        assert_eq!(actuator.last_turn(), 0.0);
    }

    #[test]
    fn towed_large_error_holds_toggle() {
        let (mut ctrl, shared, actuator) = setup(Point::new(-10.0, 0.0, 0.0), true);
        actuator.set_heading_toward(&Point::new(10.0, 0.0, 0.0));
        actuator.move_forward(true);
        ctrl.tick(Instant::now());
        assert!(actuator.rotate_left_state() || actuator.rotate_right_state());
        // Error far beyond the ceiling: forward suspended, hold raised.
        assert!(!actuator.move_forward_state());
        assert!(shared.lock().steer_hold);
    }

    #[test]
    fn towed_small_error_pulses_then_releases() {
        let (mut ctrl, _shared, actuator) = setup(Point::new(100.0, 0.0, 0.0), true);
        // About 5 degrees off.
        actuator.set_heading_toward(&Point::new(100.0, 9.0, 0.0));
        let start = Instant::now();
        ctrl.tick(start);
        assert!(actuator.rotate_left_state() || actuator.rotate_right_state());
        // Heading corrected by the pulse; expiry releases the toggle.
        actuator.set_heading_toward(&Point::new(100.0, 0.0, 0.0));
        ctrl.tick(start + Duration::from_secs(1));
        assert!(!actuator.rotate_left_state() && !actuator.rotate_right_state());
    }

    #[test]
    fn empty_route_self_demotes() {
        let (mut ctrl, shared, _actuator) = setup(Point::new(10.0, 0.0, 0.0), false);
        shared.lock().clear_route();
        ctrl.tick(Instant::now());
        assert_eq!(shared.lock().steering, SteerStatus::Pausing);
        ctrl.tick(Instant::now());
        assert_eq!(shared.lock().steering, SteerStatus::Paused);
    }
}
