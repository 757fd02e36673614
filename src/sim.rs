//! Deterministic kinematic simulator backing the demo binary and the
//! controller tests. No physics beyond straight-line integration; just
//! enough behavior to exercise the control loops.

use std::sync::Mutex;

use crate::actuator::Actuator;
use crate::geometry::{Point, azimuth_deg, normalize_deg};

/// Default ground speed, units per second.
const SIM_SPEED: f64 = 5.0;
/// Turn rate under rotate toggles, degrees per second.
const SIM_TURN_RATE: f64 = 90.0;

#[derive(Default)]
struct SimState {
    position: Point,
    heading_deg: f64,
    velocity: (f64, f64),
    forward: bool,
    backward: bool,
    jumping: bool,
    rotate_left: bool,
    rotate_right: bool,
    towed: bool,
    last_turn: f64,
    repositioned: bool,
}

/// Simulated agent body with latched actuation.
pub struct SimActuator {
    state: Mutex<SimState>,
}

impl SimActuator {
    pub fn new(start: Point) -> Self {
        Self {
            state: Mutex::new(SimState {
                position: start,
                ..Default::default()
            }),
        }
    }

    /// Integrate the latched actuation over `dt` seconds.
    pub fn step(&self, dt: f64) {
        let mut st = self.lock();
        if st.rotate_left {
            st.heading_deg = normalize_deg(st.heading_deg + SIM_TURN_RATE * dt);
        }
        if st.rotate_right {
            st.heading_deg = normalize_deg(st.heading_deg - SIM_TURN_RATE * dt);
        }
        let drive = match (st.forward, st.backward) {
            (true, false) => SIM_SPEED,
            (false, true) => -SIM_SPEED,
            _ => 0.0,
        };
        let (sin, cos) = st.heading_deg.to_radians().sin_cos();
        st.velocity = (drive * cos, drive * sin);
        st.position.x += st.velocity.0 * dt;
        st.position.y += st.velocity.1 * dt;
    }

    /// Teleport the agent; test scaffolding.
    pub fn place(&self, position: Point) {
        self.lock().position = position;
    }

    pub fn set_heading(&self, heading_deg: f64) {
        self.lock().heading_deg = normalize_deg(heading_deg);
    }

    pub fn set_heading_toward(&self, target: &Point) {
        let mut st = self.lock();
        let here = st.position.clone();
        st.heading_deg = azimuth_deg(&here, target);
    }

    pub fn set_towed(&self, towed: bool) {
        self.lock().towed = towed;
    }

    /// Last relative turn issued through [`Actuator::turn_by`], radians.
    pub fn last_turn(&self) -> f64 {
        self.lock().last_turn
    }

    pub fn repositioned(&self) -> bool {
        self.lock().repositioned
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Actuator for SimActuator {
    fn move_forward(&self, on: bool) {
        self.lock().forward = on;
    }

    fn move_backward(&self, on: bool) {
        self.lock().backward = on;
    }

    fn jump(&self, on: bool) {
        self.lock().jumping = on;
    }

    fn turn_by(&self, angle: f64) {
        let mut st = self.lock();
        st.last_turn = angle;
        st.heading_deg = normalize_deg(st.heading_deg + angle.to_degrees());
    }

    fn rotate_left(&self, on: bool) {
        self.lock().rotate_left = on;
    }

    fn rotate_right(&self, on: bool) {
        self.lock().rotate_right = on;
    }

    fn move_forward_state(&self) -> bool {
        self.lock().forward
    }

    fn move_backward_state(&self) -> bool {
        self.lock().backward
    }

    fn jump_state(&self) -> bool {
        self.lock().jumping
    }

    fn rotate_left_state(&self) -> bool {
        self.lock().rotate_left
    }

    fn rotate_right_state(&self) -> bool {
        self.lock().rotate_right
    }

    fn position(&self) -> Point {
        self.lock().position.clone()
    }

    fn heading_deg(&self) -> f64 {
        self.lock().heading_deg
    }

    fn velocity(&self) -> (f64, f64) {
        self.lock().velocity
    }

    fn is_towed(&self) -> bool {
        self.lock().towed
    }

    fn is_idle(&self) -> bool {
        false
    }

    fn is_busy(&self) -> bool {
        false
    }

    fn come_to(&self, target: &Point) -> bool {
        let mut st = self.lock();
        st.position = target.clone();
        true
    }

    fn interact_ahead(&self, _target: &Point) -> bool {
        false
    }

    fn reposition(&self, target: &Point) {
        let mut st = self.lock();
        st.position = target.clone();
        st.repositioned = true;
    }
}
