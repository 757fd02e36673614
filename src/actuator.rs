//! Collaborator interfaces to the agent's body and the world.
//!
//! The control loops never talk to the environment directly; everything
//! goes through these traits so tests and the demo binary can substitute
//! the simulator in [`crate::sim`].

use crate::geometry::Point;

/// Low-level actuation primitives plus body-state queries.
///
/// Latched commands (`move_forward`, `rotate_left`, ...) stay engaged until
/// turned off; the matching `*_state` query reflects the latch, not the
/// physics.
pub trait Actuator: Send {
    fn move_forward(&self, on: bool);
    fn move_backward(&self, on: bool);
    fn jump(&self, on: bool);
    /// Relative turn by `angle` radians (positive = counter-clockwise).
    fn turn_by(&self, angle: f64);
    fn rotate_left(&self, on: bool);
    fn rotate_right(&self, on: bool);

    fn move_forward_state(&self) -> bool;
    fn move_backward_state(&self) -> bool;
    fn jump_state(&self) -> bool;
    fn rotate_left_state(&self) -> bool;
    fn rotate_right_state(&self) -> bool;

    /// Current position of the agent (or its slave platform when towed).
    fn position(&self) -> Point;
    /// Current heading, degrees in (-180, 180].
    fn heading_deg(&self) -> f64;
    /// Planar velocity, units per second.
    fn velocity(&self) -> (f64, f64);
    /// Whether propulsion is externally controlled (towed mode).
    fn is_towed(&self) -> bool;
    /// Whether the agent is idle (no caller input for a while).
    fn is_idle(&self) -> bool;
    /// Whether the agent is busy with an uninterruptible action.
    fn is_busy(&self) -> bool;

    /// Direct assisted move toward a point (pilot mode and resume assist).
    /// Returns false when the move could not be issued.
    fn come_to(&self, target: &Point) -> bool;
    /// Probe the immediate environment for something traversable to
    /// activate (a door, a lever). Returns true when something was used.
    fn interact_ahead(&self, target: &Point) -> bool;
    /// Hard reposition onto a point; last resort of stuck recovery.
    fn reposition(&self, target: &Point);
}

/// Terrain elevation lookup used when resampling split waypoints.
pub trait HeightMap: Send {
    fn height_at(&self, x: f64, y: f64) -> f64;
}

/// Flat world: every point sits at z = 0.
pub struct FlatTerrain;

impl HeightMap for FlatTerrain {
    fn height_at(&self, _x: f64, _y: f64) -> f64 {
        0.0
    }
}
