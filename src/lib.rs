//! ArcNav - waypoint navigation over a sparse route graph.
//!
//! Turns arbitrary (start, destination) pairs into graph-snapped,
//! distance-split waypoint routes and drives an agent along them.
//!
//! ## Multi-Threaded Architecture
//!
//! Three loops run against one mutex-guarded shared state:
//!
//! - **Movement loop** (default 100ms): waypoint advancement, corner
//!   braking, stuck recovery, drift re-routing, pause-ticket sweeping
//! - **Steering loop** (default 50ms): heading control, free turn
//!   commands or towed left/right toggle pulses
//! - **Maintenance loop** (default 300ms): periodic caller hook with the
//!   remaining route distance
//!
//! The agent's body sits behind the [`actuator::Actuator`] trait; a
//! deterministic simulator lives in [`sim`] for tests and the demo
//! binary.

pub mod actuator;
pub mod config;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod hooks;
pub mod motion;
pub mod navigator;
pub mod pause;
pub mod route;
pub mod shared;
pub mod sim;
pub mod steering;
pub mod threads;

pub use actuator::{Actuator, FlatTerrain, HeightMap};
pub use config::NavConfig;
pub use error::{NavError, NavFailure, Result};
pub use geometry::Point;
pub use graph::{PathFinder, RouteGraph};
pub use hooks::NavHooks;
pub use navigator::{Destination, MoveOptions, Navigator};
pub use pause::PauseTicket;
