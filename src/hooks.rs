//! Caller-supplied hooks, invoked synchronously from the control loops.
//!
//! A panicking hook must never take a loop down; every invocation is
//! isolated and logged.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::error;

use crate::geometry::Point;

type MountFn = Box<dyn Fn(f64) + Send + Sync>;
type PreMoveFn = Box<dyn Fn(&Point) + Send + Sync>;
type MaintenanceFn = Box<dyn Fn(f64) + Send + Sync>;

#[derive(Default)]
pub struct NavHooks {
    /// Called with the remaining route distance when movement (re)starts.
    pub on_mount: Option<MountFn>,
    /// Called with the next waypoint on every advancement.
    pub on_pre_move: Option<PreMoveFn>,
    /// Called with the remaining route distance once per maintenance tick.
    pub on_maintenance: Option<MaintenanceFn>,
}

impl NavHooks {
    pub fn fire_mount(&self, remaining: f64) {
        if let Some(hook) = &self.on_mount
            && catch_unwind(AssertUnwindSafe(|| hook(remaining))).is_err()
        {
            error!("mount hook panicked");
        }
    }

    pub fn fire_pre_move(&self, next: &Point) {
        if let Some(hook) = &self.on_pre_move
            && catch_unwind(AssertUnwindSafe(|| hook(next))).is_err()
        {
            error!("pre-move hook panicked");
        }
    }

    pub fn fire_maintenance(&self, remaining: f64) {
        if let Some(hook) = &self.on_maintenance
            && catch_unwind(AssertUnwindSafe(|| hook(remaining))).is_err()
        {
            error!("maintenance hook panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn panicking_hook_is_contained() {
        let hooks = NavHooks {
            on_mount: Some(Box::new(|_| panic!("boom"))),
            ..Default::default()
        };
        hooks.fire_mount(1.0);
    }

    #[test]
    fn hooks_receive_arguments() {
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        let hooks = NavHooks {
            on_maintenance: Some(Box::new(move |d| {
                s.store(d as usize, Ordering::SeqCst);
            })),
            ..Default::default()
        };
        hooks.fire_maintenance(42.0);
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }
}
