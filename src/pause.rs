//! Pause tickets: cooperative, multi-holder suspension of movement.
//!
//! Every caller that wants movement held gets its own ticket. Movement
//! resumes only after every ticket has been released, dropped, or has
//! expired. The registry keeps weak references so an abandoned ticket can
//! never wedge the controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tracing::debug;

/// Tickets with no explicit duration effectively never expire.
pub const DEFAULT_TICKET_LIFE: Duration = Duration::from_secs(100 * 24 * 3600);

/// A single hold on movement. Release it with [`PauseTicket::dispose`] or
/// just drop the last `Arc` to it.
pub struct PauseTicket {
    expires_at: Instant,
    disposed: AtomicBool,
}

impl PauseTicket {
    fn new(life: Duration) -> Self {
        Self {
            expires_at: Instant::now() + life,
            disposed: AtomicBool::new(false),
        }
    }

    /// Release the hold. Safe to call more than once.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn is_active(&self, now: Instant) -> bool {
        !self.is_disposed() && now < self.expires_at
    }
}

/// Owner of all outstanding tickets. Held inside the shared navigation
/// state, swept once per movement tick.
#[derive(Default)]
pub struct PauseRegistry {
    tickets: Vec<Weak<PauseTicket>>,
}

impl PauseRegistry {
    /// Issue a new ticket with the given lifetime.
    pub fn issue(&mut self, life: Duration) -> Arc<PauseTicket> {
        let ticket = Arc::new(PauseTicket::new(life));
        self.tickets.push(Arc::downgrade(&ticket));
        debug!(outstanding = self.tickets.len(), "pause ticket issued");
        ticket
    }

    /// Drop every reference to tickets that are gone, disposed, or past
    /// their expiry. Returns the number of tickets still holding movement.
    pub fn sweep(&mut self, now: Instant) -> usize {
        self.tickets.retain(|weak| match weak.upgrade() {
            Some(ticket) => ticket.is_active(now),
            None => false,
        });
        self.tickets.len()
    }

    /// True while at least one live ticket holds movement.
    pub fn any_active(&self, now: Instant) -> bool {
        self.tickets
            .iter()
            .any(|weak| weak.upgrade().is_some_and(|t| t.is_active(now)))
    }

    pub fn clear(&mut self) {
        self.tickets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposed_ticket_is_swept() {
        let mut reg = PauseRegistry::default();
        let t = reg.issue(DEFAULT_TICKET_LIFE);
        assert_eq!(reg.sweep(Instant::now()), 1);
        t.dispose();
        assert_eq!(reg.sweep(Instant::now()), 0);
    }

    #[test]
    fn dropped_ticket_is_swept() {
        let mut reg = PauseRegistry::default();
        {
            let _t = reg.issue(DEFAULT_TICKET_LIFE);
        }
        assert_eq!(reg.sweep(Instant::now()), 0);
    }

    #[test]
    fn expired_ticket_is_swept_without_dispose() {
        let mut reg = PauseRegistry::default();
        let t = reg.issue(Duration::from_millis(10));
        let later = Instant::now() + Duration::from_secs(1);
        assert!(!t.is_disposed());
        assert_eq!(reg.sweep(later), 0);
        assert!(!reg.any_active(later));
    }

    #[test]
    fn movement_held_until_every_ticket_released() {
        let mut reg = PauseRegistry::default();
        let tickets: Vec<_> = (0..4).map(|_| reg.issue(DEFAULT_TICKET_LIFE)).collect();
        for (i, t) in tickets.iter().enumerate() {
            assert!(reg.any_active(Instant::now()), "held at {i}");
            t.dispose();
        }
        assert_eq!(reg.sweep(Instant::now()), 0);
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut reg = PauseRegistry::default();
        let t = reg.issue(DEFAULT_TICKET_LIFE);
        t.dispose();
        t.dispose();
        assert_eq!(reg.sweep(Instant::now()), 0);
    }
}
