//! Trailing debounce.
//!
//! The debouncer holds no timer. It remembers the last touch and answers
//! "is it due?" for a given `now`, so callers drive it from any clock.

use chrono::{DateTime, Duration, Utc};

/// Trailing-edge debouncer.
///
/// Each [`touch`](Debouncer::touch) restarts the quiet window. The pending
/// work becomes due once `delay` has passed since the last touch and fires
/// at most once per burst.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    last_touch: Option<DateTime<Utc>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_touch: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record activity at `now`, restarting the window.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_touch = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.last_touch.is_some()
    }

    /// When the pending work becomes due.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.last_touch.map(|t| t + self.delay)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Consume the pending work if it is due.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_due(now) {
            self.last_touch = None;
            true
        } else {
            false
        }
    }

    /// Consume the pending work regardless of the deadline (flush).
    pub fn take_pending(&mut self) -> bool {
        self.last_touch.take().is_some()
    }

    /// Drop the pending work.
    pub fn cancel(&mut self) {
        self.last_touch = None;
    }
}
