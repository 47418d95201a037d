//! Quiet-period debouncing as an explicit, clock-driven state machine.
//!
//! Nothing here spawns timers. The owner pushes values with the time they
//! arrived and polls with the current time; `deadline()` says when the next
//! poll can succeed.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Debouncer<T> {
  delay: Duration,
  pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
  pub fn new(delay: Duration) -> Self {
    Self {
      delay,
      pending: None,
    }
  }

  /// Replace the pending value and restart the quiet period.
  pub fn push(&mut self, value: T, now: Instant) {
    self.pending = Some((value, now + self.delay));
  }

  /// Drop the pending value, if any.
  pub fn cancel(&mut self) -> Option<T> {
    self.pending.take().map(|(value, _)| value)
  }

  #[cfg(test)]
  pub fn is_pending(&self) -> bool {
    self.pending.is_some()
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.pending.as_ref().map(|(_, deadline)| *deadline)
  }

  /// Release the pending value once its quiet period has elapsed.
  pub fn poll(&mut self, now: Instant) -> Option<T> {
    match &self.pending {
      Some((_, deadline)) if now >= *deadline => self.cancel(),
      _ => None,
    }
  }
}
