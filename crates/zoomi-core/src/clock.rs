//! Time source for expiry decisions.
//!
//! Expiry is always judged against the server's clock. Backends take a
//! [`Clock`] so tests can move time without sleeping.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// A clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
  now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self {
    Self { now: Arc::new(Mutex::new(start)) }
  }

  pub fn set(&self, to: DateTime<Utc>) {
    *self.now.lock().unwrap_or_else(|p| p.into_inner()) = to;
  }

  pub fn advance(&self, by: Duration) {
    let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
    *now += by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap_or_else(|p| p.into_inner())
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn manual_clock_clones_share_time() {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    let other = clock.clone();

    clock.advance(Duration::minutes(11));
    assert_eq!(other.now(), start + Duration::minutes(11));

    other.set(start);
    assert_eq!(clock.now(), start);
  }
}
