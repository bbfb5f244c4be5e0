//! Time sources for the registry stores.

use chrono::{DateTime, Utc};

/// Supplies the current time.
///
/// Stores take a clock instead of reading the wall clock so that expiry
/// and status timestamps are deterministic under test.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// A clock that only moves when told to.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct ManualClock(std::sync::Arc<parking_lot::Mutex<DateTime<Utc>>>);

#[cfg(test)]
impl ManualClock {
    pub(crate) fn at(now: DateTime<Utc>) -> Self {
        Self(std::sync::Arc::new(parking_lot::Mutex::new(now)))
    }

    pub(crate) fn advance(&self, by: chrono::Duration) {
        *self.0.lock() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}
