use chrono::{DateTime, FixedOffset, Utc};
use parking_lot::Mutex;

/// Time source injected into the service.
///
/// The reported instant may carry any zone offset; the service normalizes
/// everything it persists or returns to UTC.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall-clock time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().fixed_offset()
    }
}

/// Clock pinned to an explicit instant, advanced by hand. Intended for
/// tests that assert on `updated_at`.
#[derive(Debug)]
pub struct ManualClock {
    instant: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn at(instant: DateTime<FixedOffset>) -> Self {
        Self {
            instant: Mutex::new(instant),
        }
    }

    pub fn set(&self, instant: DateTime<FixedOffset>) {
        *self.instant.lock() = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.instant.lock()
    }
}
