use bourse_core::Timestamp;
use bourse_ports::Clock;
use chrono::{Duration, Utc};
use parking_lot::RwLock;

/// Clock frozen at a point in time until moved explicitly
///
/// Used by tests that assert on event and history timestamps.
pub struct ManualClock {
    current: RwLock<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: RwLock::new(start),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, time: Timestamp) {
        *self.current.write() = time;
    }

    /// Move forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.write();
        *current += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.read()
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}
