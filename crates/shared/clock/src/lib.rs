//! Bourse Clock Infrastructure
//!
//! Time sources behind the [`Clock`] port:
//!
//! - [`SystemClock`]: wall-clock time for production
//! - [`ManualClock`]: frozen time that only moves when told to, for tests
//!
//! ```ignore
//! use bourse_clock::{ManualClock, Clock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::default();
//! let before = clock.now();
//! clock.advance(Duration::seconds(5));
//! assert_eq!(clock.now() - before, Duration::seconds(5));
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use bourse_ports::Clock;
