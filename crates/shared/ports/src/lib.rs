//! Bourse Ports
//!
//! Port definitions (traits) for the Bourse pricing system.
//! These define the boundaries between pricing logic and infrastructure.

mod catalog;
mod clock;
mod error;
mod notification;

pub use catalog::CatalogStore;
pub use clock::Clock;
pub use error::{PublishError, PublishResult, StoreError, StoreResult};
pub use notification::NotificationChannel;
