pub mod exchange;
pub mod subscriptions;
pub mod tasks;
pub mod watcher;

pub use exchange::{
    ExchangeStarted, ExchangeStatus, TrackedPrice, VenueExchange, VenueStatus, VenueSubscription,
    WatchedVenue,
};
pub use subscriptions::{Subscription, SubscriptionRegistry};
pub use tasks::{TaskKind, TaskRegistry};
pub use watcher::{ChangeWatcher, WatchStatus};
