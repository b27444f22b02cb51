//! Bourse Exchange
//!
//! Runs the price engine for many venues at once and keeps observers in
//! sync with the resulting prices:
//!
//! - **Rebalancer**: recurring per-venue decay of order counts
//! - **Change Watcher**: recurring per-venue poll that diffs stored prices
//!   and broadcasts `price-update` / `bulk-price-update` events
//! - **Subscription Registry**: observer counts; the first observer starts
//!   a venue's poll, the last one stops it
//! - **Task Registry**: cancellable timers keyed by `(kind, venue)`
//!
//! [`VenueExchange`] is the facade tying them together.

// Application layer
pub mod application;

// Infrastructure layer
pub mod infrastructure;

// Cross-cutting concerns
pub mod config;
pub mod error;

// Re-export main types for convenience
pub use application::{
    ChangeWatcher, ExchangeStarted, ExchangeStatus, Subscription, SubscriptionRegistry, TaskKind,
    TaskRegistry, TrackedPrice, VenueExchange, VenueStatus, VenueSubscription, WatchStatus,
    WatchedVenue,
};
pub use application::exchange::InMemoryExchange;
pub use config::{ConfigError, ExchangeConfig, ProductConfig, RebalanceMode, VenueConfig};
pub use error::{ExchangeError, Result};
pub use infrastructure::BroadcastNotificationChannel;
