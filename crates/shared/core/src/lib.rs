//! Bourse Core Domain
//!
//! Pure domain types for demand-driven venue pricing.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod events;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{PriceBand, PriceChangeReason, PriceHistoryEntry, Product, change_percentage};
pub use events::{BulkPriceUpdate, PriceChange, PriceEvent};
pub use values::{HistoryId, Price, ProductId, Timestamp, VenueId};
