use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Price value - uses Decimal for precision
pub type Price = Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Identifier of a venue (a place whose catalog is priced on its own)
pub type VenueId = Uuid;

/// Identifier of a product within a venue catalog
pub type ProductId = Uuid;

/// Identifier of a price history record
pub type HistoryId = Uuid;
