mod price_history;
mod product;

pub use price_history::{PriceChangeReason, PriceHistoryEntry, change_percentage};
pub use product::{PriceBand, Product};
