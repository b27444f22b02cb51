use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::{Product, change_percentage};
use crate::values::{Price, ProductId, Timestamp, VenueId};

/// Events published on a venue topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum PriceEvent {
    /// One product's price moved
    #[serde(rename = "price-update")]
    PriceUpdate(PriceChange),
    /// Every change detected in one poll of a venue
    #[serde(rename = "bulk-price-update")]
    BulkPriceUpdate(BulkPriceUpdate),
}

impl PriceEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            PriceEvent::PriceUpdate(_) => "price-update",
            PriceEvent::BulkPriceUpdate(_) => "bulk-price-update",
        }
    }
}

/// A detected change of one product's price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceChange {
    pub product_id: ProductId,
    pub product_name: String,
    pub old_price: Price,
    pub new_price: Price,
    pub change_percentage: Decimal,
    pub updated_at: Timestamp,
}

impl PriceChange {
    /// Change from `old_price` to the product's current price
    pub fn observed(product: &Product, old_price: Price, updated_at: Timestamp) -> Self {
        Self {
            product_id: product.id,
            product_name: product.name.clone(),
            old_price,
            new_price: product.current_price,
            change_percentage: change_percentage(old_price, product.current_price),
            updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkPriceUpdate {
    pub venue_id: VenueId,
    pub updates: Vec<PriceChange>,
    pub timestamp: Timestamp,
}
