use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::values::{HistoryId, Price, ProductId, Timestamp};

/// Why a price moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceChangeReason {
    /// The product was part of the purchase that triggered the reprice
    OrderReceived,
    /// The product moved because of demand elsewhere in the venue
    MarketAdjustment,
    /// The product moved after its demand was decayed
    DemandDecay,
}

impl PriceChangeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceChangeReason::OrderReceived => "order_received",
            PriceChangeReason::MarketAdjustment => "market_adjustment",
            PriceChangeReason::DemandDecay => "demand_decay",
        }
    }
}

impl fmt::Display for PriceChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of a realized price change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistoryEntry {
    pub id: HistoryId,
    pub product_id: ProductId,
    pub old_price: Price,
    pub new_price: Price,
    /// Percentage change, rounded to 2 decimal places
    pub change_percentage: Decimal,
    pub reason: PriceChangeReason,
    pub created_at: Timestamp,
}

impl PriceHistoryEntry {
    pub fn new(
        product_id: ProductId,
        old_price: Price,
        new_price: Price,
        reason: PriceChangeReason,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            old_price,
            new_price,
            change_percentage: change_percentage(old_price, new_price),
            reason,
            created_at,
        }
    }
}

/// `(new - old) / old * 100`, rounded to 2 dp; zero when `old` is not positive
pub fn change_percentage(old_price: Price, new_price: Price) -> Decimal {
    if old_price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((new_price - old_price) / old_price * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
