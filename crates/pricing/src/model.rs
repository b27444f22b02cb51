//! Demand-to-price curve
//!
//! Pure functions only: given a product's band, current price, momentum and
//! relative popularity, produce the next momentum and the next price.

use bourse_core::{Price, PriceBand};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::{BandConfig, PricingConfig, StepProfile};

/// Popularity bucket of a product relative to its venue's leader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Popularity {
    /// Not ordered since the last decay
    Zero,
    VeryLow,
    Low,
    Medium,
    High,
}

/// Inputs of one reprice
#[derive(Debug, Clone, Copy)]
pub struct QuoteInput {
    pub band: PriceBand,
    pub current_price: Price,
    /// Previous momentum; `None` starts from the current band position
    pub momentum: Option<Decimal>,
    pub order_count: u64,
    /// `order_count / max(leader count, 1)`
    pub ratio: Decimal,
}

/// Outcome of one reprice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub popularity: Popularity,
    pub target: Decimal,
    pub momentum: Decimal,
    /// Capped, rounded and clamped price
    pub price: Price,
}

/// Stateless pricing curve built from a [`PricingConfig`]
#[derive(Debug, Clone)]
pub struct PricingModel {
    config: PricingConfig,
}

impl PricingModel {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Bucket a product by its count and ratio
    pub fn classify(&self, order_count: u64, ratio: Decimal) -> Popularity {
        if order_count == 0 {
            return Popularity::Zero;
        }
        let c = &self.config;
        if ratio < c.very_low.upper_ratio {
            Popularity::VeryLow
        } else if ratio < c.low.upper_ratio {
            Popularity::Low
        } else if ratio < c.medium.upper_ratio {
            Popularity::Medium
        } else {
            Popularity::High
        }
    }

    fn band(&self, popularity: Popularity) -> Option<(Decimal, &BandConfig)> {
        let c = &self.config;
        match popularity {
            Popularity::Zero => None,
            Popularity::VeryLow => Some((Decimal::ZERO, &c.very_low)),
            Popularity::Low => Some((c.very_low.upper_ratio, &c.low)),
            Popularity::Medium => Some((c.low.upper_ratio, &c.medium)),
            Popularity::High => Some((c.medium.upper_ratio, &c.high)),
        }
    }

    pub fn step_profile(&self, popularity: Popularity) -> StepProfile {
        match self.band(popularity) {
            Some((_, band)) => band.step,
            None => self.config.zero_orders.step,
        }
    }

    /// Target band position for a popularity ratio
    ///
    /// `position` is the product's current normalized position and only
    /// matters for products with zero orders.
    pub fn target_position(&self, popularity: Popularity, ratio: Decimal, position: Decimal) -> Decimal {
        let Some((lower, band)) = self.band(popularity) else {
            return position * self.config.zero_orders.retention;
        };
        let span = band.upper_ratio - lower;
        let progress = if span > Decimal::ZERO {
            ((ratio - lower) / span).max(Decimal::ZERO).min(Decimal::ONE)
        } else {
            Decimal::ONE
        };
        band.target_low + progress * (band.target_high - band.target_low)
    }

    /// Compute the next momentum and price for one product
    ///
    /// Returns `None` when the band is inverted or too narrow to hold a
    /// rounded price.
    pub fn quote(&self, input: QuoteInput) -> Option<Quote> {
        let scale = self.config.price_scale;
        let bounds = input.band.rounded_inward(scale);
        if !input.band.is_valid() || !bounds.is_valid() {
            return None;
        }

        let current = input.current_price;
        let position = input.band.position(current);
        let momentum = input.momentum.unwrap_or(position);

        let popularity = self.classify(input.order_count, input.ratio);
        let target = self.target_position(popularity, input.ratio, position);
        let profile = self.step_profile(popularity);

        let speed = profile.speed(target > momentum);
        let momentum = (momentum + speed * (target - momentum))
            .max(Decimal::ZERO)
            .min(Decimal::ONE);

        let raw = input.band.price_at(momentum);
        let delta = raw - current;
        let rising = delta > Decimal::ZERO;
        let limit = (current * profile.cap(rising)).abs();
        let capped = if rising {
            current + delta.min(limit)
        } else {
            current + delta.max(-limit)
        };

        // Round toward the current price so rounding never widens a step.
        let strategy = if rising {
            RoundingStrategy::ToNegativeInfinity
        } else {
            RoundingStrategy::ToPositiveInfinity
        };
        let price = bounds.clamp(capped.round_dp_with_strategy(scale, strategy));

        Some(Quote {
            popularity,
            target,
            momentum,
            price,
        })
    }
}

impl Default for PricingModel {
    fn default() -> Self {
        Self::new(PricingConfig::default())
    }
}
