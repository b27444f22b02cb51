//! Pricing parameters
//!
//! Every constant of the pricing curve lives here so venues can be tuned
//! without touching the engine. The defaults are one valid parameterization.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// How fast momentum moves and how far one recompute may move a price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepProfile {
    /// Smoothing speed when the target is above the current momentum
    pub rise_speed: Decimal,
    /// Smoothing speed when the target is below the current momentum
    pub fall_speed: Decimal,
    /// Largest rise per recompute, as a fraction of the current price
    pub rise_cap: Decimal,
    /// Largest fall per recompute, as a fraction of the current price
    pub fall_cap: Decimal,
}

impl StepProfile {
    pub fn new(rise_speed: Decimal, fall_speed: Decimal, rise_cap: Decimal, fall_cap: Decimal) -> Self {
        Self {
            rise_speed,
            fall_speed,
            rise_cap,
            fall_cap,
        }
    }

    pub fn speed(&self, rising: bool) -> Decimal {
        if rising { self.rise_speed } else { self.fall_speed }
    }

    pub fn cap(&self, rising: bool) -> Decimal {
        if rising { self.rise_cap } else { self.fall_cap }
    }

    fn validate(&self, name: &str) -> Result<()> {
        for (label, speed) in [("rise_speed", self.rise_speed), ("fall_speed", self.fall_speed)] {
            if speed <= Decimal::ZERO || speed > Decimal::ONE {
                return Err(EngineError::InvalidConfig(format!(
                    "{name}.{label} must be in (0, 1], got {speed}"
                )));
            }
        }
        for (label, cap) in [("rise_cap", self.rise_cap), ("fall_cap", self.fall_cap)] {
            if cap < Decimal::ZERO || cap >= Decimal::ONE {
                return Err(EngineError::InvalidConfig(format!(
                    "{name}.{label} must be in [0, 1), got {cap}"
                )));
            }
        }
        Ok(())
    }
}

/// One popularity band of the target curve
///
/// A band covers ratios from the previous band's `upper_ratio` (0 for the
/// first) up to its own, and maps them linearly onto
/// `[target_low, target_high]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandConfig {
    pub upper_ratio: Decimal,
    pub target_low: Decimal,
    pub target_high: Decimal,
    pub step: StepProfile,
}

/// Behaviour of products nobody ordered since the last decay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZeroOrderConfig {
    /// Target is this fraction of the product's current band position
    pub retention: Decimal,
    pub step: StepProfile,
}

/// Tunable constants of the demand-driven price engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Band minimum as a multiple of the regular price, when not set
    pub min_multiplier: Decimal,
    /// Band maximum as a multiple of the regular price, when not set
    pub max_multiplier: Decimal,
    /// Multiplier applied to every order count on rebalance
    pub decay_factor: Decimal,
    /// Changes of this size or smaller are not persisted
    pub change_epsilon: Decimal,
    /// Decimal places prices are rounded to
    pub price_scale: u32,
    pub zero_orders: ZeroOrderConfig,
    pub very_low: BandConfig,
    pub low: BandConfig,
    pub medium: BandConfig,
    pub high: BandConfig,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            min_multiplier: dec!(0.7),
            max_multiplier: dec!(1.5),
            decay_factor: dec!(0.65),
            change_epsilon: dec!(0.01),
            price_scale: 2,
            zero_orders: ZeroOrderConfig {
                retention: dec!(0.80),
                step: StepProfile::new(dec!(0.10), dec!(0.50), dec!(0.00), dec!(0.10)),
            },
            very_low: BandConfig {
                upper_ratio: dec!(0.25),
                target_low: dec!(0.10),
                target_high: dec!(0.30),
                step: StepProfile::new(dec!(0.10), dec!(0.45), dec!(0.02), dec!(0.08)),
            },
            low: BandConfig {
                upper_ratio: dec!(0.50),
                target_low: dec!(0.30),
                target_high: dec!(0.50),
                step: StepProfile::new(dec!(0.15), dec!(0.35), dec!(0.03), dec!(0.07)),
            },
            medium: BandConfig {
                upper_ratio: dec!(0.75),
                target_low: dec!(0.50),
                target_high: dec!(0.75),
                step: StepProfile::new(dec!(0.30), dec!(0.25), dec!(0.04), dec!(0.06)),
            },
            high: BandConfig {
                upper_ratio: dec!(1.00),
                target_low: dec!(0.75),
                target_high: dec!(1.00),
                step: StepProfile::new(dec!(0.40), dec!(0.20), dec!(0.05), dec!(0.06)),
            },
        }
    }
}

impl PricingConfig {
    /// Bands in ascending ratio order
    pub fn bands(&self) -> [&BandConfig; 4] {
        [&self.very_low, &self.low, &self.medium, &self.high]
    }

    /// Reject parameterizations that would break monotonicity or the band invariant
    pub fn validate(&self) -> Result<()> {
        if self.min_multiplier <= Decimal::ZERO || self.min_multiplier > self.max_multiplier {
            return Err(EngineError::InvalidConfig(format!(
                "band multipliers must satisfy 0 < min <= max, got {} and {}",
                self.min_multiplier, self.max_multiplier
            )));
        }
        if self.decay_factor < Decimal::ZERO || self.decay_factor >= Decimal::ONE {
            return Err(EngineError::InvalidConfig(format!(
                "decay_factor must be in [0, 1), got {}",
                self.decay_factor
            )));
        }
        if self.change_epsilon < Decimal::ZERO {
            return Err(EngineError::InvalidConfig(
                "change_epsilon must not be negative".to_string(),
            ));
        }
        if self.zero_orders.retention < Decimal::ZERO || self.zero_orders.retention > Decimal::ONE {
            return Err(EngineError::InvalidConfig(format!(
                "zero_orders.retention must be in [0, 1], got {}",
                self.zero_orders.retention
            )));
        }
        self.zero_orders.step.validate("zero_orders")?;

        let names = ["very_low", "low", "medium", "high"];
        let mut lower_ratio = Decimal::ZERO;
        let mut previous_high = Decimal::ZERO;
        for (name, band) in names.iter().zip(self.bands()) {
            if band.upper_ratio <= lower_ratio || band.upper_ratio > Decimal::ONE {
                return Err(EngineError::InvalidConfig(format!(
                    "{name}.upper_ratio must be above {lower_ratio} and at most 1, got {}",
                    band.upper_ratio
                )));
            }
            if band.target_low < previous_high
                || band.target_low > band.target_high
                || band.target_high > Decimal::ONE
            {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} targets must be ascending within [0, 1], got {}..{}",
                    band.target_low, band.target_high
                )));
            }
            band.step.validate(name)?;
            lower_ratio = band.upper_ratio;
            previous_high = band.target_high;
        }
        if self.high.upper_ratio != Decimal::ONE {
            return Err(EngineError::InvalidConfig(
                "high.upper_ratio must be 1".to_string(),
            ));
        }
        Ok(())
    }
}
