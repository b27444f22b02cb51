use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::values::{Price, ProductId, VenueId};

/// A product sold at a venue, with its price band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub venue_id: VenueId,
    pub name: String,
    /// Baseline price, never changed by repricing
    pub regular_price: Price,
    pub current_price: Price,
    pub previous_price: Option<Price>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
}

impl Product {
    /// Create a product priced at its regular price with a derived band
    pub fn new(venue_id: VenueId, name: impl Into<String>, regular_price: Price) -> Self {
        Self {
            id: Uuid::new_v4(),
            venue_id,
            name: name.into(),
            regular_price,
            current_price: regular_price,
            previous_price: None,
            min_price: None,
            max_price: None,
        }
    }

    /// Set explicit band bounds
    pub fn with_band(mut self, min_price: Price, max_price: Price) -> Self {
        self.min_price = Some(min_price);
        self.max_price = Some(max_price);
        self
    }

    /// Override the current price (e.g. when loading a catalog)
    pub fn with_current_price(mut self, current_price: Price) -> Self {
        self.current_price = current_price;
        self
    }

    /// Price band using the given multipliers for missing bounds
    pub fn price_band_with(&self, min_multiplier: Decimal, max_multiplier: Decimal) -> PriceBand {
        PriceBand {
            min: self
                .min_price
                .unwrap_or(self.regular_price * min_multiplier),
            max: self
                .max_price
                .unwrap_or(self.regular_price * max_multiplier),
        }
    }

    /// Move to a new price, remembering the one it replaces
    pub fn apply_price(&mut self, new_price: Price) {
        self.previous_price = Some(self.current_price);
        self.current_price = new_price;
    }
}

/// Inclusive `[min, max]` range a product price may move within
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBand {
    pub min: Price,
    pub max: Price,
}

impl PriceBand {
    pub fn new(min: Price, max: Price) -> Self {
        Self { min, max }
    }

    /// A band is usable when it is non-inverted
    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    pub fn width(&self) -> Decimal {
        self.max - self.min
    }

    pub fn contains(&self, price: Price) -> bool {
        price >= self.min && price <= self.max
    }

    pub fn clamp(&self, price: Price) -> Price {
        price.max(self.min).min(self.max)
    }

    /// Normalized position of `price` inside the band, clamped to [0, 1]
    ///
    /// A zero-width band has every price at position 0.
    pub fn position(&self, price: Price) -> Decimal {
        let width = self.width();
        if width <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((price - self.min) / width)
            .max(Decimal::ZERO)
            .min(Decimal::ONE)
    }

    /// Absolute price at a normalized position
    pub fn price_at(&self, position: Decimal) -> Price {
        self.min + position * self.width()
    }

    /// Band with bounds rounded inward to `dp` decimal places
    ///
    /// Rounding a price and clamping it to the inward band can never leave
    /// the unrounded band.
    pub fn rounded_inward(&self, dp: u32) -> PriceBand {
        use rust_decimal::RoundingStrategy;
        PriceBand {
            min: self.min.round_dp_with_strategy(dp, RoundingStrategy::ToPositiveInfinity),
            max: self.max.round_dp_with_strategy(dp, RoundingStrategy::ToNegativeInfinity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn venue() -> VenueId {
        Uuid::new_v4()
    }

    #[test]
    fn test_new_product_starts_at_regular_price() {
        let product = Product::new(venue(), "Lager", dec!(10));
        assert_eq!(product.current_price, dec!(10));
        assert_eq!(product.previous_price, None);
    }

    #[test]
    fn test_band_defaults_from_regular_price() {
        let product = Product::new(venue(), "Lager", dec!(10));
        let band = product.price_band_with(dec!(0.7), dec!(1.5));
        assert_eq!(band.min, dec!(7.0));
        assert_eq!(band.max, dec!(15.0));
    }

    #[test]
    fn test_explicit_band_wins() {
        let product = Product::new(venue(), "Lager", dec!(10)).with_band(dec!(8), dec!(12));
        assert_eq!(
            product.price_band_with(dec!(0.7), dec!(1.5)),
            PriceBand::new(dec!(8), dec!(12))
        );
    }

    #[test]
    fn test_position_is_normalized_and_clamped() {
        let band = PriceBand::new(dec!(7), dec!(15));
        assert_eq!(band.position(dec!(10)), dec!(0.375));
        assert_eq!(band.position(dec!(5)), Decimal::ZERO);
        assert_eq!(band.position(dec!(20)), Decimal::ONE);
        assert_eq!(band.price_at(dec!(0.5)), dec!(11));
    }

    #[test]
    fn test_zero_width_band() {
        let band = PriceBand::new(dec!(9), dec!(9));
        assert_eq!(band.position(dec!(9)), Decimal::ZERO);
        assert_eq!(band.clamp(dec!(12)), dec!(9));
    }

    #[test]
    fn test_rounded_inward_stays_inside() {
        let band = PriceBand::new(dec!(6.993), dec!(14.987));
        let rounded = band.rounded_inward(2);
        assert_eq!(rounded.min, dec!(7.00));
        assert_eq!(rounded.max, dec!(14.98));
        assert!(band.contains(rounded.min));
        assert!(band.contains(rounded.max));
    }

    #[test]
    fn test_apply_price_tracks_previous() {
        let mut product = Product::new(venue(), "Lager", dec!(10));
        product.apply_price(dec!(10.40));
        assert_eq!(product.previous_price, Some(dec!(10)));
        assert_eq!(product.current_price, dec!(10.40));
    }
}
