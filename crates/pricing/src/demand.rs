use bourse_core::ProductId;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;

/// Transient demand state of one venue
///
/// Order counts since the last decay and the smoothed band position of
/// each product. Lost on restart.
#[derive(Debug, Default, Clone)]
pub struct VenueDemand {
    order_counts: HashMap<ProductId, u64>,
    momentum: HashMap<ProductId, Decimal>,
}

/// What a decay pass did to a venue's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecayOutcome {
    /// Counters present before the decay
    pub tracked: usize,
    /// Counters that reached zero and were dropped
    pub removed: usize,
}

impl VenueDemand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one purchase of a product
    pub fn record(&mut self, product_id: ProductId) {
        *self.order_counts.entry(product_id).or_insert(0) += 1;
    }

    pub fn order_count(&self, product_id: ProductId) -> u64 {
        self.order_counts.get(&product_id).copied().unwrap_or(0)
    }

    pub fn order_counts(&self) -> &HashMap<ProductId, u64> {
        &self.order_counts
    }

    pub fn momentum(&self, product_id: ProductId) -> Option<Decimal> {
        self.momentum.get(&product_id).copied()
    }

    pub fn set_momentum(&mut self, product_id: ProductId, momentum: Decimal) {
        self.momentum.insert(product_id, momentum);
    }

    /// Multiply every counter by `factor`, flooring, and drop those at zero
    pub fn decay(&mut self, factor: Decimal) -> DecayOutcome {
        let tracked = self.order_counts.len();
        for count in self.order_counts.values_mut() {
            *count = (Decimal::from(*count) * factor)
                .floor()
                .to_u64()
                .unwrap_or(0)
                .min(*count);
        }
        self.order_counts.retain(|_, count| *count > 0);
        DecayOutcome {
            tracked,
            removed: tracked - self.order_counts.len(),
        }
    }

    /// Forget all counters and momentum
    pub fn reset(&mut self) {
        self.order_counts.clear();
        self.momentum.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.order_counts.is_empty() && self.momentum.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn test_record_increments() {
        let mut demand = VenueDemand::new();
        let id = Uuid::new_v4();
        demand.record(id);
        demand.record(id);
        assert_eq!(demand.order_count(id), 2);
        assert_eq!(demand.order_count(Uuid::new_v4()), 0);
    }

    #[test]
    fn test_decay_floors_and_removes_zeros() {
        let mut demand = VenueDemand::new();
        let busy = Uuid::new_v4();
        let quiet = Uuid::new_v4();
        for _ in 0..10 {
            demand.record(busy);
        }
        demand.record(quiet);

        let outcome = demand.decay(dec!(0.65));

        assert_eq!(demand.order_count(busy), 6);
        assert_eq!(demand.order_count(quiet), 0);
        assert!(!demand.order_counts().contains_key(&quiet));
        assert_eq!(outcome, DecayOutcome { tracked: 2, removed: 1 });
    }

    #[test]
    fn test_decay_never_grows_a_counter() {
        let mut demand = VenueDemand::new();
        let id = Uuid::new_v4();
        for _ in 0..7 {
            demand.record(id);
        }
        let mut previous = demand.order_count(id);
        while previous > 0 {
            demand.decay(dec!(0.65));
            let next = demand.order_count(id);
            assert!(next < previous);
            previous = next;
        }
        assert!(demand.order_counts().is_empty());
    }

    #[test]
    fn test_decay_keeps_momentum() {
        let mut demand = VenueDemand::new();
        let id = Uuid::new_v4();
        demand.record(id);
        demand.set_momentum(id, dec!(0.4));
        demand.decay(dec!(0.65));
        assert_eq!(demand.momentum(id), Some(dec!(0.4)));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut demand = VenueDemand::new();
        let id = Uuid::new_v4();
        demand.record(id);
        demand.set_momentum(id, dec!(0.4));
        demand.reset();
        assert!(demand.is_empty());
    }
}
