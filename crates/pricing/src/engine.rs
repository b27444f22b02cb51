use bourse_core::{PriceChangeReason, PriceHistoryEntry, Product, ProductId, VenueId};
use bourse_ports::{CatalogStore, Clock};
use dashmap::DashMap;
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::PricingConfig;
use crate::demand::{DecayOutcome, VenueDemand};
use crate::error::Result;
use crate::model::{PricingModel, QuoteInput};

/// A persisted price change
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdate {
    /// Product as saved, with its new current price
    pub product: Product,
    pub history: PriceHistoryEntry,
}

/// Result of decaying one venue's order counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceOutcome {
    pub venue_id: VenueId,
    pub tracked: usize,
    pub removed: usize,
}

/// Demand-driven price engine
///
/// Owns the transient demand state of every venue. Each venue's state sits
/// behind its own async mutex, held for a whole recompute including store
/// calls, so two purchases at one venue never interleave while purchases
/// at different venues run in parallel.
pub struct PriceEngine<S, C>
where
    S: CatalogStore,
    C: Clock,
{
    store: Arc<S>,
    clock: Arc<C>,
    model: PricingModel,
    venues: DashMap<VenueId, Arc<Mutex<VenueDemand>>>,
}

impl<S, C> PriceEngine<S, C>
where
    S: CatalogStore,
    C: Clock,
{
    /// Create an engine, rejecting an invalid configuration
    pub fn new(store: Arc<S>, clock: Arc<C>, config: PricingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            clock,
            model: PricingModel::new(config),
            venues: DashMap::new(),
        })
    }

    pub fn config(&self) -> &PricingConfig {
        self.model.config()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn venue(&self, venue_id: VenueId) -> Arc<Mutex<VenueDemand>> {
        self.venues.entry(venue_id).or_default().clone()
    }

    /// Account for one completed purchase and reprice the venue
    ///
    /// Ids repeated within one call count once. Returns only the changes
    /// that were persisted.
    pub async fn record_order(
        &self,
        venue_id: VenueId,
        product_ids: &[ProductId],
    ) -> Result<Vec<PriceUpdate>> {
        let mut seen = HashSet::new();
        let ordered: Vec<ProductId> = product_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let state = self.venue(venue_id);
        let mut demand = state.lock().await;

        for product_id in &ordered {
            demand.record(*product_id);
        }

        let products = self.store.find_products_by_venue(venue_id).await?;
        for product_id in &ordered {
            if !products.iter().any(|p| p.id == *product_id) {
                debug!("Order for product {} which venue {} does not list", product_id, venue_id);
            }
        }

        let updates = self
            .reprice(&mut demand, products, |product| {
                if seen.contains(&product.id) {
                    PriceChangeReason::OrderReceived
                } else {
                    PriceChangeReason::MarketAdjustment
                }
            })
            .await;

        debug!(
            "Order at venue {} for {} product(s) changed {} price(s)",
            venue_id,
            ordered.len(),
            updates.len()
        );
        Ok(updates)
    }

    /// Decay every order count of a venue
    ///
    /// Leaves momentum and prices untouched.
    pub async fn rebalance(&self, venue_id: VenueId) -> RebalanceOutcome {
        let state = self.venue(venue_id);
        let mut demand = state.lock().await;
        let outcome = demand.decay(self.config().decay_factor);
        self.log_decay(venue_id, outcome);
        RebalanceOutcome {
            venue_id,
            tracked: outcome.tracked,
            removed: outcome.removed,
        }
    }

    /// Decay a venue's order counts, then reprice all of its products
    ///
    /// Changes are recorded as `demand_decay`.
    pub async fn rebalance_and_reprice(&self, venue_id: VenueId) -> Result<Vec<PriceUpdate>> {
        let state = self.venue(venue_id);
        let mut demand = state.lock().await;
        let outcome = demand.decay(self.config().decay_factor);
        self.log_decay(venue_id, outcome);

        let products = self.store.find_products_by_venue(venue_id).await?;
        let updates = self
            .reprice(&mut demand, products, |_| PriceChangeReason::DemandDecay)
            .await;
        if !updates.is_empty() {
            info!("Repriced {} product(s) at venue {} after decay", updates.len(), venue_id);
        }
        Ok(updates)
    }

    /// Forget all order counts and momentum of a venue
    pub async fn reset(&self, venue_id: VenueId) {
        let state = self.venue(venue_id);
        state.lock().await.reset();
        info!("Demand state reset for venue {}", venue_id);
    }

    /// Snapshot of a venue's order counts
    pub async fn order_counts(&self, venue_id: VenueId) -> HashMap<ProductId, u64> {
        let Some(state) = self.venues.get(&venue_id).map(|s| s.value().clone()) else {
            return HashMap::new();
        };
        let demand = state.lock().await;
        demand.order_counts().clone()
    }

    pub async fn momentum(&self, venue_id: VenueId, product_id: ProductId) -> Option<Decimal> {
        let state = self.venues.get(&venue_id).map(|s| s.value().clone())?;
        let demand = state.lock().await;
        demand.momentum(product_id)
    }

    fn log_decay(&self, venue_id: VenueId, outcome: DecayOutcome) {
        debug!(
            "Decayed {} counter(s) at venue {}, {} dropped",
            outcome.tracked, venue_id, outcome.removed
        );
    }

    async fn reprice<F>(
        &self,
        demand: &mut VenueDemand,
        products: Vec<Product>,
        reason_for: F,
    ) -> Vec<PriceUpdate>
    where
        F: Fn(&Product) -> PriceChangeReason,
    {
        let config = self.model.config();
        let leader = products
            .iter()
            .map(|p| demand.order_count(p.id))
            .max()
            .unwrap_or(0)
            .max(1);

        let mut updates = Vec::new();
        for mut product in products {
            let band = product.price_band_with(config.min_multiplier, config.max_multiplier);
            let order_count = demand.order_count(product.id);
            let input = QuoteInput {
                band,
                current_price: product.current_price,
                momentum: demand.momentum(product.id),
                order_count,
                ratio: Decimal::from(order_count) / Decimal::from(leader),
            };

            let Some(quote) = self.model.quote(input) else {
                warn!(
                    "Skipping product {} ({}): unusable price band {}..{}",
                    product.id, product.name, band.min, band.max
                );
                continue;
            };
            let old_price = product.current_price;
            if (quote.price - old_price).abs() <= config.change_epsilon {
                demand.set_momentum(product.id, quote.momentum);
                continue;
            }

            assert!(
                band.contains(quote.price),
                "price {} of product {} escaped its band {}..{}",
                quote.price,
                product.id,
                band.min,
                band.max
            );

            product.apply_price(quote.price);
            if let Err(e) = self.store.save_product(&product).await {
                warn!("Failed to save new price for product {}: {}", product.id, e);
                continue;
            }
            // Momentum only follows prices that were stored
            demand.set_momentum(product.id, quote.momentum);

            let history = PriceHistoryEntry::new(
                product.id,
                old_price,
                quote.price,
                reason_for(&product),
                self.clock.now(),
            );
            if let Err(e) = self.store.append_history(&history).await {
                error!("Price of product {} changed but history was not recorded: {}", product.id, e);
            }

            debug!(
                "{} {} -> {} ({}%, {})",
                product.name, old_price, quote.price, history.change_percentage, history.reason
            );
            updates.push(PriceUpdate { product, history });
        }
        updates
    }
}
