use bourse_core::{BulkPriceUpdate, Price, PriceChange, PriceEvent, Product, ProductId, VenueId};
use bourse_ports::{CatalogStore, Clock, NotificationChannel};
use dashmap::DashMap;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::Result;

/// Whether a venue's prices are being watched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WatchStatus {
    #[default]
    Unwatched,
    Watched,
}

/// Watch state of one venue
#[derive(Debug, Default)]
struct VenueWatch {
    status: WatchStatus,
    /// Last price broadcast (or first seen) per product
    last_prices: HashMap<ProductId, Price>,
}

impl VenueWatch {
    fn clear(&mut self) {
        self.status = WatchStatus::Unwatched;
        self.last_prices.clear();
    }
}

/// Polls watched venues and broadcasts price changes
///
/// Prices changed between two polls are only seen at the next poll, and a
/// product that moved twice in between is reported once.
pub struct ChangeWatcher<S, N, C>
where
    S: CatalogStore,
    N: NotificationChannel,
    C: Clock,
{
    store: Arc<S>,
    channel: Arc<N>,
    clock: Arc<C>,
    venues: DashMap<VenueId, Arc<Mutex<VenueWatch>>>,
}

impl<S, N, C> ChangeWatcher<S, N, C>
where
    S: CatalogStore,
    N: NotificationChannel,
    C: Clock,
{
    pub fn new(store: Arc<S>, channel: Arc<N>, clock: Arc<C>) -> Self {
        Self {
            store,
            channel,
            clock,
            venues: DashMap::new(),
        }
    }

    fn venue(&self, venue_id: VenueId) -> Arc<Mutex<VenueWatch>> {
        self.venues.entry(venue_id).or_default().clone()
    }

    fn existing(&self, venue_id: VenueId) -> Option<Arc<Mutex<VenueWatch>>> {
        self.venues.get(&venue_id).map(|w| w.value().clone())
    }

    /// Mark a venue watched, snapshotting `products` without emitting events
    pub async fn begin_watch(&self, venue_id: VenueId, products: &[Product]) {
        let state = self.venue(venue_id);
        let mut watch = state.lock().await;
        watch.status = WatchStatus::Watched;
        watch.last_prices = products.iter().map(|p| (p.id, p.current_price)).collect();
        info!(
            "Watching venue {} with {} tracked price(s)",
            venue_id,
            watch.last_prices.len()
        );
    }

    /// Mark a venue unwatched and discard its snapshot
    pub async fn end_watch(&self, venue_id: VenueId) {
        if let Some(state) = self.existing(venue_id) {
            state.lock().await.clear();
            info!("Stopped watching venue {}", venue_id);
        }
    }

    /// Diff a venue's stored prices against its snapshot and publish changes
    ///
    /// Per-product `price-update` events go out first, in catalog order,
    /// followed by one `bulk-price-update`. Does nothing for an unwatched
    /// venue. Publish failures are logged and do not fail the poll.
    pub async fn poll_once(&self, venue_id: VenueId) -> Result<Vec<PriceChange>> {
        let Some(state) = self.existing(venue_id) else {
            return Ok(Vec::new());
        };
        let mut watch = state.lock().await;
        if watch.status != WatchStatus::Watched {
            return Ok(Vec::new());
        }

        let products = self.store.find_products_by_venue(venue_id).await?;
        let now = self.clock.now();

        let mut changes = Vec::new();
        for product in &products {
            match watch.last_prices.insert(product.id, product.current_price) {
                Some(old_price) if old_price != product.current_price => {
                    changes.push(PriceChange::observed(product, old_price, now));
                }
                Some(_) => {}
                None => debug!("Tracking new product {} at venue {}", product.id, venue_id),
            }
        }

        if changes.is_empty() {
            return Ok(changes);
        }

        for change in &changes {
            if let Err(e) = self
                .channel
                .publish(venue_id, PriceEvent::PriceUpdate(change.clone()))
                .await
            {
                warn!("Failed to publish price update for {}: {}", change.product_id, e);
            }
        }
        let bulk = PriceEvent::BulkPriceUpdate(BulkPriceUpdate {
            venue_id,
            updates: changes.clone(),
            timestamp: now,
        });
        if let Err(e) = self.channel.publish(venue_id, bulk).await {
            warn!("Failed to publish bulk update for venue {}: {}", venue_id, e);
        }

        info!("Venue {}: {} price change(s) broadcast", venue_id, changes.len());
        Ok(changes)
    }

    /// Overwrite a watched venue's snapshot with stored prices, silently
    ///
    /// Returns the number of tracked prices; an unwatched venue is left
    /// alone and yields 0.
    pub async fn sync_prices(&self, venue_id: VenueId) -> Result<usize> {
        let Some(state) = self.existing(venue_id) else {
            return Ok(0);
        };
        let mut watch = state.lock().await;
        if watch.status != WatchStatus::Watched {
            debug!("Venue {} is not watched, nothing to sync", venue_id);
            return Ok(0);
        }
        let products = self.store.find_products_by_venue(venue_id).await?;
        watch.last_prices = products.iter().map(|p| (p.id, p.current_price)).collect();
        info!("Synced {} tracked price(s) for venue {}", watch.last_prices.len(), venue_id);
        Ok(watch.last_prices.len())
    }

    /// Last tracked prices of a venue
    pub async fn snapshot(&self, venue_id: VenueId) -> HashMap<ProductId, Price> {
        let Some(state) = self.existing(venue_id) else {
            return HashMap::new();
        };
        let watch = state.lock().await;
        watch.last_prices.clone()
    }

    pub async fn status(&self, venue_id: VenueId) -> WatchStatus {
        let Some(state) = self.existing(venue_id) else {
            return WatchStatus::Unwatched;
        };
        let watch = state.lock().await;
        watch.status
    }

    pub async fn is_watched(&self, venue_id: VenueId) -> bool {
        self.status(venue_id).await == WatchStatus::Watched
    }

    /// Venues currently watched
    pub async fn watched_venues(&self) -> Vec<VenueId> {
        let states: Vec<_> = self
            .venues
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        let mut watched = Vec::new();
        for (venue_id, state) in states {
            if state.lock().await.status == WatchStatus::Watched {
                watched.push(venue_id);
            }
        }
        watched
    }

    /// Discard every venue's watch state
    pub async fn clear_all(&self) {
        let states: Vec<_> = self.venues.iter().map(|e| e.value().clone()).collect();
        for state in states {
            state.lock().await.clear();
        }
    }
}
