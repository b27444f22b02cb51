use bourse_clock::SystemClock;
use bourse_core::{Price, PriceEvent, PriceHistoryEntry, Product, ProductId, VenueId};
use bourse_ports::{CatalogStore, Clock, NotificationChannel};
use bourse_pricing::{PriceEngine, PriceUpdate};
use bourse_store::InMemoryCatalogStore;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::application::subscriptions::SubscriptionRegistry;
use crate::application::tasks::{TaskKind, TaskRegistry};
use crate::application::watcher::ChangeWatcher;
use crate::config::{ExchangeConfig, RebalanceMode};
use crate::error::{ExchangeError, Result};
use crate::infrastructure::BroadcastNotificationChannel;

/// Reply to a successful exchange start
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeStarted {
    pub venue_id: VenueId,
    pub product_count: usize,
    pub rebalance_interval: Duration,
}

/// A joined venue topic
#[derive(Debug)]
pub struct VenueSubscription {
    pub venue_id: VenueId,
    pub subscribers: usize,
    /// Products as they were when joining
    pub initial_prices: Vec<Product>,
    /// Price events of the venue from now on
    pub receiver: broadcast::Receiver<PriceEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedVenue {
    pub venue_id: VenueId,
    pub subscribers: usize,
}

/// Service-wide view of running timers and observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeStatus {
    /// Venues with a running rebalancer
    pub running: Vec<VenueId>,
    pub watched: Vec<WatchedVenue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueStatus {
    pub venue_id: VenueId,
    pub exchange_running: bool,
    pub rebalance_interval: Option<Duration>,
    pub watched: bool,
    pub subscribers: usize,
    /// Receivers attached to the venue topic
    pub listeners: usize,
    pub product_count: usize,
    /// Products with a non-zero order count
    pub tracked_orders: usize,
}

/// Stored price of a product next to the watcher's last tracked value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedPrice {
    pub product_id: ProductId,
    pub product_name: String,
    pub current_price: Price,
    pub previous_price: Option<Price>,
    pub last_tracked_price: Option<Price>,
}

/// Venue price exchange
///
/// Entry point for purchases, administrative triggers and observers. Owns
/// the price engine, the change watcher, the subscription registry and the
/// registry of recurring tasks; nothing is global.
pub struct VenueExchange<S, C>
where
    S: CatalogStore + 'static,
    C: Clock + 'static,
{
    config: ExchangeConfig,
    store: Arc<S>,
    engine: Arc<PriceEngine<S, C>>,
    watcher: Arc<ChangeWatcher<S, BroadcastNotificationChannel, C>>,
    channel: Arc<BroadcastNotificationChannel>,
    subscriptions: SubscriptionRegistry<S, BroadcastNotificationChannel, C>,
    tasks: Arc<TaskRegistry>,
}

/// Exchange over the in-memory catalog and wall-clock time
pub type InMemoryExchange = VenueExchange<InMemoryCatalogStore, SystemClock>;

impl InMemoryExchange {
    /// Create an exchange over an in-memory catalog seeded from `config.venues`
    pub fn from_config(config: ExchangeConfig) -> Result<Self> {
        let store = InMemoryCatalogStore::new();
        for venue in &config.venues {
            for product in venue.to_products() {
                store.add_product(product);
            }
            info!("Seeded venue {} ({}) with {} product(s)", venue.name, venue.id, venue.products.len());
        }
        Self::new(Arc::new(store), Arc::new(SystemClock), config)
    }
}

impl<S, C> VenueExchange<S, C>
where
    S: CatalogStore + 'static,
    C: Clock + 'static,
{
    /// Create a new exchange instance
    pub fn new(store: Arc<S>, clock: Arc<C>, config: ExchangeConfig) -> Result<Self> {
        config.validate()?;

        // Pricing
        let engine = Arc::new(PriceEngine::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.pricing.clone(),
        )?);

        // Change broadcast
        let channel = Arc::new(BroadcastNotificationChannel::new(config.channel_capacity));
        let watcher = Arc::new(ChangeWatcher::new(
            Arc::clone(&store),
            Arc::clone(&channel),
            clock,
        ));

        // Timers and observers
        let tasks = Arc::new(TaskRegistry::new());
        let subscriptions = SubscriptionRegistry::new(
            Arc::clone(&store),
            Arc::clone(&watcher),
            Arc::clone(&tasks),
            config.poll_interval(),
        );

        info!(
            "{} ready: poll every {:?}, rebalance every {:?} ({:?})",
            config.name,
            config.poll_interval(),
            config.rebalance_interval(),
            config.rebalance_mode
        );

        Ok(Self {
            config,
            store,
            engine,
            watcher,
            channel,
            subscriptions,
            tasks,
        })
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn engine(&self) -> &Arc<PriceEngine<S, C>> {
        &self.engine
    }

    /// Start the venue's recurring rebalance
    ///
    /// Uses the configured default when `interval` is `None`. Restarting a
    /// running venue replaces its timer.
    pub async fn start_exchange(
        &self,
        venue_id: VenueId,
        interval: Option<Duration>,
    ) -> Result<ExchangeStarted> {
        let interval = interval.unwrap_or_else(|| self.config.rebalance_interval());
        if interval.is_zero() {
            return Err(ExchangeError::InvalidInterval(
                "rebalance interval must be positive".to_string(),
            ));
        }

        let products = self.store.find_products_by_venue(venue_id).await?;
        if products.is_empty() {
            return Err(ExchangeError::NoProducts(venue_id));
        }

        let engine = Arc::clone(&self.engine);
        match self.config.rebalance_mode {
            RebalanceMode::Decay => {
                self.tasks
                    .start(TaskKind::Rebalance, venue_id, interval, move || {
                        let engine = Arc::clone(&engine);
                        async move {
                            engine.rebalance(venue_id).await;
                        }
                    });
            }
            RebalanceMode::Reprice => {
                self.tasks
                    .start(TaskKind::Rebalance, venue_id, interval, move || {
                        let engine = Arc::clone(&engine);
                        async move {
                            if let Err(e) = engine.rebalance_and_reprice(venue_id).await {
                                warn!("Rebalance reprice failed for venue {}: {}", venue_id, e);
                            }
                        }
                    });
            }
        }

        info!(
            "Exchange started for venue {} with {} product(s)",
            venue_id,
            products.len()
        );
        Ok(ExchangeStarted {
            venue_id,
            product_count: products.len(),
            rebalance_interval: interval,
        })
    }

    /// Stop the venue's recurring rebalance; false when it was not running
    pub fn stop_exchange(&self, venue_id: VenueId) -> bool {
        self.tasks.cancel(TaskKind::Rebalance, venue_id)
    }

    /// Forget the venue's order counts and momentum
    pub async fn reset_prices(&self, venue_id: VenueId) {
        self.engine.reset(venue_id).await;
    }

    /// Account for a completed purchase and reprice the venue
    pub async fn record_order(
        &self,
        venue_id: VenueId,
        product_ids: &[ProductId],
    ) -> Result<Vec<PriceUpdate>> {
        Ok(self.engine.record_order(venue_id, product_ids).await?)
    }

    /// Join a venue topic
    pub async fn subscribe(&self, venue_id: VenueId) -> Result<VenueSubscription> {
        // Receive before registering so the first poll cannot be missed
        let receiver = self.channel.subscribe_venue(venue_id);
        let joined = self.subscriptions.subscribe(venue_id).await?;
        Ok(VenueSubscription {
            venue_id,
            subscribers: joined.subscribers,
            initial_prices: joined.products,
            receiver,
        })
    }

    /// Leave a venue topic, returning how many observers remain
    pub async fn unsubscribe(&self, venue_id: VenueId) -> usize {
        self.subscriptions.unsubscribe(venue_id).await
    }

    pub async fn status(&self) -> ExchangeStatus {
        let mut running = self.tasks.active(TaskKind::Rebalance);
        running.sort();
        let mut watched: Vec<WatchedVenue> = self
            .subscriptions
            .subscribed_venues()
            .await
            .into_iter()
            .map(|(venue_id, subscribers)| WatchedVenue {
                venue_id,
                subscribers,
            })
            .collect();
        watched.sort_by_key(|w| w.venue_id);
        ExchangeStatus { running, watched }
    }

    pub async fn venue_status(&self, venue_id: VenueId) -> Result<VenueStatus> {
        let products = self.store.find_products_by_venue(venue_id).await?;
        Ok(VenueStatus {
            venue_id,
            exchange_running: self.tasks.is_active(TaskKind::Rebalance, venue_id),
            rebalance_interval: self.tasks.period(TaskKind::Rebalance, venue_id),
            watched: self.watcher.is_watched(venue_id).await,
            subscribers: self.subscriptions.subscriber_count(venue_id).await,
            listeners: self.channel.subscriber_count(venue_id),
            product_count: products.len(),
            tracked_orders: self.engine.order_counts(venue_id).await.len(),
        })
    }

    /// Stored prices of a venue with the watcher's last tracked values
    pub async fn price_snapshot(&self, venue_id: VenueId) -> Result<Vec<TrackedPrice>> {
        let products = self.store.find_products_by_venue(venue_id).await?;
        let tracked = self.watcher.snapshot(venue_id).await;
        Ok(products
            .into_iter()
            .map(|p| TrackedPrice {
                last_tracked_price: tracked.get(&p.id).copied(),
                product_id: p.id,
                product_name: p.name,
                current_price: p.current_price,
                previous_price: p.previous_price,
            })
            .collect())
    }

    /// Recorded price changes of a product, oldest first
    pub async fn price_history(&self, product_id: ProductId) -> Result<Vec<PriceHistoryEntry>> {
        Ok(self.store.find_history(product_id).await?)
    }

    /// Reset the watcher's snapshot to stored prices without emitting events
    pub async fn sync_prices(&self, venue_id: VenueId) -> Result<usize> {
        self.watcher.sync_prices(venue_id).await
    }

    /// Stop every timer, discard all watch state and close every topic
    pub async fn shutdown(&self) {
        self.subscriptions.clear().await;
        let stopped = self.tasks.cancel_all();
        let closed = self.channel.close();
        info!(
            "{} shut down: {} task(s) stopped, {} topic(s) closed",
            self.config.name, stopped, closed
        );
    }
}
