use bourse_core::{Product, VenueId};
use bourse_ports::{CatalogStore, Clock, NotificationChannel};
use dashmap::DashMap;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::application::tasks::{TaskKind, TaskRegistry};
use crate::application::watcher::ChangeWatcher;
use crate::error::Result;

/// Outcome of joining a venue topic
#[derive(Debug, Clone)]
pub struct Subscription {
    pub venue_id: VenueId,
    /// Observers of the venue after this join
    pub subscribers: usize,
    /// Current products, delivered to the joining observer only
    pub products: Vec<Product>,
}

/// Tracks observers per venue and drives the watcher's poll timers
///
/// The first observer of a venue snapshots its prices and starts polling;
/// the last one to leave stops polling and discards the snapshot. Joins and
/// leaves of one venue are serialized so a poll timer is never left behind.
pub struct SubscriptionRegistry<S, N, C>
where
    S: CatalogStore + 'static,
    N: NotificationChannel + 'static,
    C: Clock + 'static,
{
    store: Arc<S>,
    watcher: Arc<ChangeWatcher<S, N, C>>,
    tasks: Arc<TaskRegistry>,
    poll_interval: Duration,
    counts: DashMap<VenueId, Arc<Mutex<usize>>>,
}

impl<S, N, C> SubscriptionRegistry<S, N, C>
where
    S: CatalogStore + 'static,
    N: NotificationChannel + 'static,
    C: Clock + 'static,
{
    pub fn new(
        store: Arc<S>,
        watcher: Arc<ChangeWatcher<S, N, C>>,
        tasks: Arc<TaskRegistry>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            watcher,
            tasks,
            poll_interval,
            counts: DashMap::new(),
        }
    }

    fn count(&self, venue_id: VenueId) -> Arc<Mutex<usize>> {
        self.counts.entry(venue_id).or_default().clone()
    }

    /// Add an observer to a venue
    ///
    /// Fails without registering anything when the catalog cannot be read.
    pub async fn subscribe(&self, venue_id: VenueId) -> Result<Subscription> {
        let count = self.count(venue_id);
        let mut subscribers = count.lock().await;

        let products = self.store.find_products_by_venue(venue_id).await?;
        *subscribers += 1;

        if *subscribers == 1 {
            self.watcher.begin_watch(venue_id, &products).await;
            self.start_polling(venue_id);
        }
        debug!("Venue {} now has {} subscriber(s)", venue_id, *subscribers);

        Ok(Subscription {
            venue_id,
            subscribers: *subscribers,
            products,
        })
    }

    /// Remove an observer from a venue, returning how many remain
    ///
    /// Leaving a venue nobody watches is a no-op.
    pub async fn unsubscribe(&self, venue_id: VenueId) -> usize {
        let Some(count) = self.counts.get(&venue_id).map(|c| c.value().clone()) else {
            return 0;
        };
        let mut subscribers = count.lock().await;
        if *subscribers == 0 {
            return 0;
        }

        *subscribers -= 1;
        if *subscribers == 0 {
            self.tasks.cancel(TaskKind::WatchPoll, venue_id);
            self.watcher.end_watch(venue_id).await;
            info!("Last subscriber left venue {}", venue_id);
        }
        *subscribers
    }

    pub async fn subscriber_count(&self, venue_id: VenueId) -> usize {
        let Some(count) = self.counts.get(&venue_id).map(|c| c.value().clone()) else {
            return 0;
        };
        let subscribers = *count.lock().await;
        subscribers
    }

    /// Venues with at least one observer, with their observer counts
    pub async fn subscribed_venues(&self) -> Vec<(VenueId, usize)> {
        let counts: Vec<_> = self
            .counts
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        let mut venues = Vec::new();
        for (venue_id, count) in counts {
            let subscribers = *count.lock().await;
            if subscribers > 0 {
                venues.push((venue_id, subscribers));
            }
        }
        venues
    }

    /// Drop every observer, stop polling and discard all snapshots
    pub async fn clear(&self) {
        let counts: Vec<_> = self
            .counts
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        for (venue_id, count) in counts {
            let mut subscribers = count.lock().await;
            if *subscribers > 0 {
                self.tasks.cancel(TaskKind::WatchPoll, venue_id);
                *subscribers = 0;
            }
        }
        self.watcher.clear_all().await;
    }

    fn start_polling(&self, venue_id: VenueId) {
        let watcher = Arc::clone(&self.watcher);
        self.tasks
            .start(TaskKind::WatchPoll, venue_id, self.poll_interval, move || {
                let watcher = Arc::clone(&watcher);
                async move {
                    if let Err(e) = watcher.poll_once(venue_id).await {
                        warn!("Price poll failed for venue {}: {}", venue_id, e);
                    }
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::BroadcastNotificationChannel;
    use bourse_clock::ManualClock;
    use bourse_store::InMemoryCatalogStore;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    type Registry =
        SubscriptionRegistry<InMemoryCatalogStore, BroadcastNotificationChannel, ManualClock>;

    fn registry(store: &InMemoryCatalogStore) -> (Registry, Arc<TaskRegistry>) {
        let store = Arc::new(store.clone());
        let watcher = Arc::new(ChangeWatcher::new(
            Arc::clone(&store),
            Arc::new(BroadcastNotificationChannel::new(16)),
            Arc::new(ManualClock::default()),
        ));
        let tasks = Arc::new(TaskRegistry::new());
        let registry =
            SubscriptionRegistry::new(store, watcher, Arc::clone(&tasks), Duration::from_secs(5));
        (registry, tasks)
    }

    #[tokio::test]
    async fn test_first_join_starts_polling_last_leave_stops_it() {
        let venue = Uuid::new_v4();
        let store = InMemoryCatalogStore::with_products([Product::new(venue, "Lager", dec!(5))]);
        let (registry, tasks) = registry(&store);

        let first = registry.subscribe(venue).await.unwrap();
        assert_eq!(first.subscribers, 1);
        assert_eq!(first.products.len(), 1);
        assert!(tasks.is_active(TaskKind::WatchPoll, venue));

        let second = registry.subscribe(venue).await.unwrap();
        assert_eq!(second.subscribers, 2);

        assert_eq!(registry.unsubscribe(venue).await, 1);
        assert!(tasks.is_active(TaskKind::WatchPoll, venue));

        assert_eq!(registry.unsubscribe(venue).await, 0);
        assert!(!tasks.is_active(TaskKind::WatchPoll, venue));
        assert_eq!(registry.subscriber_count(venue).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_venue_leave_is_noop() {
        let (registry, tasks) = registry(&InMemoryCatalogStore::new());
        let venue = Uuid::new_v4();

        assert_eq!(registry.unsubscribe(venue).await, 0);
        registry.subscribe(venue).await.unwrap();
        registry.unsubscribe(venue).await;
        assert_eq!(registry.unsubscribe(venue).await, 0);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_failed_join_registers_nothing() {
        let venue = Uuid::new_v4();
        let store = InMemoryCatalogStore::with_products([Product::new(venue, "Lager", dec!(5))]);
        let (registry, tasks) = registry(&store);

        store.go_offline();
        assert!(registry.subscribe(venue).await.is_err());
        assert_eq!(registry.subscriber_count(venue).await, 0);
        assert!(!tasks.is_active(TaskKind::WatchPoll, venue));
    }

    #[tokio::test]
    async fn test_clear_drops_everything() {
        let bar = Uuid::new_v4();
        let club = Uuid::new_v4();
        let (registry, tasks) = registry(&InMemoryCatalogStore::new());

        registry.subscribe(bar).await.unwrap();
        registry.subscribe(club).await.unwrap();
        registry.subscribe(club).await.unwrap();
        let mut venues = registry.subscribed_venues().await;
        venues.sort_by_key(|(_, n)| *n);
        assert_eq!(venues, vec![(bar, 1), (club, 2)]);

        registry.clear().await;
        assert!(registry.subscribed_venues().await.is_empty());
        assert!(tasks.is_empty());
    }
}
