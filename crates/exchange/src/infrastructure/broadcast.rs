use async_trait::async_trait;
use bourse_core::{PriceEvent, VenueId};
use bourse_ports::{NotificationChannel, PublishError, PublishResult};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// Broadcast-based notification channel
///
/// One tokio broadcast channel per venue topic, created on first
/// subscription. Publishing to a topic nobody listens to is a no-op.
/// Once closed, every receiver ends and publishing fails.
pub struct BroadcastNotificationChannel {
    /// Per-venue broadcast channels
    venue_channels: Arc<DashMap<VenueId, broadcast::Sender<PriceEvent>>>,
    /// Channel capacity
    capacity: usize,
    closed: Arc<AtomicBool>,
}

impl BroadcastNotificationChannel {
    pub fn new(capacity: usize) -> Self {
        BroadcastNotificationChannel {
            venue_channels: Arc::new(DashMap::new()),
            capacity,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to events for a specific venue
    ///
    /// On a closed channel the receiver reports `Closed` right away.
    pub fn subscribe_venue(&self, venue_id: VenueId) -> broadcast::Receiver<PriceEvent> {
        if self.is_closed() {
            let (_, rx) = broadcast::channel(1);
            return rx;
        }

        let entry = self.venue_channels.entry(venue_id).or_insert_with(|| {
            let (tx, _) = broadcast::channel(self.capacity);
            tx
        });

        entry.value().subscribe()
    }

    /// Drop every topic; receivers see `Closed` once drained
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        let topics = self.venue_channels.len();
        self.venue_channels.clear();
        topics
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for BroadcastNotificationChannel {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Clone for BroadcastNotificationChannel {
    fn clone(&self) -> Self {
        BroadcastNotificationChannel {
            venue_channels: Arc::clone(&self.venue_channels),
            capacity: self.capacity,
            closed: Arc::clone(&self.closed),
        }
    }
}

#[async_trait]
impl NotificationChannel for BroadcastNotificationChannel {
    async fn publish(&self, venue_id: VenueId, event: PriceEvent) -> PublishResult<()> {
        if self.is_closed() {
            return Err(PublishError::TopicClosed(venue_id.to_string()));
        }
        if let Some(tx) = self.venue_channels.get(&venue_id) {
            // Ignore send errors (no receivers left)
            let _ = tx.send(event);
        }
        Ok(())
    }

    fn subscriber_count(&self, venue_id: VenueId) -> usize {
        self.venue_channels
            .get(&venue_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_core::BulkPriceUpdate;
    use chrono::Utc;
    use uuid::Uuid;

    fn bulk_event(venue_id: VenueId) -> PriceEvent {
        PriceEvent::BulkPriceUpdate(BulkPriceUpdate {
            venue_id,
            updates: Vec::new(),
            timestamp: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_venue_subscription() {
        let channel = BroadcastNotificationChannel::new(16);
        let bar = Uuid::new_v4();
        let club = Uuid::new_v4();
        let mut bar_rx = channel.subscribe_venue(bar);
        let mut club_rx = channel.subscribe_venue(club);

        channel.publish(bar, bulk_event(bar)).await.unwrap();

        // Bar subscriber should receive
        assert_eq!(bar_rx.try_recv().unwrap().name(), "bulk-price-update");

        // Club subscriber should not receive
        assert!(club_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_listeners_is_ok() {
        let channel = BroadcastNotificationChannel::default();
        let venue = Uuid::new_v4();
        assert!(channel.publish(venue, bulk_event(venue)).await.is_ok());

        let rx = channel.subscribe_venue(venue);
        drop(rx);
        assert!(channel.publish(venue, bulk_event(venue)).await.is_ok());
    }

    #[test]
    fn test_subscriber_count() {
        let channel = BroadcastNotificationChannel::new(16);
        let venue = Uuid::new_v4();
        assert_eq!(channel.subscriber_count(venue), 0);

        let first = channel.subscribe_venue(venue);
        let second = channel.subscribe_venue(venue);
        assert_eq!(channel.subscriber_count(venue), 2);

        drop(first);
        assert_eq!(channel.subscriber_count(venue), 1);
        drop(second);
        assert_eq!(channel.subscriber_count(venue), 0);
    }

    #[tokio::test]
    async fn test_close_ends_receivers_and_rejects_publish() {
        let channel = BroadcastNotificationChannel::new(16);
        let venue = Uuid::new_v4();
        let mut rx = channel.subscribe_venue(venue);
        channel.publish(venue, bulk_event(venue)).await.unwrap();

        assert_eq!(channel.close(), 1);
        assert!(channel.is_closed());
        assert_eq!(channel.subscriber_count(venue), 0);

        // Buffered events are still delivered before the close
        assert!(rx.recv().await.is_ok());
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));

        assert_eq!(
            channel.publish(venue, bulk_event(venue)).await,
            Err(PublishError::TopicClosed(venue.to_string()))
        );
        let mut late = channel.subscribe_venue(venue);
        assert!(matches!(late.recv().await, Err(broadcast::error::RecvError::Closed)));
    }
}
