use async_trait::async_trait;
use bourse_core::{PriceEvent, VenueId};

use crate::error::PublishResult;

/// Topic-based publisher, one topic per venue
///
/// Delivery to observers is the channel's concern; the core only publishes.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Publish an event to every observer of the venue topic
    async fn publish(&self, venue_id: VenueId, event: PriceEvent) -> PublishResult<()>;

    /// Number of observers currently attached to the venue topic
    fn subscriber_count(&self, venue_id: VenueId) -> usize;
}
