use async_trait::async_trait;
use bourse_core::{PriceHistoryEntry, Product, ProductId, VenueId};

use crate::error::StoreResult;

/// Durable store of products and their price history
///
/// Every call is a suspension point: other venues' work may run while a
/// query or write is outstanding.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All products of a venue, in a stable iteration order
    ///
    /// An unknown venue yields an empty list.
    async fn find_products_by_venue(&self, venue_id: VenueId) -> StoreResult<Vec<Product>>;

    /// Insert or replace a product
    async fn save_product(&self, product: &Product) -> StoreResult<()>;

    /// Append a price history record
    async fn append_history(&self, entry: &PriceHistoryEntry) -> StoreResult<()>;

    /// History of one product, oldest first
    async fn find_history(&self, product_id: ProductId) -> StoreResult<Vec<PriceHistoryEntry>>;
}
