use async_trait::async_trait;
use bourse_core::{Price, PriceHistoryEntry, Product, ProductId, VenueId};
use bourse_ports::{CatalogStore, StoreError, StoreResult};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Injected failures, consumed by the next matching store calls
#[derive(Default)]
struct FaultPlan {
    offline: AtomicBool,
    failing_queries: AtomicUsize,
    failing_writes: AtomicUsize,
}

impl FaultPlan {
    fn check_query(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        if take_one(&self.failing_queries) {
            return Err(StoreError::Query("injected query failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        if take_one(&self.failing_writes) {
            return Err(StoreError::Write("injected write failure".to_string()));
        }
        Ok(())
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// In-memory catalog store
///
/// Thread-safe storage for products and price history using DashMap.
/// Products of a venue are returned in insertion order.
/// Suitable for simulation and testing; failures can be injected.
pub struct InMemoryCatalogStore {
    products: Arc<DashMap<ProductId, Product>>,
    venue_index: Arc<DashMap<VenueId, Vec<ProductId>>>,
    history: Arc<DashMap<ProductId, Vec<PriceHistoryEntry>>>,
    faults: Arc<FaultPlan>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        InMemoryCatalogStore {
            products: Arc::new(DashMap::new()),
            venue_index: Arc::new(DashMap::new()),
            history: Arc::new(DashMap::new()),
            faults: Arc::new(FaultPlan::default()),
        }
    }

    /// Create a store seeded with products
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        for product in products {
            store.add_product(product);
        }
        store
    }

    /// Add or replace a product (sync)
    pub fn add_product(&self, product: Product) {
        let mut ids = self.venue_index.entry(product.venue_id).or_default();
        if !ids.contains(&product.id) {
            ids.push(product.id);
        }
        drop(ids);
        self.products.insert(product.id, product);
    }

    /// Get a product (sync)
    pub fn product(&self, product_id: ProductId) -> Option<Product> {
        self.products.get(&product_id).map(|p| p.clone())
    }

    /// All products of a venue (sync)
    pub fn products_of(&self, venue_id: VenueId) -> Vec<Product> {
        self.venue_index
            .get(&venue_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.products.get(id).map(|p| p.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Price history of a product (sync)
    pub fn history_of(&self, product_id: ProductId) -> Vec<PriceHistoryEntry> {
        self.history
            .get(&product_id)
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    /// Overwrite a product's current price outside the engine
    ///
    /// Mirrors an administrator editing the catalog directly.
    pub fn set_current_price(&self, product_id: ProductId, price: Price) -> bool {
        match self.products.get_mut(&product_id) {
            Some(mut product) => {
                product.apply_price(price);
                true
            }
            None => false,
        }
    }

    /// Make every call fail until [`go_online`](Self::go_online)
    pub fn go_offline(&self) {
        self.faults.offline.store(true, Ordering::SeqCst);
    }

    pub fn go_online(&self) {
        self.faults.offline.store(false, Ordering::SeqCst);
    }

    /// Fail the next `n` product queries
    pub fn fail_next_queries(&self, n: usize) {
        self.faults.failing_queries.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` writes (product saves and history appends)
    pub fn fail_next_writes(&self, n: usize) {
        self.faults.failing_writes.store(n, Ordering::SeqCst);
    }
}

impl Default for InMemoryCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemoryCatalogStore {
    fn clone(&self) -> Self {
        InMemoryCatalogStore {
            products: Arc::clone(&self.products),
            venue_index: Arc::clone(&self.venue_index),
            history: Arc::clone(&self.history),
            faults: Arc::clone(&self.faults),
        }
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn find_products_by_venue(&self, venue_id: VenueId) -> StoreResult<Vec<Product>> {
        self.faults.check_query()?;
        Ok(self.products_of(venue_id))
    }

    async fn save_product(&self, product: &Product) -> StoreResult<()> {
        self.faults.check_write()?;
        self.add_product(product.clone());
        Ok(())
    }

    async fn append_history(&self, entry: &PriceHistoryEntry) -> StoreResult<()> {
        self.faults.check_write()?;
        self.history
            .entry(entry.product_id)
            .or_default()
            .push(entry.clone());
        log::trace!(
            "History appended for product {}: {} -> {}",
            entry.product_id,
            entry.old_price,
            entry.new_price
        );
        Ok(())
    }

    async fn find_history(&self, product_id: ProductId) -> StoreResult<Vec<PriceHistoryEntry>> {
        self.faults.check_query()?;
        Ok(self.history_of(product_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_core::PriceChangeReason;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_products_grouped_by_venue_in_insertion_order() {
        let bar = Uuid::new_v4();
        let club = Uuid::new_v4();
        let lager = Product::new(bar, "Lager", dec!(5));
        let stout = Product::new(bar, "Stout", dec!(6));
        let cider = Product::new(club, "Cider", dec!(4));
        let store =
            InMemoryCatalogStore::with_products([lager.clone(), stout.clone(), cider.clone()]);

        let names: Vec<_> = store
            .find_products_by_venue(bar)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Lager", "Stout"]);
        assert_eq!(store.find_products_by_venue(club).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_venue_is_empty() {
        let store = InMemoryCatalogStore::new();
        assert!(store.find_products_by_venue(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_replaces_without_duplicating() {
        let venue = Uuid::new_v4();
        let mut lager = Product::new(venue, "Lager", dec!(5));
        let store = InMemoryCatalogStore::with_products([lager.clone()]);

        lager.apply_price(dec!(5.20));
        store.save_product(&lager).await.unwrap();

        let products = store.find_products_by_venue(venue).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].current_price, dec!(5.20));
    }

    #[tokio::test]
    async fn test_history_is_append_only() {
        let store = InMemoryCatalogStore::new();
        let product_id = Uuid::new_v4();
        for (old, new) in [(dec!(5), dec!(5.2)), (dec!(5.2), dec!(5.1))] {
            let entry = PriceHistoryEntry::new(
                product_id,
                old,
                new,
                PriceChangeReason::MarketAdjustment,
                Utc::now(),
            );
            store.append_history(&entry).await.unwrap();
        }

        let history = store.find_history(product_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].new_price, dec!(5.1));
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let venue = Uuid::new_v4();
        let store = InMemoryCatalogStore::with_products([Product::new(venue, "Lager", dec!(5))]);

        store.fail_next_queries(1);
        assert!(matches!(
            store.find_products_by_venue(venue).await,
            Err(StoreError::Query(_))
        ));
        assert!(store.find_products_by_venue(venue).await.is_ok());

        store.go_offline();
        assert!(matches!(
            store.find_products_by_venue(venue).await,
            Err(StoreError::Unavailable(_))
        ));
        store.go_online();
        assert!(store.find_products_by_venue(venue).await.is_ok());
    }

    #[test]
    fn test_set_current_price_keeps_previous() {
        let venue = Uuid::new_v4();
        let lager = Product::new(venue, "Lager", dec!(5));
        let id = lager.id;
        let store = InMemoryCatalogStore::with_products([lager]);

        assert!(store.set_current_price(id, dec!(5.50)));
        let stored = store.product(id).unwrap();
        assert_eq!(stored.current_price, dec!(5.50));
        assert_eq!(stored.previous_price, Some(dec!(5)));
        assert!(!store.set_current_price(Uuid::new_v4(), dec!(1)));
    }
}
