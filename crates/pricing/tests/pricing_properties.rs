//! Price Engine Property Tests
//!
//! Drives the engine against the in-memory catalog and checks:
//! 1. Prices never leave their band
//! 2. No single recompute moves a price further than its cap
//! 3. Decay never grows a counter
//! 4. The rising and decaying scenarios behave as documented

use bourse_clock::ManualClock;
use bourse_core::{PriceChangeReason, Product, ProductId, VenueId};
use bourse_pricing::{PriceEngine, PricingConfig};
use bourse_store::InMemoryCatalogStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

type Engine = PriceEngine<InMemoryCatalogStore, ManualClock>;

fn setup(products: Vec<Product>) -> (Engine, InMemoryCatalogStore) {
    let _ = env_logger::try_init();
    let store = InMemoryCatalogStore::with_products(products);
    let engine = PriceEngine::new(
        Arc::new(store.clone()),
        Arc::new(ManualClock::default()),
        PricingConfig::default(),
    )
    .unwrap();
    (engine, store)
}

fn venue_catalog(venue: VenueId) -> Vec<Product> {
    vec![
        Product::new(venue, "Lager", dec!(10)).with_band(dec!(7), dec!(15)),
        Product::new(venue, "Stout", dec!(6.50)).with_band(dec!(5), dec!(9)),
        Product::new(venue, "Cider", dec!(3.33)),
        Product::new(venue, "Porter", dec!(8)).with_band(dec!(7.50), dec!(8.50)),
        Product::new(venue, "Mead", dec!(12)),
    ]
}

fn assert_all_in_band(store: &InMemoryCatalogStore, venue: VenueId) {
    let config = PricingConfig::default();
    for product in store.products_of(venue) {
        let band = product.price_band_with(config.min_multiplier, config.max_multiplier);
        assert!(
            band.contains(product.current_price),
            "{} at {} outside {}..{}",
            product.name,
            product.current_price,
            band.min,
            band.max
        );
    }
}

fn assert_steps_capped(store: &InMemoryCatalogStore, ids: &[ProductId]) {
    let config = PricingConfig::default();
    let rise_cap = config.bands().iter().map(|b| b.step.rise_cap).max().unwrap();
    let fall_cap = config.zero_orders.step.fall_cap;

    for id in ids {
        for entry in store.history_of(*id) {
            let step = entry.new_price - entry.old_price;
            if step > Decimal::ZERO {
                assert!(step <= entry.old_price * rise_cap, "rise {step} from {}", entry.old_price);
            } else {
                assert!(-step <= entry.old_price * fall_cap, "fall {step} from {}", entry.old_price);
            }
        }
    }
}

#[tokio::test]
async fn test_prices_stay_in_band_under_mixed_demand() {
    let venue = Uuid::new_v4();
    let (engine, store) = setup(venue_catalog(venue));
    let ids: Vec<ProductId> = store.products_of(venue).iter().map(|p| p.id).collect();

    for round in 0..200usize {
        // Skewed demand: the first products sell far more often
        let basket: Vec<ProductId> = ids
            .iter()
            .enumerate()
            .filter(|(k, _)| (round * 7 + k * 3) % (k + 2) == 0)
            .map(|(_, id)| *id)
            .collect();
        engine.record_order(venue, &basket).await.unwrap();

        if round % 10 == 9 {
            engine.rebalance_and_reprice(venue).await.unwrap();
        }
        assert_all_in_band(&store, venue);
    }

    assert_steps_capped(&store, &ids);
}

#[tokio::test]
async fn test_out_of_band_price_is_pulled_back() {
    let venue = Uuid::new_v4();
    let lager = Product::new(venue, "Lager", dec!(10))
        .with_band(dec!(7), dec!(15))
        .with_current_price(dec!(18));
    let (engine, store) = setup(vec![lager.clone()]);

    let updates = engine.record_order(venue, &[lager.id]).await.unwrap();

    assert_eq!(updates.len(), 1);
    assert_eq!(store.product(lager.id).unwrap().current_price, dec!(15));
}

#[tokio::test]
async fn test_decay_never_grows_counts() {
    let venue = Uuid::new_v4();
    let (engine, store) = setup(venue_catalog(venue));
    let ids: Vec<ProductId> = store.products_of(venue).iter().map(|p| p.id).collect();

    for (k, id) in ids.iter().enumerate() {
        for _ in 0..(k * 4 + 1) {
            engine.record_order(venue, &[*id]).await.unwrap();
        }
    }

    loop {
        let before = engine.order_counts(venue).await;
        if before.is_empty() {
            break;
        }
        engine.rebalance(venue).await;
        let after = engine.order_counts(venue).await;

        for (id, count) in &after {
            assert!(*count > 0);
            assert!(count < &before[id]);
        }
        assert!(after.len() <= before.len());
    }
}

#[tokio::test]
async fn test_rising_scenario() {
    let venue = Uuid::new_v4();
    let stout = Product::new(venue, "Stout", dec!(6));
    let (engine, store) = setup(vec![stout.clone()]);

    engine.record_order(venue, &[stout.id]).await.unwrap();
    engine.record_order(venue, &[stout.id]).await.unwrap();

    // Joins the catalog with no momentum; one order against a leader at two
    let lager = Product::new(venue, "Lager", dec!(10)).with_band(dec!(7), dec!(15));
    store.add_product(lager.clone());
    let updates = engine.record_order(venue, &[lager.id]).await.unwrap();

    let medium_rise_cap = PricingConfig::default().medium.step.rise_cap;
    let price = store.product(lager.id).unwrap().current_price;
    assert!(price > dec!(10));
    assert!(price <= dec!(10) * (Decimal::ONE + medium_rise_cap));
    assert_eq!(price, dec!(10.30));

    let update = updates.iter().find(|u| u.product.id == lager.id).unwrap();
    assert_eq!(update.history.reason, PriceChangeReason::OrderReceived);
    assert_eq!(update.history.change_percentage, dec!(3.00));
    assert_eq!(update.product.previous_price, Some(dec!(10)));
}

#[tokio::test]
async fn test_unordered_product_decays_toward_min() {
    let venue = Uuid::new_v4();
    let lager = Product::new(venue, "Lager", dec!(10));
    let stout = Product::new(venue, "Stout", dec!(6));
    let (engine, store) = setup(vec![lager.clone(), stout.clone()]);
    let min = dec!(7);

    let mut previous = store.product(lager.id).unwrap().current_price;
    for _ in 0..40 {
        engine.record_order(venue, &[stout.id]).await.unwrap();
        engine.rebalance(venue).await;

        let price = store.product(lager.id).unwrap().current_price;
        assert!(price <= previous, "{price} rose from {previous}");
        assert!(price >= min);
        assert!(previous - price <= previous * dec!(0.10));
        previous = price;
    }

    assert!(previous < dec!(8));
    assert!(
        store
            .history_of(lager.id)
            .iter()
            .all(|h| h.reason == PriceChangeReason::MarketAdjustment)
    );
}

#[tokio::test]
async fn test_rebalance_and_reprice_records_decay() {
    let venue = Uuid::new_v4();
    let lager = Product::new(venue, "Lager", dec!(10));
    let stout = Product::new(venue, "Stout", dec!(6));
    let (engine, store) = setup(vec![lager.clone(), stout.clone()]);

    for _ in 0..5 {
        engine.record_order(venue, &[lager.id]).await.unwrap();
    }
    let before = store.history_of(stout.id).len();

    let updates = engine.rebalance_and_reprice(venue).await.unwrap();

    assert!(!updates.is_empty());
    assert!(
        updates
            .iter()
            .all(|u| u.history.reason == PriceChangeReason::DemandDecay)
    );
    assert_eq!(engine.order_counts(venue).await.get(&lager.id), Some(&3));
    assert!(store.history_of(stout.id).len() > before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_are_serialized_per_venue() {
    let bar = Uuid::new_v4();
    let club = Uuid::new_v4();
    let mut catalog = venue_catalog(bar);
    catalog.extend(venue_catalog(club));
    let (engine, store) = setup(catalog);
    let engine = Arc::new(engine);

    let bar_lager = store.products_of(bar)[0].id;
    let club_lager = store.products_of(club)[0].id;

    let mut handles = Vec::new();
    for k in 0..40 {
        let engine = Arc::clone(&engine);
        let (venue, id) = if k % 2 == 0 { (bar, bar_lager) } else { (club, club_lager) };
        handles.push(tokio::spawn(async move {
            engine.record_order(venue, &[id]).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(engine.order_counts(bar).await.get(&bar_lager), Some(&20));
    assert_eq!(engine.order_counts(club).await.get(&club_lager), Some(&20));
    assert_all_in_band(&store, bar);
    assert_all_in_band(&store, club);
}
