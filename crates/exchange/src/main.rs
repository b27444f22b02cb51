use bourse_core::PriceEvent;
use bourse_exchange::{ExchangeConfig, InMemoryExchange, VenueSubscription};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

fn print_help() {
    eprintln!(
        r#"Bourse - demand-driven venue pricing

USAGE:
    bourse [OPTIONS]

OPTIONS:
    --config <PATH>         Load configuration from JSON file
    --orders-every <MS>     Place a demo purchase every MS milliseconds
    --help                  Print this help message

ENVIRONMENT VARIABLES:
    POLL_INTERVAL_MS        Change watcher poll period (default: 5000)
    REBALANCE_INTERVAL_MS   Default rebalance period (default: 30000)
    RUST_LOG                Log level filter (default: info)

EXAMPLES:
    # Run the demo bar
    bourse

    # Run with config file
    bourse --config venues.json

    # Watch prices move under steady demand
    POLL_INTERVAL_MS=1000 bourse --orders-every 500
"#
    );
}

fn env_millis(name: &str) -> Option<u64> {
    let value = std::env::var(name).ok()?;
    match value.parse() {
        Ok(ms) => Some(ms),
        Err(_) => {
            warn!("Ignoring {}={}: not a number of milliseconds", name, value);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut orders_every: Option<u64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            "--orders-every" => {
                i += 1;
                match args.get(i).and_then(|v| v.parse().ok()) {
                    Some(ms) if ms > 0 => orders_every = Some(ms),
                    _ => {
                        eprintln!("Error: --orders-every requires a positive number of milliseconds");
                        std::process::exit(1);
                    }
                }
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut config = if let Some(path) = config_path {
        info!("Loading configuration from: {}", path);
        ExchangeConfig::from_file(&path)?
    } else {
        info!("Using demo configuration");
        ExchangeConfig::with_demo_venue()
    };

    // Environment overrides
    if let Some(ms) = env_millis("POLL_INTERVAL_MS") {
        config.poll_interval_ms = ms;
    }
    if let Some(ms) = env_millis("REBALANCE_INTERVAL_MS") {
        config.rebalance_interval_ms = ms;
    }
    config.validate()?;

    let venues = config.venues.clone();
    let exchange = Arc::new(InMemoryExchange::from_config(config)?);

    for venue in &venues {
        match exchange
            .start_exchange(venue.id, venue.rebalance_interval())
            .await
        {
            Ok(started) => info!(
                "{}: {} product(s), rebalancing every {:?}",
                venue.name, started.product_count, started.rebalance_interval
            ),
            Err(e) => {
                warn!("{}: exchange not started: {}", venue.name, e);
                continue;
            }
        }

        // Logging observer
        let VenueSubscription {
            initial_prices,
            mut receiver,
            ..
        } = exchange.subscribe(venue.id).await?;
        for product in &initial_prices {
            info!("{} | {} at {}", venue.name, product.name, product.current_price);
        }
        let name = venue.name.clone();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(PriceEvent::PriceUpdate(change)) => info!(
                        "{} | {} {} -> {} ({}%)",
                        name,
                        change.product_name,
                        change.old_price,
                        change.new_price,
                        change.change_percentage
                    ),
                    Ok(PriceEvent::BulkPriceUpdate(bulk)) => {
                        info!("{} | {} price(s) updated", name, bulk.updates.len())
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!("{} | observer lagged, {} event(s) missed", name, missed)
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        // Demo purchases, rotating through the menu with the first item favoured
        if let Some(ms) = orders_every {
            let exchange = Arc::clone(&exchange);
            let venue_id = venue.id;
            let ids: Vec<_> = initial_prices.iter().map(|p| p.id).collect();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_millis(ms));
                let mut round = 0usize;
                loop {
                    ticker.tick().await;
                    if ids.is_empty() {
                        break;
                    }
                    let basket = if round % 2 == 0 {
                        vec![ids[0]]
                    } else {
                        vec![ids[round / 2 % ids.len()]]
                    };
                    if let Err(e) = exchange.record_order(venue_id, &basket).await {
                        error!("Demo purchase failed: {}", e);
                    }
                    round += 1;
                }
            });
        }
    }

    info!("Running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    let status = exchange.status().await;
    info!(
        "Stopping with {} running venue(s) and {} watched venue(s)",
        status.running.len(),
        status.watched.len()
    );
    exchange.shutdown().await;
    Ok(())
}
