// src/main.rs
use pricewatch::config::Config;
use pricewatch::domain::errors::AppResult;
use pricewatch::exchange::PaperExchange;
use pricewatch::notify::LogSink;
use pricewatch::pricing::{PriceCache, PriceRouter, StaticPriceSource};
use pricewatch::reconcile::{
    AlertEvaluator, LeaseMap, OrderReconciler, PositionValuer, ReconciliationScheduler,
};
use pricewatch::store::MemoryStore;

use std::sync::Arc;
use tokio::signal::ctrl_c;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting pricewatch v{}", env!("CARGO_PKG_VERSION"));

    let run_once = std::env::args().any(|arg| arg == "--once");

    // Seed the store, from a snapshot file when one is configured
    let store = match &config.state_file {
        Some(path) => {
            log::info!("Loading state snapshot from {}", path);
            Arc::new(MemoryStore::from_snapshot_file(path)?)
        }
        None => Arc::new(MemoryStore::new()),
    };

    // Price source and router
    let source = Arc::new(StaticPriceSource::new("paper"));
    for seed in &config.pricing.paper_prices {
        source.set_price(&seed.symbol, &seed.venue, seed.price);
    }
    log::info!(
        "Paper price source seeded with {} symbol(s)",
        config.pricing.paper_prices.len()
    );
    let cache = Arc::new(PriceCache::new());
    let router = Arc::new(PriceRouter::new(cache, config.source_timeout()).with_source(source));

    // Exchange
    let exchange = Arc::new(PaperExchange::new());

    // Reconciliation components
    let valuer = Arc::new(PositionValuer::new(
        store.clone(),
        router.clone(),
        config.crypto_ttl(),
        config.equity_ttl(),
    ));
    let evaluator = Arc::new(AlertEvaluator::new(
        store.clone(),
        store.clone(),
        Arc::new(LogSink),
        config.channels(),
    ));
    let orders = Arc::new(OrderReconciler::new(
        store.clone(),
        router,
        exchange,
        config.orders.max_retries,
        config.exchange_timeout(),
        config.crypto_ttl(),
        config.equity_ttl(),
    ));
    let leases = Arc::new(LeaseMap::new(config.lease_timeout()));

    let scheduler =
        ReconciliationScheduler::new(valuer, evaluator, orders, leases, config.intervals());

    if run_once {
        log::info!("Running a single reconciliation pass");
        scheduler.run_once().await?;
        log::info!("Single pass complete");
        return Ok(());
    }

    // Shutdown signal wiring
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = ctrl_c().await {
            log::error!("Failed to listen for control-c event: {}", e);
            return;
        }
        log::info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    log::info!("Engine is running. Press Ctrl+C to stop.");
    scheduler.run(shutdown_rx).await?;

    log::info!("Shutdown complete. Goodbye!");
    Ok(())
}
