// tests/engine.rs
//
// End-to-end paper-mode flow: seed positions, alerts and pending orders into
// the in-memory store, then drive the scheduler the way the daemon does and
// check what landed back in the store.

use pricewatch::domain::models::{
    AlertType, AssetClass, OrderStatus, PendingOrder, PendingOrderType,
};
use pricewatch::exchange::PaperExchange;
use pricewatch::notify::{Channel, LogSink};
use pricewatch::pricing::{PriceCache, PriceRouter, StaticPriceSource};
use pricewatch::reconcile::{
    AlertEvaluator, LeaseMap, OrderReconciler, PositionValuer, ReconciliationScheduler,
    SchedulerIntervals,
};
use pricewatch::store::{MemoryStore, OrderStore, PositionStore};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::time::Duration;

fn build_scheduler(
    store: Arc<MemoryStore>,
    source: Arc<StaticPriceSource>,
    exchange: Arc<PaperExchange>,
) -> ReconciliationScheduler {
    let cache = Arc::new(PriceCache::new());
    let router = Arc::new(PriceRouter::new(cache, Duration::from_secs(5)).with_source(source));

    // Zero TTLs so every pass refetches from the static source.
    let crypto_ttl = chrono::Duration::zero();
    let equity_ttl = chrono::Duration::zero();

    let valuer = Arc::new(PositionValuer::new(
        store.clone(),
        router.clone(),
        crypto_ttl,
        equity_ttl,
    ));
    let evaluator = Arc::new(AlertEvaluator::new(
        store.clone(),
        store.clone(),
        Arc::new(LogSink),
        vec![Channel::Telegram],
    ));
    let orders = Arc::new(OrderReconciler::new(
        store,
        router,
        exchange,
        3,
        Duration::from_secs(5),
        crypto_ttl,
        equity_ttl,
    ));
    let leases = Arc::new(LeaseMap::new(Duration::from_secs(30)));

    ReconciliationScheduler::new(valuer, evaluator, orders, leases, SchedulerIntervals::default())
}

fn waiting_order(order_type: PendingOrderType, position: Option<u64>) -> PendingOrder {
    PendingOrder {
        id: 0,
        owner: 1,
        order_type,
        symbol: "BTC".to_string(),
        currency: "USDT".to_string(),
        venue: "BINANCE".to_string(),
        asset_class: AssetClass::Crypto,
        limit_price: dec!(49000),
        trigger_price: dec!(48000),
        amount: dec!(1),
        exchange_order_id: None,
        client_order_id: None,
        status: OrderStatus::Waiting,
        last_checked: None,
        error_message: None,
        retry_count: 0,
        position,
        category: Some(7),
        executed_at: None,
    }
}

#[tokio::test]
async fn full_cycle_values_alerts_and_settles_a_sell() {
    let store = Arc::new(MemoryStore::new());
    let position =
        store.add_position(1, "BTCUSDT", "BINANCE", AssetClass::Crypto, dec!(1), dec!(40000));
    let alert = store.add_alert(position.id, AlertType::PriceAbove, dec!(45000));
    let order = store.add_order(waiting_order(
        PendingOrderType::StopLimitSell,
        Some(position.id),
    ));

    let source = Arc::new(StaticPriceSource::new("paper"));
    source.set_price("BTCUSDT", "BINANCE", dec!(50000));
    let exchange = Arc::new(PaperExchange::new());
    let scheduler = build_scheduler(store.clone(), source, exchange.clone());

    // Pass 1: valuation runs, the alert fires and notifies, and the crossed
    // sell order is submitted.
    scheduler.run_once().await.unwrap();

    let valued = store.get_position(position.id).await.unwrap();
    assert_eq!(valued.current_price, Some(dec!(50000)));
    assert!(valued.last_price_update.is_some());

    let fired = store.get_alert(alert.id).unwrap();
    assert!(fired.triggered);
    assert!(fired.notification_sent);

    let created = store.get_order(order.id).await.unwrap();
    assert_eq!(created.status, OrderStatus::Created);
    assert!(created.exchange_order_id.is_some());

    // Pass 2: the paper exchange reports the fill, the order goes terminal
    // and the linked position closes at the limit price.
    scheduler.run_once().await.unwrap();

    let executed = store.get_order(order.id).await.unwrap();
    assert_eq!(executed.status, OrderStatus::Executed);
    assert!(executed.executed_at.is_some());

    let closed = store.get_position(position.id).await.unwrap();
    assert!(!closed.is_open());
    assert_eq!(closed.exit_price, Some(dec!(49000)));

    // Pass 3 is a no-op: the alert stays fired and nothing resubmits.
    scheduler.run_once().await.unwrap();
    assert_eq!(exchange.place_count(), 1);
    assert!(store.get_alert(alert.id).unwrap().triggered);
}

#[tokio::test]
async fn executed_buy_opens_a_position() {
    let store = Arc::new(MemoryStore::new());
    let mut order = waiting_order(PendingOrderType::StopLimitBuy, None);
    order.trigger_price = dec!(51000);
    order.limit_price = dec!(50500);
    order.amount = dec!(1000);
    let order = store.add_order(order);

    let source = Arc::new(StaticPriceSource::new("paper"));
    source.set_price("BTCUSDT", "BINANCE", dec!(50000));
    let exchange = Arc::new(PaperExchange::new());
    let scheduler = build_scheduler(store.clone(), source, exchange);

    scheduler.run_once().await.unwrap();
    scheduler.run_once().await.unwrap();

    let executed = store.get_order(order.id).await.unwrap();
    assert_eq!(executed.status, OrderStatus::Executed);

    // The buy amount is quote currency: 1000 USDT at 50500 per BTC.
    let opened = store.open_positions(Some(1), Some(AssetClass::Crypto)).await.unwrap();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].symbol, "BTCUSDT");
    assert_eq!(opened[0].quantity, (dec!(1000) / dec!(50500)).round_dp(6));
    assert_eq!(opened[0].entry_price, dec!(50500));
    assert_eq!(opened[0].category, Some(7));
}

#[tokio::test]
async fn snapshot_roundtrip_preserves_engine_state() {
    let store = Arc::new(MemoryStore::new());
    let position =
        store.add_position(1, "AAPL", "NASDAQ", AssetClass::Equity, dec!(10), dec!(180));
    store.add_alert(position.id, AlertType::PctIncrease, dec!(5));

    let source = Arc::new(StaticPriceSource::new("paper"));
    source.set_price("AAPL", "NASDAQ", dec!(190));
    let exchange = Arc::new(PaperExchange::new());
    let scheduler = build_scheduler(store.clone(), source.clone(), exchange);

    scheduler.run_once().await.unwrap();

    let dir = std::env::temp_dir().join("pricewatch-engine-test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("state.json");
    let json = serde_json::to_string_pretty(&store.snapshot()).unwrap();
    std::fs::write(&path, json).unwrap();

    let restored = Arc::new(MemoryStore::from_snapshot_file(&path).unwrap());
    let again = restored.get_position(position.id).await.unwrap();
    assert_eq!(again.current_price, Some(dec!(190)));

    // A new pass over the restored store does not re-notify the fired alert.
    let exchange = Arc::new(PaperExchange::new());
    let scheduler = build_scheduler(restored.clone(), source, exchange);
    scheduler.run_once().await.unwrap();
    let alerts = restored.snapshot().alerts;
    assert!(alerts.iter().all(|a| a.triggered && a.notification_sent));

    std::fs::remove_file(&path).ok();
}
