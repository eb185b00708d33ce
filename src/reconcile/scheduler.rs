// src/reconcile/scheduler.rs
use crate::domain::errors::AppResult;
use crate::domain::models::AssetClass;
use crate::reconcile::alerts::AlertEvaluator;
use crate::reconcile::lease::LeaseMap;
use crate::reconcile::orders::{OrderCycleOutcome, OrderReconciler};
use crate::reconcile::valuer::PositionValuer;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Cadences of the periodic cycles. Crypto runs faster than equities; order
/// reconciliation has its own slower tick.
#[derive(Debug, Clone)]
pub struct SchedulerIntervals {
    pub crypto_prices: Duration,
    pub equity_prices: Duration,
    pub orders: Duration,
    pub notification_retry: Duration,
}

impl Default for SchedulerIntervals {
    fn default() -> Self {
        Self {
            crypto_prices: Duration::from_secs(60),
            equity_prices: Duration::from_secs(240),
            orders: Duration::from_secs(120),
            notification_retry: Duration::from_secs(60),
        }
    }
}

/// Summary of one price/alert cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub refreshed: usize,
    pub triggered: usize,
    pub notified: usize,
    pub config_errors: usize,
}

/// Drives valuation, alert evaluation and order reconciliation on their
/// cadences until shut down.
///
/// Cycles for different entities may run concurrently across ticks; the
/// shared lease map guarantees at most one in-flight reconciliation per
/// position/order. Cancellation is honored between entities, never mid-call,
/// so an order submission is never abandoned half-acknowledged.
pub struct ReconciliationScheduler {
    valuer: Arc<PositionValuer>,
    evaluator: Arc<AlertEvaluator>,
    orders: Arc<OrderReconciler>,
    leases: Arc<LeaseMap>,
    intervals: SchedulerIntervals,
}

impl ReconciliationScheduler {
    pub fn new(
        valuer: Arc<PositionValuer>,
        evaluator: Arc<AlertEvaluator>,
        orders: Arc<OrderReconciler>,
        leases: Arc<LeaseMap>,
        intervals: SchedulerIntervals,
    ) -> Self {
        Self {
            valuer,
            evaluator,
            orders,
            leases,
            intervals,
        }
    }

    /// Run until the shutdown signal flips. Each tick failure is logged and
    /// retried at the next tick; only startup errors escape.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> AppResult<()> {
        let mut crypto = interval(self.intervals.crypto_prices);
        let mut equity = interval(self.intervals.equity_prices);
        let mut orders = interval(self.intervals.orders);
        let mut retry = interval(self.intervals.notification_retry);
        for ticker in [&mut crypto, &mut equity, &mut orders, &mut retry] {
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        }

        log::info!(
            "Scheduler running (crypto {:?}, equity {:?}, orders {:?})",
            self.intervals.crypto_prices,
            self.intervals.equity_prices,
            self.intervals.orders
        );

        loop {
            tokio::select! {
                _ = crypto.tick() => {
                    if let Err(e) = self.run_price_cycle(AssetClass::Crypto, Some(&shutdown)).await {
                        log::error!("Crypto price cycle failed: {}", e);
                    }
                }
                _ = equity.tick() => {
                    if let Err(e) = self.run_price_cycle(AssetClass::Equity, Some(&shutdown)).await {
                        log::error!("Equity price cycle failed: {}", e);
                    }
                }
                _ = orders.tick() => {
                    if let Err(e) = self.run_order_cycle(Some(&shutdown)).await {
                        log::error!("Order cycle failed: {}", e);
                    }
                }
                _ = retry.tick() => {
                    match self.evaluator.retry_unsent().await {
                        Ok(0) => {}
                        Ok(n) => log::info!("Delivered {} deferred notification(s)", n),
                        Err(e) => log::error!("Notification retry pass failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!("Scheduler stopped");
        Ok(())
    }

    /// One pass over every concern, for `--once` mode and tests.
    pub async fn run_once(&self) -> AppResult<()> {
        for asset_class in [AssetClass::Crypto, AssetClass::Equity] {
            let report = self.run_price_cycle(asset_class, None).await?;
            log::info!(
                "{} cycle: {} refreshed, {} triggered, {} notified, {} config error(s)",
                asset_class,
                report.refreshed,
                report.triggered,
                report.notified,
                report.config_errors
            );
        }

        let outcome = self.run_order_cycle(None).await?;
        log::info!(
            "Order cycle: {} submitted, {} executed, {} cancelled, {} errored, {} skipped",
            outcome.submitted,
            outcome.executed,
            outcome.cancelled,
            outcome.errored,
            outcome.skipped
        );

        let delivered = self.evaluator.retry_unsent().await?;
        if delivered > 0 {
            log::info!("Delivered {} deferred notification(s)", delivered);
        }
        Ok(())
    }

    /// Refresh valuations for one asset class, then evaluate alerts on the
    /// positions that actually got a fresh price.
    pub async fn run_price_cycle(
        &self,
        asset_class: AssetClass,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> AppResult<CycleReport> {
        let refreshed = self.valuer.refresh_detailed(None, Some(asset_class)).await?;
        let mut report = CycleReport {
            refreshed: refreshed.len(),
            ..CycleReport::default()
        };

        for position in &refreshed {
            if cancel.is_some_and(|c| *c.borrow()) {
                log::info!("Price cycle cancelled, remaining positions wait for the next tick");
                break;
            }

            let Some(_lease) = self.leases.try_acquire("position", position.id) else {
                log::debug!("Position {} is leased elsewhere, skipping", position.id);
                continue;
            };

            match self.evaluator.evaluate_position(position).await {
                Ok(outcome) => {
                    report.triggered += outcome.triggered.len();
                    report.notified += outcome.notified;
                    report.config_errors += outcome.config_errors.len();
                }
                Err(e) => {
                    log::error!(
                        "Alert evaluation failed for position {}: {}",
                        position.id,
                        e
                    );
                }
            }
        }

        Ok(report)
    }

    pub async fn run_order_cycle(
        &self,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> AppResult<OrderCycleOutcome> {
        self.orders.reconcile_all(&self.leases, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        AlertType, OrderStatus, PendingOrder, PendingOrderType,
    };
    use crate::exchange::PaperExchange;
    use crate::notify::{Channel, LogSink};
    use crate::pricing::{PriceCache, PriceRouter, StaticPriceSource};
    use crate::store::{MemoryStore, OrderStore, PositionStore};
    use rust_decimal_macros::dec;

    fn scheduler_with(
        store: Arc<MemoryStore>,
        source: Arc<StaticPriceSource>,
        exchange: Arc<PaperExchange>,
    ) -> ReconciliationScheduler {
        let cache = Arc::new(PriceCache::new());
        let router = Arc::new(
            PriceRouter::new(cache, Duration::from_secs(5)).with_source(source),
        );
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

    #[tokio::test]
    async fn one_shot_pass_runs_every_concern() {
        let store = Arc::new(MemoryStore::new());
        let position =
            store.add_position(1, "BTCUSDT", "BINANCE", AssetClass::Crypto, dec!(1), dec!(40000));
        let alert = store.add_alert(position.id, AlertType::PriceAbove, dec!(45000));
        let order = store.add_order(PendingOrder {
            id: 0,
            owner: 1,
            order_type: PendingOrderType::StopLimitSell,
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
            position: Some(position.id),
            category: None,
            executed_at: None,
        });

        let source = Arc::new(StaticPriceSource::new("paper"));
        source.set_price("BTCUSDT", "BINANCE", dec!(50000));
        let exchange = Arc::new(PaperExchange::new());
        let scheduler = scheduler_with(store.clone(), source, exchange.clone());

        // First pass: valuation + alert trigger + order submission.
        scheduler.run_once().await.unwrap();

        let refreshed = store.get_position(position.id).await.unwrap();
        assert_eq!(refreshed.current_price, Some(dec!(50000)));
        assert!(store.get_alert(alert.id).unwrap().triggered);
        assert_eq!(
            store.get_order(order.id).await.unwrap().status,
            OrderStatus::Created
        );

        // Second pass: the paper exchange reports the fill and the linked
        // position closes.
        scheduler.run_once().await.unwrap();
        let executed = store.get_order(order.id).await.unwrap();
        assert_eq!(executed.status, OrderStatus::Executed);
        assert!(!store.get_position(position.id).await.unwrap().is_open());
    }

    #[tokio::test]
    async fn cancelled_price_cycle_stops_between_positions() {
        let store = Arc::new(MemoryStore::new());
        for _ in 0..3 {
            let p = store.add_position(1, "ETHUSDT", "BINANCE", AssetClass::Crypto, dec!(1), dec!(100));
            store.add_alert(p.id, AlertType::PriceAbove, dec!(1));
        }

        let source = Arc::new(StaticPriceSource::new("paper"));
        source.set_price("ETHUSDT", "BINANCE", dec!(200));
        let exchange = Arc::new(PaperExchange::new());
        let scheduler = scheduler_with(store.clone(), source, exchange);

        let (tx, rx) = watch::channel(true);
        let report = scheduler
            .run_price_cycle(AssetClass::Crypto, Some(&rx))
            .await
            .unwrap();
        drop(tx);

        // Valuation still ran, but no alert was evaluated.
        assert_eq!(report.refreshed, 3);
        assert_eq!(report.triggered, 0);
    }
}
