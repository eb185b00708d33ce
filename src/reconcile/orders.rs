// src/reconcile/orders.rs
use crate::domain::errors::{AppResult, ExchangeError, ExchangeResult};
use crate::domain::models::{AssetClass, OrderStatus, PendingOrder, PendingOrderType};
use crate::exchange::{ExchangeClient, ExchangeOrderStatus, OrderRequest};
use crate::pricing::PriceRouter;
use crate::reconcile::lease::LeaseMap;
use crate::store::{ExecutionEffect, NewPosition, OrderStore};
use chrono::Utc;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;

/// What one reconciliation attempt did to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStep {
    /// Trigger not crossed, or exchange order still open.
    Held,
    /// Submitted to the exchange (or an existing submission was adopted).
    Submitted,
    Executed,
    Cancelled,
    /// Transient failure recorded, will retry next cycle.
    Retried,
    /// Terminal ERROR.
    Errored,
    /// No price this cycle, or the order was already terminal.
    Skipped,
}

/// Tally of one order reconciliation cycle.
#[derive(Debug, Default)]
pub struct OrderCycleOutcome {
    pub submitted: usize,
    pub executed: usize,
    pub cancelled: usize,
    pub errored: usize,
    pub skipped: usize,
}

impl OrderCycleOutcome {
    fn record(&mut self, step: OrderStep) {
        match step {
            OrderStep::Submitted => self.submitted += 1,
            OrderStep::Executed => self.executed += 1,
            OrderStep::Cancelled => self.cancelled += 1,
            OrderStep::Errored => self.errored += 1,
            OrderStep::Skipped => self.skipped += 1,
            OrderStep::Held | OrderStep::Retried => {}
        }
    }
}

/// Drives pending stop-limit orders through their state machine against the
/// exchange.
///
/// WAITING orders are submitted once the market crosses their trigger price;
/// CREATED orders are polled until the exchange reports a fill or a
/// cancellation. Submissions carry a client-assigned order id that is stable
/// across retries, and the exchange is probed for that id before any
/// resubmission, so an ambiguous network failure cannot create a duplicate
/// order.
pub struct OrderReconciler {
    orders: Arc<dyn OrderStore>,
    router: Arc<PriceRouter>,
    exchange: Arc<dyn ExchangeClient>,
    max_retries: u32,
    call_timeout: tokio::time::Duration,
    crypto_ttl: chrono::Duration,
    equity_ttl: chrono::Duration,
}

impl OrderReconciler {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        router: Arc<PriceRouter>,
        exchange: Arc<dyn ExchangeClient>,
        max_retries: u32,
        call_timeout: tokio::time::Duration,
        crypto_ttl: chrono::Duration,
        equity_ttl: chrono::Duration,
    ) -> Self {
        Self {
            orders,
            router,
            exchange,
            max_retries,
            call_timeout,
            crypto_ttl,
            equity_ttl,
        }
    }

    /// Reconcile every active order, one lease-guarded attempt each.
    /// Per-order failures are isolated; one bad order never aborts the
    /// batch. Cancellation is honored between entities, never mid-call.
    pub async fn reconcile_all(
        &self,
        leases: &LeaseMap,
        cancel: Option<&tokio::sync::watch::Receiver<bool>>,
    ) -> AppResult<OrderCycleOutcome> {
        let mut outcome = OrderCycleOutcome::default();

        for order in self.orders.active_orders().await? {
            if cancel.is_some_and(|c| *c.borrow()) {
                log::info!("Order cycle cancelled, remaining orders wait for the next tick");
                break;
            }

            let Some(_lease) = leases.try_acquire("order", order.id) else {
                log::debug!("Order {} is leased elsewhere, skipping", order.id);
                outcome.skipped += 1;
                continue;
            };

            let order_id = order.id;
            match self.reconcile_order(order).await {
                Ok(step) => outcome.record(step),
                Err(e) => {
                    log::error!("Reconciliation of order {} failed: {}", order_id, e);
                    outcome.errored += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// One reconciliation attempt for a single order. `last_checked` is
    /// stamped whatever the outcome, for staleness monitoring.
    pub async fn reconcile_order(&self, mut order: PendingOrder) -> AppResult<OrderStep> {
        order.last_checked = Some(Utc::now());

        match order.status {
            OrderStatus::Waiting => self.reconcile_waiting(order).await,
            OrderStatus::Created => self.reconcile_created(order).await,
            _ => Ok(OrderStep::Skipped),
        }
    }

    async fn reconcile_waiting(&self, mut order: PendingOrder) -> AppResult<OrderStep> {
        let pair = order.trading_pair();
        let ttl = self.ttl_for(order.asset_class);

        let quote = match self.router.get_price(&pair, &order.venue, ttl).await {
            Ok(quote) => quote,
            Err(e) => {
                log::warn!("No price for order {} ({}): {}", order.id, pair, e);
                self.orders.update_order(&order).await?;
                return Ok(OrderStep::Skipped);
            }
        };

        if !order.trigger_crossed(quote.price) {
            self.orders.update_order(&order).await?;
            return Ok(OrderStep::Held);
        }

        log::info!(
            "Order {} trigger crossed: {} {} at {} (trigger {})",
            order.id,
            order.order_type,
            pair,
            quote.price,
            order.trigger_price
        );

        let client_order_id = order
            .client_order_id
            .clone()
            .unwrap_or_else(|| format!("pw-{}", order.id));
        order.client_order_id = Some(client_order_id.clone());

        // An earlier submission may have succeeded on the exchange while the
        // acknowledgement was lost. Probe before placing.
        match self.call(self.exchange.find_by_client_id(&client_order_id)).await {
            Ok(Some(existing)) => {
                log::info!(
                    "Order {} already exists on the exchange as {}, adopting",
                    order.id,
                    existing.exchange_order_id
                );
                self.mark_created(&mut order, existing.exchange_order_id).await?;
                Ok(OrderStep::Submitted)
            }
            Ok(None) => {
                let request = OrderRequest {
                    client_order_id,
                    symbol: pair,
                    side: order.order_type.side(),
                    limit_price: order.limit_price,
                    amount: order.amount,
                };

                match self.call(self.exchange.place_order(&request)).await {
                    Ok(placed) => {
                        log::info!(
                            "Order {} created on the exchange as {}",
                            order.id,
                            placed.exchange_order_id
                        );
                        self.mark_created(&mut order, placed.exchange_order_id).await?;
                        Ok(OrderStep::Submitted)
                    }
                    Err(e) if e.is_transient() => {
                        self.fail_transient(order, format!("order submission failed: {}", e))
                            .await
                    }
                    Err(e) => self.fail_terminal(order, format!("order rejected: {}", e)).await,
                }
            }
            Err(e) if e.is_transient() => {
                // Cannot submit safely without the probe answer.
                self.fail_transient(order, format!("idempotency probe failed: {}", e))
                    .await
            }
            Err(e) => self.fail_terminal(order, format!("idempotency probe rejected: {}", e)).await,
        }
    }

    async fn reconcile_created(&self, mut order: PendingOrder) -> AppResult<OrderStep> {
        let Some(exchange_order_id) = order.exchange_order_id.clone() else {
            return self
                .fail_terminal(order, "CREATED order has no exchange order id".to_string())
                .await;
        };

        match self.call(self.exchange.get_order_status(&exchange_order_id)).await {
            Ok(exchange_order) => match exchange_order.status {
                ExchangeOrderStatus::Executed => {
                    let executed_price = exchange_order.executed_price.unwrap_or(order.limit_price);
                    let now = Utc::now();
                    order.status = OrderStatus::Executed;
                    order.executed_at = Some(now);
                    order.error_message = None;

                    let effect = self.execution_effect(&order, executed_price, exchange_order.executed_quantity);
                    self.orders.apply_execution(&order, effect).await?;

                    log::info!(
                        "Order {} executed at {} (exchange order {})",
                        order.id,
                        executed_price,
                        exchange_order_id
                    );
                    Ok(OrderStep::Executed)
                }
                ExchangeOrderStatus::Cancelled => {
                    order.status = OrderStatus::Cancelled;
                    order.error_message = Some("cancelled on the exchange".to_string());
                    self.orders.update_order(&order).await?;
                    log::info!("Order {} was cancelled on the exchange", order.id);
                    Ok(OrderStep::Cancelled)
                }
                ExchangeOrderStatus::Open => {
                    self.orders.update_order(&order).await?;
                    Ok(OrderStep::Held)
                }
            },
            Err(ExchangeError::UnknownOrder(_)) => {
                order.status = OrderStatus::Cancelled;
                order.error_message = Some("order does not exist on the exchange".to_string());
                self.orders.update_order(&order).await?;
                log::warn!("Order {} unknown to the exchange, marking cancelled", order.id);
                Ok(OrderStep::Cancelled)
            }
            Err(e) if e.is_transient() => {
                // Exhaustion here is an ERROR on the query, not order loss:
                // the exchange-side order may still be live, so say so.
                self.fail_transient(
                    order,
                    format!(
                        "status check failed; exchange order {} may still be open: {}",
                        exchange_order_id, e
                    ),
                )
                .await
            }
            Err(e) => {
                self.fail_terminal(order, format!("status check rejected: {}", e))
                    .await
            }
        }
    }

    /// Side effect applied atomically with the EXECUTED flip.
    fn execution_effect(
        &self,
        order: &PendingOrder,
        executed_price: Decimal,
        executed_quantity: Option<Decimal>,
    ) -> ExecutionEffect {
        match order.order_type {
            PendingOrderType::StopLimitSell => match order.position {
                Some(id) => ExecutionEffect::ClosePosition {
                    id,
                    exit_price: executed_price,
                    exit_date: order.executed_at.unwrap_or_else(Utc::now),
                },
                None => {
                    log::warn!("Sell order {} has no linked position to close", order.id);
                    ExecutionEffect::None
                }
            },
            PendingOrderType::StopLimitBuy => {
                let quantity = executed_quantity.unwrap_or_else(|| {
                    if executed_price.is_zero() {
                        Decimal::ZERO
                    } else {
                        (order.amount / executed_price).round_dp(6)
                    }
                });
                // Positions are priced by the full pair symbol.
                ExecutionEffect::OpenPosition(NewPosition {
                    owner: order.owner,
                    category: order.category,
                    symbol: order.trading_pair(),
                    venue: order.venue.clone(),
                    asset_class: order.asset_class,
                    quantity,
                    entry_price: executed_price,
                    notes: Some(format!("Opened by stop-limit order {}", order.id)),
                })
            }
        }
    }

    async fn mark_created(
        &self,
        order: &mut PendingOrder,
        exchange_order_id: String,
    ) -> AppResult<()> {
        order.status = OrderStatus::Created;
        order.exchange_order_id = Some(exchange_order_id);
        order.retry_count = 0;
        order.error_message = None;
        self.orders.update_order(order).await?;
        Ok(())
    }

    /// Retry bookkeeping for a transient failure: bump the counter and keep
    /// the state, or go terminal once the budget is spent.
    async fn fail_transient(
        &self,
        mut order: PendingOrder,
        message: String,
    ) -> AppResult<OrderStep> {
        if order.retry_count >= self.max_retries {
            order.status = OrderStatus::Error;
            order.error_message = Some(message.clone());
            self.orders.update_order(&order).await?;
            log::error!(
                "Order {} exhausted {} retries: {}",
                order.id,
                self.max_retries,
                message
            );
            Ok(OrderStep::Errored)
        } else {
            order.retry_count += 1;
            order.error_message = Some(message.clone());
            self.orders.update_order(&order).await?;
            log::warn!(
                "Order {} attempt {}/{} failed: {}",
                order.id,
                order.retry_count,
                self.max_retries,
                message
            );
            Ok(OrderStep::Retried)
        }
    }

    async fn fail_terminal(&self, mut order: PendingOrder, message: String) -> AppResult<OrderStep> {
        order.status = OrderStatus::Error;
        order.error_message = Some(message.clone());
        self.orders.update_order(&order).await?;
        log::error!("Order {} failed terminally: {}", order.id, message);
        Ok(OrderStep::Errored)
    }

    fn ttl_for(&self, asset_class: AssetClass) -> chrono::Duration {
        match asset_class {
            AssetClass::Crypto => self.crypto_ttl,
            AssetClass::Equity => self.equity_ttl,
        }
    }

    /// Bound an exchange call so a stuck network path degrades to a skipped
    /// entity, not a hung cycle.
    async fn call<T, F>(&self, fut: F) -> ExchangeResult<T>
    where
        F: Future<Output = ExchangeResult<T>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ExchangeError::Connection(format!(
                "call timed out after {:?}",
                self.call_timeout
            ))),
        }
    }
}
