// src/exchange/paper.rs
use crate::domain::errors::{ExchangeError, ExchangeResult};
use crate::domain::models::OrderSide;
use crate::exchange::{ExchangeClient, ExchangeOrder, ExchangeOrderStatus, OrderRequest};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-process exchange simulation for paper mode and tests.
///
/// Orders are accepted at `place_order` and fill at the limit price on the
/// next status poll, which is enough to exercise the whole reconciliation
/// state machine. Duplicate client order ids return the already-created
/// order, matching real exchange semantics.
pub struct PaperExchange {
    orders: Mutex<HashMap<String, ExchangeOrder>>,
    by_client_id: Mutex<HashMap<String, String>>,
    sequence: AtomicU64,
    place_count: AtomicUsize,
}

impl PaperExchange {
    pub fn new() -> Self {
        Self {
            orders: Mutex::new(HashMap::new()),
            by_client_id: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            place_count: AtomicUsize::new(0),
        }
    }

    /// Orders actually created on the exchange, duplicates excluded.
    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    /// Raw `place_order` invocations, duplicates included.
    pub fn place_count(&self) -> usize {
        self.place_count.load(Ordering::SeqCst)
    }

    fn fill_quantity(request: &OrderRequest) -> Decimal {
        match request.side {
            // Buy amounts are quote currency; convert at the fill price.
            OrderSide::Buy => (request.amount / request.limit_price).round_dp(6),
            OrderSide::Sell => request.amount,
        }
    }
}

impl Default for PaperExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeClient for PaperExchange {
    async fn place_order(&self, request: &OrderRequest) -> ExchangeResult<ExchangeOrder> {
        self.place_count.fetch_add(1, Ordering::SeqCst);

        {
            let by_client_id = self.by_client_id.lock().unwrap();
            if let Some(existing_id) = by_client_id.get(&request.client_order_id) {
                let orders = self.orders.lock().unwrap();
                if let Some(existing) = orders.get(existing_id) {
                    log::debug!(
                        "Duplicate client order id {}, returning existing order {}",
                        request.client_order_id,
                        existing_id
                    );
                    return Ok(existing.clone());
                }
            }
        }

        let exchange_order_id = format!("paper-{}", self.sequence.fetch_add(1, Ordering::SeqCst));
        let order = ExchangeOrder {
            exchange_order_id: exchange_order_id.clone(),
            client_order_id: request.client_order_id.clone(),
            status: ExchangeOrderStatus::Open,
            executed_price: Some(request.limit_price),
            executed_quantity: Some(Self::fill_quantity(request)),
        };

        self.orders
            .lock()
            .unwrap()
            .insert(exchange_order_id.clone(), order.clone());
        self.by_client_id
            .lock()
            .unwrap()
            .insert(request.client_order_id.clone(), exchange_order_id);

        Ok(order)
    }

    async fn get_order_status(&self, exchange_order_id: &str) -> ExchangeResult<ExchangeOrder> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(exchange_order_id)
            .ok_or_else(|| ExchangeError::UnknownOrder(exchange_order_id.to_string()))?;

        // Paper fill: an open order executes on its first poll.
        if order.status == ExchangeOrderStatus::Open {
            order.status = ExchangeOrderStatus::Executed;
        }

        Ok(order.clone())
    }

    async fn find_by_client_id(
        &self,
        client_order_id: &str,
    ) -> ExchangeResult<Option<ExchangeOrder>> {
        let by_client_id = self.by_client_id.lock().unwrap();
        let orders = self.orders.lock().unwrap();
        Ok(by_client_id
            .get(client_order_id)
            .and_then(|id| orders.get(id))
            .cloned())
    }

    async fn cancel_order(&self, exchange_order_id: &str) -> ExchangeResult<()> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(exchange_order_id)
            .ok_or_else(|| ExchangeError::UnknownOrder(exchange_order_id.to_string()))?;
        order.status = ExchangeOrderStatus::Cancelled;
        Ok(())
    }
}
