// src/exchange/mod.rs
pub mod paper;

use crate::domain::errors::ExchangeResult;
use crate::domain::models::OrderSide;
use async_trait::async_trait;
use rust_decimal::Decimal;

pub use paper::PaperExchange;

/// Exchange-side view of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOrderStatus {
    Open,
    Executed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ExchangeOrder {
    pub exchange_order_id: String,
    pub client_order_id: String,
    pub status: ExchangeOrderStatus,
    pub executed_price: Option<Decimal>,
    pub executed_quantity: Option<Decimal>,
}

/// Submission parameters for a stop-limit order whose trigger has crossed.
/// `client_order_id` is assigned by the reconciler and stable across
/// retries, so the exchange can deduplicate ambiguous resubmissions.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub limit_price: Decimal,
    pub amount: Decimal,
}

/// Client for the external order-execution service.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn place_order(&self, request: &OrderRequest) -> ExchangeResult<ExchangeOrder>;

    async fn get_order_status(&self, exchange_order_id: &str) -> ExchangeResult<ExchangeOrder>;

    /// Idempotency probe: look up an order by the client-assigned id before
    /// resubmitting after an ambiguous failure.
    async fn find_by_client_id(
        &self,
        client_order_id: &str,
    ) -> ExchangeResult<Option<ExchangeOrder>>;

    async fn cancel_order(&self, exchange_order_id: &str) -> ExchangeResult<()>;
}
