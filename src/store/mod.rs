// src/store/mod.rs
// Persistence contracts for the reconciliation engine. Implementations must
// apply each method atomically; the per-entity lease held by the scheduler
// guarantees a single writer per position/order at a time.

pub mod memory;

use crate::domain::errors::StoreResult;
use crate::domain::models::{
    Alert, AlertId, AssetClass, CategoryId, OrderId, OwnerId, PendingOrder, Position, PositionId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub use memory::MemoryStore;

/// Fields of a position created by order execution.
#[derive(Debug, Clone)]
pub struct NewPosition {
    pub owner: OwnerId,
    pub category: Option<CategoryId>,
    pub symbol: String,
    pub venue: String,
    pub asset_class: AssetClass,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub notes: Option<String>,
}

/// Position side effect applied together with an order's EXECUTED flip.
#[derive(Debug, Clone)]
pub enum ExecutionEffect {
    /// Sell execution: close the linked position at the execution price.
    ClosePosition {
        id: PositionId,
        exit_price: Decimal,
        exit_date: DateTime<Utc>,
    },
    /// Buy execution: open a position at the execution price.
    OpenPosition(NewPosition),
    /// No linked entity (e.g. the position was deleted externally).
    None,
}

#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Open positions (no exit date), optionally filtered by owner and
    /// asset class.
    async fn open_positions(
        &self,
        owner: Option<OwnerId>,
        asset_class: Option<AssetClass>,
    ) -> StoreResult<Vec<Position>>;

    async fn get_position(&self, id: PositionId) -> StoreResult<Position>;

    async fn insert_position(&self, position: NewPosition) -> StoreResult<Position>;

    /// Write only the valuation fields, leaving the rest of the record
    /// untouched.
    async fn update_valuation(
        &self,
        id: PositionId,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Active, non-triggered alerts for a position.
    async fn armed_alerts(&self, position: PositionId) -> StoreResult<Vec<Alert>>;

    /// Triggered alerts whose notification has not been delivered yet.
    async fn unnotified_alerts(&self) -> StoreResult<Vec<Alert>>;

    async fn mark_triggered(&self, id: AlertId, at: DateTime<Utc>) -> StoreResult<()>;

    async fn mark_notified(&self, id: AlertId, at: DateTime<Utc>) -> StoreResult<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Orders in WAITING or CREATED, i.e. still reconciled each cycle.
    async fn active_orders(&self) -> StoreResult<Vec<PendingOrder>>;

    async fn get_order(&self, id: OrderId) -> StoreResult<PendingOrder>;

    async fn update_order(&self, order: &PendingOrder) -> StoreResult<()>;

    /// Persist the order's EXECUTED flip and its position side effect in one
    /// atomic step. A crash before this call is recoverable: the order stays
    /// CREATED and the next cycle re-polls the exchange for ground truth.
    async fn apply_execution(
        &self,
        order: &PendingOrder,
        effect: ExecutionEffect,
    ) -> StoreResult<()>;
}
