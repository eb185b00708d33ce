// src/store/memory.rs
use crate::domain::errors::{AppResult, StoreError, StoreResult};
use crate::domain::models::{
    Alert, AlertId, AlertType, AssetClass, OrderId, OwnerId, PendingOrder, Position, PositionId,
};
use crate::store::{AlertStore, ExecutionEffect, NewPosition, OrderStore, PositionStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// In-memory implementation of all three store contracts, used by the
/// paper-mode daemon and by tests. One mutex over the whole state gives the
/// atomicity the contracts require; none of the methods await while holding
/// it.
pub struct MemoryStore {
    inner: Mutex<State>,
}

#[derive(Default)]
struct State {
    positions: HashMap<PositionId, Position>,
    alerts: HashMap<AlertId, Alert>,
    orders: HashMap<OrderId, PendingOrder>,
    next_id: u64,
}

impl State {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn build_position(&mut self, new: NewPosition, at: DateTime<Utc>) -> Position {
        Position {
            id: self.allocate_id(),
            owner: new.owner,
            category: new.category,
            symbol: new.symbol,
            venue: new.venue,
            asset_class: new.asset_class,
            quantity: new.quantity,
            entry_price: new.entry_price,
            current_price: Some(new.entry_price),
            last_price_update: Some(at),
            exit_price: None,
            exit_date: None,
            notes: new.notes,
        }
    }
}

/// Serialized store contents, loadable at daemon startup.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub orders: Vec<PendingOrder>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(State::default()),
        }
    }

    /// Load store contents from a JSON snapshot file.
    pub fn from_snapshot_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        {
            let mut state = store.inner.lock().unwrap();
            for position in snapshot.positions {
                state.next_id = state.next_id.max(position.id);
                state.positions.insert(position.id, position);
            }
            for alert in snapshot.alerts {
                state.next_id = state.next_id.max(alert.id);
                state.alerts.insert(alert.id, alert);
            }
            for order in snapshot.orders {
                state.next_id = state.next_id.max(order.id);
                state.orders.insert(order.id, order);
            }
        }
        store
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.inner.lock().unwrap();
        Snapshot {
            positions: state.positions.values().cloned().collect(),
            alerts: state.alerts.values().cloned().collect(),
            orders: state.orders.values().cloned().collect(),
        }
    }

    // Seeding helpers for the daemon and tests.

    pub fn add_position(
        &self,
        owner: OwnerId,
        symbol: &str,
        venue: &str,
        asset_class: AssetClass,
        quantity: Decimal,
        entry_price: Decimal,
    ) -> Position {
        let mut state = self.inner.lock().unwrap();
        let position = Position {
            id: state.allocate_id(),
            owner,
            category: None,
            symbol: symbol.to_string(),
            venue: venue.to_string(),
            asset_class,
            quantity,
            entry_price,
            current_price: None,
            last_price_update: None,
            exit_price: None,
            exit_date: None,
            notes: None,
        };
        state.positions.insert(position.id, position.clone());
        position
    }

    pub fn add_alert(
        &self,
        position: PositionId,
        alert_type: AlertType,
        threshold: Decimal,
    ) -> Alert {
        let mut state = self.inner.lock().unwrap();
        let alert = Alert {
            id: state.allocate_id(),
            position,
            alert_type,
            threshold,
            is_active: true,
            triggered: false,
            last_triggered: None,
            notification_sent: false,
            last_notification_sent: None,
            notes: None,
        };
        state.alerts.insert(alert.id, alert.clone());
        alert
    }

    pub fn add_order(&self, mut order: PendingOrder) -> PendingOrder {
        let mut state = self.inner.lock().unwrap();
        order.id = state.allocate_id();
        state.orders.insert(order.id, order.clone());
        order
    }

    /// External collaborator action: re-arm a triggered alert.
    pub fn reset_alert(&self, id: AlertId) -> StoreResult<()> {
        let mut state = self.inner.lock().unwrap();
        let alert = state
            .alerts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("alert {}", id)))?;
        alert.triggered = false;
        alert.notification_sent = false;
        Ok(())
    }

    pub fn get_alert(&self, id: AlertId) -> StoreResult<Alert> {
        let state = self.inner.lock().unwrap();
        state
            .alerts
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("alert {}", id)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn open_positions(
        &self,
        owner: Option<OwnerId>,
        asset_class: Option<AssetClass>,
    ) -> StoreResult<Vec<Position>> {
        let state = self.inner.lock().unwrap();
        let mut positions: Vec<Position> = state
            .positions
            .values()
            .filter(|p| p.is_open())
            .filter(|p| owner.map_or(true, |o| p.owner == o))
            .filter(|p| asset_class.map_or(true, |c| p.asset_class == c))
            .cloned()
            .collect();
        positions.sort_by_key(|p| p.id);
        Ok(positions)
    }

    async fn get_position(&self, id: PositionId) -> StoreResult<Position> {
        let state = self.inner.lock().unwrap();
        state
            .positions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("position {}", id)))
    }

    async fn insert_position(&self, new: NewPosition) -> StoreResult<Position> {
        let mut state = self.inner.lock().unwrap();
        let position = state.build_position(new, Utc::now());
        state.positions.insert(position.id, position.clone());
        Ok(position)
    }

    async fn update_valuation(
        &self,
        id: PositionId,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut state = self.inner.lock().unwrap();
        let position = state
            .positions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("position {}", id)))?;
        position.current_price = Some(price);
        position.last_price_update = Some(at);
        Ok(())
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn armed_alerts(&self, position: PositionId) -> StoreResult<Vec<Alert>> {
        let state = self.inner.lock().unwrap();
        let mut alerts: Vec<Alert> = state
            .alerts
            .values()
            .filter(|a| a.position == position && a.is_armed())
            .cloned()
            .collect();
        alerts.sort_by_key(|a| a.id);
        Ok(alerts)
    }

    async fn unnotified_alerts(&self) -> StoreResult<Vec<Alert>> {
        let state = self.inner.lock().unwrap();
        let mut alerts: Vec<Alert> = state
            .alerts
            .values()
            .filter(|a| a.triggered && !a.notification_sent && a.is_active)
            .cloned()
            .collect();
        alerts.sort_by_key(|a| a.id);
        Ok(alerts)
    }

    async fn mark_triggered(&self, id: AlertId, at: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.inner.lock().unwrap();
        let alert = state
            .alerts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("alert {}", id)))?;
        alert.triggered = true;
        alert.last_triggered = Some(at);
        Ok(())
    }

    async fn mark_notified(&self, id: AlertId, at: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.inner.lock().unwrap();
        let alert = state
            .alerts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("alert {}", id)))?;
        alert.notification_sent = true;
        alert.last_notification_sent = Some(at);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn active_orders(&self) -> StoreResult<Vec<PendingOrder>> {
        let state = self.inner.lock().unwrap();
        let mut orders: Vec<PendingOrder> = state
            .orders
            .values()
            .filter(|o| o.is_active())
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.id);
        Ok(orders)
    }

    async fn get_order(&self, id: OrderId) -> StoreResult<PendingOrder> {
        let state = self.inner.lock().unwrap();
        state
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("order {}", id)))
    }

    async fn update_order(&self, order: &PendingOrder) -> StoreResult<()> {
        let mut state = self.inner.lock().unwrap();
        if !state.orders.contains_key(&order.id) {
            return Err(StoreError::NotFound(format!("order {}", order.id)));
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn apply_execution(
        &self,
        order: &PendingOrder,
        effect: ExecutionEffect,
    ) -> StoreResult<()> {
        let mut state = self.inner.lock().unwrap();
        if !state.orders.contains_key(&order.id) {
            return Err(StoreError::NotFound(format!("order {}", order.id)));
        }

        match effect {
            ExecutionEffect::ClosePosition {
                id,
                exit_price,
                exit_date,
            } => {
                let position = state
                    .positions
                    .get_mut(&id)
                    .ok_or_else(|| StoreError::NotFound(format!("position {}", id)))?;
                position.exit_price = Some(exit_price);
                position.exit_date = Some(exit_date);
            }
            ExecutionEffect::OpenPosition(new) => {
                let position = state.build_position(new, Utc::now());
                state.positions.insert(position.id, position);
            }
            ExecutionEffect::None => {}
        }

        state.orders.insert(order.id, order.clone());
        Ok(())
    }
}
