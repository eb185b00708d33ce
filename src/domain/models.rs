// src/domain/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type OwnerId = u64;
pub type CategoryId = u64;
pub type PositionId = u64;
pub type AlertId = u64;
pub type OrderId = u64;

/// Asset class of a tracked symbol. Crypto and equities run on independent
/// reconciliation cadences and cache TTLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    Crypto,
    Equity,
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AssetClass::Crypto => write!(f, "crypto"),
            AssetClass::Equity => write!(f, "equity"),
        }
    }
}

/// A single quote from one price source. Ephemeral: quotes are consumed to
/// update positions, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub venue: String,
    pub price: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    pub previous_close: Decimal,
    pub currency: String,
    /// Name of the source that produced the quote, for diagnostics.
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

impl Quote {
    /// Age of the quote relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.fetched_at
    }
}

/// A held trading position. Price fields are mutated only by the valuer,
/// exit fields only by order execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub owner: OwnerId,
    pub category: Option<CategoryId>,
    pub symbol: String,
    pub venue: String,
    pub asset_class: AssetClass,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub current_price: Option<Decimal>,
    pub last_price_update: Option<DateTime<Utc>>,
    pub exit_price: Option<Decimal>,
    pub exit_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Position {
    /// A position is open while it has no exit date. Closed positions are
    /// excluded from price refresh and alert evaluation.
    pub fn is_open(&self) -> bool {
        self.exit_date.is_none()
    }

    /// Total position size in quote currency at entry.
    pub fn position_size(&self) -> Decimal {
        self.quantity * self.entry_price
    }

    /// Profit/loss in quote currency. Uses exit price when the position is
    /// closed, current price otherwise.
    pub fn profit_loss(&self) -> Option<Decimal> {
        let reference = self.exit_price.or(self.current_price)?;
        Some((reference - self.entry_price) * self.quantity)
    }

    /// Profit/loss as a percentage of the entry price. `None` when the
    /// entry price is zero or no reference price exists.
    pub fn profit_loss_percent(&self) -> Option<Decimal> {
        if self.entry_price.is_zero() {
            return None;
        }
        let reference = self.exit_price.or(self.current_price)?;
        Some((reference - self.entry_price) / self.entry_price * Decimal::from(100))
    }
}

/// Threshold predicate attached to an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertType {
    PriceAbove,
    PriceBelow,
    PctIncrease,
    PctDecrease,
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AlertType::PriceAbove => write!(f, "PRICE_ABOVE"),
            AlertType::PriceBelow => write!(f, "PRICE_BELOW"),
            AlertType::PctIncrease => write!(f, "PCT_INCREASE"),
            AlertType::PctDecrease => write!(f, "PCT_DECREASE"),
        }
    }
}

/// A user-defined price alert bound to a position.
///
/// `triggered` is sticky: once set it stays set until an external
/// collaborator resets it (user acknowledgement), so a later crossing of the
/// same threshold cannot re-notify. `notification_sent` may lag `triggered`
/// when delivery failed; the retry pass re-attempts delivery without
/// re-evaluating the price condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub position: PositionId,
    pub alert_type: AlertType,
    pub threshold: Decimal,
    pub is_active: bool,
    pub triggered: bool,
    pub last_triggered: Option<DateTime<Utc>>,
    pub notification_sent: bool,
    pub last_notification_sent: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Alert {
    /// An alert is armed when it is active and has not yet fired.
    pub fn is_armed(&self) -> bool {
        self.is_active && !self.triggered
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingOrderType {
    StopLimitBuy,
    StopLimitSell,
}

impl PendingOrderType {
    pub fn side(&self) -> OrderSide {
        match self {
            PendingOrderType::StopLimitBuy => OrderSide::Buy,
            PendingOrderType::StopLimitSell => OrderSide::Sell,
        }
    }
}

impl fmt::Display for PendingOrderType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PendingOrderType::StopLimitBuy => write!(f, "STOP_LIMIT_BUY"),
            PendingOrderType::StopLimitSell => write!(f, "STOP_LIMIT_SELL"),
        }
    }
}

/// Pending order lifecycle. `Executed`, `Cancelled` and `Error` (after retry
/// exhaustion) are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Waiting,
    Created,
    Executed,
    Cancelled,
    Error,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Executed | OrderStatus::Cancelled | OrderStatus::Error
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OrderStatus::Waiting => write!(f, "WAITING"),
            OrderStatus::Created => write!(f, "CREATED"),
            OrderStatus::Executed => write!(f, "EXECUTED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// A conditional stop-limit order reconciled against the exchange.
///
/// For buy orders `amount` is denominated in the quote currency; for sell
/// orders it is the asset quantity. Sell orders link the position to close on
/// execution; buy orders optionally link the category the new position joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOrder {
    pub id: OrderId,
    pub owner: OwnerId,
    pub order_type: PendingOrderType,
    pub symbol: String,
    pub currency: String,
    pub venue: String,
    pub asset_class: AssetClass,
    pub limit_price: Decimal,
    pub trigger_price: Decimal,
    pub amount: Decimal,
    pub exchange_order_id: Option<String>,
    pub client_order_id: Option<String>,
    pub status: OrderStatus,
    pub last_checked: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub position: Option<PositionId>,
    pub category: Option<CategoryId>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl PendingOrder {
    /// Trading pair submitted to the exchange, e.g. BTC + USDT -> BTCUSDT.
    pub fn trading_pair(&self) -> String {
        format!("{}{}", self.symbol, self.currency)
    }

    /// Active orders are still reconciled each cycle.
    pub fn is_active(&self) -> bool {
        matches!(self.status, OrderStatus::Waiting | OrderStatus::Created)
    }

    /// Whether `price` satisfies the trigger in the order's directional
    /// sense: buys arm when the market falls to the trigger, sells when it
    /// rises to it.
    pub fn trigger_crossed(&self, price: Decimal) -> bool {
        match self.order_type.side() {
            OrderSide::Buy => price <= self.trigger_price,
            OrderSide::Sell => price >= self.trigger_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sell_order(trigger: Decimal) -> PendingOrder {
        PendingOrder {
            id: 1,
            owner: 1,
            order_type: PendingOrderType::StopLimitSell,
            symbol: "BTC".to_string(),
            currency: "USDT".to_string(),
            venue: "BINANCE".to_string(),
            asset_class: AssetClass::Crypto,
            limit_price: dec!(99),
            trigger_price: trigger,
            amount: dec!(0.5),
            exchange_order_id: None,
            client_order_id: None,
            status: OrderStatus::Waiting,
            last_checked: None,
            error_message: None,
            retry_count: 0,
            position: None,
            category: None,
            executed_at: None,
        }
    }

    #[test]
    fn trading_pair_concatenates_symbol_and_currency() {
        assert_eq!(sell_order(dec!(100)).trading_pair(), "BTCUSDT");
    }

    #[test]
    fn sell_trigger_crosses_upward() {
        let order = sell_order(dec!(100));
        assert!(!order.trigger_crossed(dec!(90)));
        assert!(order.trigger_crossed(dec!(100)));
        assert!(order.trigger_crossed(dec!(101)));
    }

    #[test]
    fn buy_trigger_crosses_downward() {
        let mut order = sell_order(dec!(100));
        order.order_type = PendingOrderType::StopLimitBuy;
        assert!(order.trigger_crossed(dec!(99)));
        assert!(!order.trigger_crossed(dec!(101)));
    }

    #[test]
    fn profit_loss_prefers_exit_price() {
        let position = Position {
            id: 1,
            owner: 1,
            category: None,
            symbol: "BTC".to_string(),
            venue: "BINANCE".to_string(),
            asset_class: AssetClass::Crypto,
            quantity: dec!(2),
            entry_price: dec!(100),
            current_price: Some(dec!(150)),
            last_price_update: None,
            exit_price: Some(dec!(120)),
            exit_date: Some(Utc::now()),
            notes: None,
        };
        assert!(!position.is_open());
        assert_eq!(position.profit_loss(), Some(dec!(40)));
        assert_eq!(position.profit_loss_percent(), Some(dec!(20)));
    }

    #[test]
    fn profit_loss_percent_none_on_zero_entry() {
        let position = Position {
            id: 1,
            owner: 1,
            category: None,
            symbol: "X".to_string(),
            venue: "NASDAQ".to_string(),
            asset_class: AssetClass::Equity,
            quantity: dec!(1),
            entry_price: Decimal::ZERO,
            current_price: Some(dec!(10)),
            last_price_update: None,
            exit_price: None,
            exit_date: None,
            notes: None,
        };
        assert_eq!(position.profit_loss_percent(), None);
    }
}
