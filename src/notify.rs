// src/notify.rs
use crate::domain::errors::NotifyResult;
use crate::domain::models::{Alert, AlertId, AlertType, OwnerId, Position};
use async_trait::async_trait;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Telegram,
    Push,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Telegram => "telegram",
            Channel::Push => "push",
            Channel::Sms => "sms",
        }
    }
}

/// Transport for triggered-alert notifications. Delivery is fire-and-forget
/// from the evaluator's perspective; failures are logged and retried on the
/// next eligible pass, never re-evaluated.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        owner: OwnerId,
        alert: AlertId,
        message: &str,
        channels: &[Channel],
    ) -> NotifyResult<()>;
}

/// Default sink that writes notifications to the log. Real transports
/// (Telegram bot, push, SMS) plug in behind the same trait.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(
        &self,
        owner: OwnerId,
        alert: AlertId,
        message: &str,
        channels: &[Channel],
    ) -> NotifyResult<()> {
        let channels: Vec<&str> = channels.iter().map(Channel::as_str).collect();
        log::info!(
            "Notification for user {} (alert {}, channels {:?}): {}",
            owner,
            alert,
            channels,
            message
        );
        Ok(())
    }
}

/// Human-readable message for a triggered alert, including position context.
pub fn format_alert_message(alert: &Alert, position: &Position) -> String {
    let ticker = &position.symbol;
    let current = position.current_price.unwrap_or(Decimal::ZERO);
    let entry = position.entry_price;

    let mut message = match alert.alert_type {
        AlertType::PriceAbove => format!(
            "{} price is now ${:.4}, above your ${:.4} threshold.",
            ticker, current, alert.threshold
        ),
        AlertType::PriceBelow => format!(
            "{} price is now ${:.4}, below your ${:.4} threshold.",
            ticker, current, alert.threshold
        ),
        AlertType::PctIncrease if !entry.is_zero() => {
            let pct = (current - entry) / entry * Decimal::from(100);
            format!(
                "{} increased by {:.2}%, above your {:.2}% threshold. Current price: ${:.4}",
                ticker, pct, alert.threshold, current
            )
        }
        AlertType::PctDecrease if !entry.is_zero() => {
            let pct = (entry - current) / entry * Decimal::from(100);
            format!(
                "{} decreased by {:.2}%, above your {:.2}% threshold. Current price: ${:.4}",
                ticker, pct, alert.threshold, current
            )
        }
        _ => format!(
            "{} price alert triggered. Current price: ${:.4}",
            ticker, current
        ),
    };

    if let (Some(pnl), Some(pnl_pct)) = (position.profit_loss(), position.profit_loss_percent()) {
        message.push_str(&format!(" P&L: ${:.2} ({:.2}%).", pnl, pnl_pct));
    }

    if let Some(notes) = position.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        message.push_str(&format!("\n\nNotes: {}", notes));
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AssetClass;
    use rust_decimal_macros::dec;

    fn position(current: Decimal, entry: Decimal) -> Position {
        Position {
            id: 1,
            owner: 1,
            category: None,
            symbol: "BTC".to_string(),
            venue: "BINANCE".to_string(),
            asset_class: AssetClass::Crypto,
            quantity: dec!(1),
            entry_price: entry,
            current_price: Some(current),
            last_price_update: None,
            exit_price: None,
            exit_date: None,
            notes: None,
        }
    }

    fn alert(alert_type: AlertType, threshold: Decimal) -> Alert {
        Alert {
            id: 1,
            position: 1,
            alert_type,
            threshold,
            is_active: true,
            triggered: true,
            last_triggered: None,
            notification_sent: false,
            last_notification_sent: None,
            notes: None,
        }
    }

    #[test]
    fn price_above_message_names_threshold() {
        let message = format_alert_message(
            &alert(AlertType::PriceAbove, dec!(100)),
            &position(dec!(101), dec!(90)),
        );
        assert!(message.contains("above your $100.0000 threshold"));
    }

    #[test]
    fn pct_message_with_zero_entry_falls_back() {
        let message = format_alert_message(
            &alert(AlertType::PctIncrease, dec!(10)),
            &position(dec!(101), dec!(0)),
        );
        assert!(message.contains("price alert triggered"));
    }
}
