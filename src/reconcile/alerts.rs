// src/reconcile/alerts.rs
use crate::domain::errors::AppResult;
use crate::domain::models::{Alert, AlertId, AlertType, Position};
use crate::notify::{format_alert_message, Channel, NotificationSink};
use crate::store::{AlertStore, PositionStore};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Result of one evaluation pass over a position's alerts.
#[derive(Debug, Default)]
pub struct EvaluationOutcome {
    pub triggered: Vec<AlertId>,
    pub notified: usize,
    /// Alerts skipped because their configuration cannot be evaluated
    /// (e.g. percentage threshold on a zero entry price), surfaced for the
    /// operator instead of crashing the batch.
    pub config_errors: Vec<(AlertId, String)>,
}

/// Evaluates armed alerts against freshly priced positions and dispatches
/// notifications at most once per crossing.
///
/// The trigger flip is persisted before delivery is attempted: the price
/// event is real even when the transport is down, so a failed dispatch
/// leaves the alert triggered-but-unsent and `retry_unsent` re-attempts
/// delivery without re-evaluating the price condition. Triggered alerts stay
/// triggered until an external collaborator resets them.
pub struct AlertEvaluator {
    alerts: Arc<dyn AlertStore>,
    positions: Arc<dyn PositionStore>,
    sink: Arc<dyn NotificationSink>,
    channels: Vec<Channel>,
}

impl AlertEvaluator {
    pub fn new(
        alerts: Arc<dyn AlertStore>,
        positions: Arc<dyn PositionStore>,
        sink: Arc<dyn NotificationSink>,
        channels: Vec<Channel>,
    ) -> Self {
        Self {
            alerts,
            positions,
            sink,
            channels,
        }
    }

    /// Evaluate every armed alert of `position` against its current price.
    pub async fn evaluate_position(&self, position: &Position) -> AppResult<EvaluationOutcome> {
        let mut outcome = EvaluationOutcome::default();

        let current = match position.current_price {
            Some(price) => price,
            None => return Ok(outcome),
        };

        for alert in self.alerts.armed_alerts(position.id).await? {
            match threshold_met(&alert, current, position.entry_price) {
                Ok(false) => {}
                Ok(true) => {
                    let now = Utc::now();
                    self.alerts.mark_triggered(alert.id, now).await?;
                    log::info!(
                        "Alert {} ({} {} @ {}) triggered for position {}",
                        alert.id,
                        position.symbol,
                        alert.alert_type,
                        alert.threshold,
                        position.id
                    );
                    outcome.triggered.push(alert.id);

                    if self.dispatch(&alert, position).await {
                        outcome.notified += 1;
                    }
                }
                Err(reason) => {
                    log::error!(
                        "Alert {} on position {} is misconfigured: {}",
                        alert.id,
                        position.id,
                        reason
                    );
                    outcome.config_errors.push((alert.id, reason));
                }
            }
        }

        Ok(outcome)
    }

    /// Delivery retry pass: re-dispatch alerts that triggered but whose
    /// notification never went out. Returns the number delivered.
    pub async fn retry_unsent(&self) -> AppResult<usize> {
        let mut delivered = 0;

        for alert in self.alerts.unnotified_alerts().await? {
            let position = match self.positions.get_position(alert.position).await {
                Ok(position) => position,
                Err(e) => {
                    log::warn!(
                        "Cannot retry notification for alert {}: {}",
                        alert.id,
                        e
                    );
                    continue;
                }
            };

            if self.dispatch(&alert, &position).await {
                delivered += 1;
            }
        }

        Ok(delivered)
    }

    /// Attempt delivery and mark the alert notified on success. Failures are
    /// logged and left for the retry pass.
    async fn dispatch(&self, alert: &Alert, position: &Position) -> bool {
        let message = format_alert_message(alert, position);
        match self
            .sink
            .notify(position.owner, alert.id, &message, &self.channels)
            .await
        {
            Ok(()) => match self.alerts.mark_notified(alert.id, Utc::now()).await {
                Ok(()) => true,
                Err(e) => {
                    log::error!("Failed to mark alert {} notified: {}", alert.id, e);
                    false
                }
            },
            Err(e) => {
                log::warn!(
                    "Notification for alert {} failed, will retry: {}",
                    alert.id,
                    e
                );
                false
            }
        }
    }
}

/// Whether the alert's predicate holds at `current`. A zero entry price on
/// percentage alerts is a configuration error, reported as `Err`.
fn threshold_met(alert: &Alert, current: Decimal, entry: Decimal) -> Result<bool, String> {
    match alert.alert_type {
        AlertType::PriceAbove => Ok(current >= alert.threshold),
        AlertType::PriceBelow => Ok(current <= alert.threshold),
        AlertType::PctIncrease => {
            if entry.is_zero() {
                return Err("entry price is zero, cannot evaluate percentage alert".to_string());
            }
            Ok((current - entry) / entry * Decimal::from(100) >= alert.threshold)
        }
        AlertType::PctDecrease => {
            if entry.is_zero() {
                return Err("entry price is zero, cannot evaluate percentage alert".to_string());
            }
            Ok((entry - current) / entry * Decimal::from(100) >= alert.threshold)
        }
    }
}
