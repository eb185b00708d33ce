// src/reconcile/valuer.rs
use crate::domain::errors::AppResult;
use crate::domain::models::{AssetClass, OwnerId, Position};
use crate::pricing::PriceRouter;
use crate::store::PositionStore;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Walks open positions and refreshes their valuations through the price
/// router. A single unpriceable symbol never aborts the batch; the position
/// keeps its stale value and is retried next cycle.
pub struct PositionValuer {
    positions: Arc<dyn PositionStore>,
    router: Arc<PriceRouter>,
    crypto_ttl: Duration,
    equity_ttl: Duration,
}

impl PositionValuer {
    pub fn new(
        positions: Arc<dyn PositionStore>,
        router: Arc<PriceRouter>,
        crypto_ttl: Duration,
        equity_ttl: Duration,
    ) -> Self {
        Self {
            positions,
            router,
            crypto_ttl,
            equity_ttl,
        }
    }

    fn ttl_for(&self, asset_class: AssetClass) -> Duration {
        match asset_class {
            AssetClass::Crypto => self.crypto_ttl,
            AssetClass::Equity => self.equity_ttl,
        }
    }

    /// Refresh every open position matching the filters and return the count
    /// successfully updated.
    pub async fn refresh_positions(
        &self,
        owner: Option<OwnerId>,
        asset_class: Option<AssetClass>,
    ) -> AppResult<usize> {
        Ok(self.refresh_detailed(owner, asset_class).await?.len())
    }

    /// Like `refresh_positions` but returns the refreshed records with their
    /// new valuations, for alert evaluation in the same cycle.
    pub async fn refresh_detailed(
        &self,
        owner: Option<OwnerId>,
        asset_class: Option<AssetClass>,
    ) -> AppResult<Vec<Position>> {
        let open = self.positions.open_positions(owner, asset_class).await?;
        let mut updated = Vec::new();

        for mut position in open {
            let ttl = self.ttl_for(position.asset_class);
            match self
                .router
                .get_price(&position.symbol, &position.venue, ttl)
                .await
            {
                Ok(quote) => {
                    let now = Utc::now();
                    self.positions
                        .update_valuation(position.id, quote.price, now)
                        .await?;
                    position.current_price = Some(quote.price);
                    position.last_price_update = Some(now);
                    updated.push(position);
                }
                Err(e) => {
                    log::warn!(
                        "Skipping valuation of position {} ({}): {}",
                        position.id,
                        position.symbol,
                        e
                    );
                }
            }
        }

        if !updated.is_empty() {
            log::info!("Updated {} position valuation(s)", updated.len());
        }
        Ok(updated)
    }
}
