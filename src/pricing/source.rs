// src/pricing/source.rs
use crate::domain::errors::{SourceError, SourceResult};
use crate::domain::models::Quote;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One external quote provider. Concrete wire formats (HTTP APIs, exchange
/// tickers) live behind this trait; the router only sees quotes or typed
/// failures. Priority is the order of registration on the router.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Short name used in logs and `Quote::source`.
    fn name(&self) -> &str;

    async fn fetch(&self, symbol: &str, venue: &str) -> SourceResult<Quote>;
}

/// Table-backed price source. Serves quotes from an in-memory table that can
/// be updated at runtime; used by the paper-mode daemon and by tests.
pub struct StaticPriceSource {
    name: String,
    table: Mutex<HashMap<(String, String), Decimal>>,
    fetch_count: AtomicUsize,
}

impl StaticPriceSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            table: Mutex::new(HashMap::new()),
            fetch_count: AtomicUsize::new(0),
        }
    }

    pub fn set_price(&self, symbol: &str, venue: &str, price: Decimal) {
        let mut table = self.table.lock().unwrap();
        table.insert((symbol.to_string(), venue.to_string()), price);
    }

    /// Number of fetches served so far, successful or not.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, symbol: &str, venue: &str) -> SourceResult<Quote> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        let price = {
            let table = self.table.lock().unwrap();
            table
                .get(&(symbol.to_string(), venue.to_string()))
                .copied()
        };

        match price {
            Some(price) => Ok(Quote {
                symbol: symbol.to_string(),
                venue: venue.to_string(),
                price,
                change: Decimal::ZERO,
                change_percent: Decimal::ZERO,
                previous_close: price,
                currency: "USD".to_string(),
                source: self.name.clone(),
                fetched_at: Utc::now(),
            }),
            None => Err(SourceError::NotFound(format!("{}@{}", symbol, venue))),
        }
    }
}
