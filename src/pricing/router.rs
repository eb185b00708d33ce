// src/pricing/router.rs
use crate::domain::errors::{PriceError, PriceResult};
use crate::domain::models::Quote;
use crate::pricing::cache::PriceCache;
use crate::pricing::source::PriceSource;
use std::sync::Arc;
use tokio::time::Duration;

/// Routes price lookups through the cache and an ordered list of sources.
///
/// Sources are tried in registration order (cheapest/most reliable first);
/// the first success is cached and returned. Each source call is bounded by
/// `source_timeout` so a stuck provider degrades to a fallthrough, never a
/// hung cycle.
pub struct PriceRouter {
    cache: Arc<PriceCache>,
    sources: Vec<Arc<dyn PriceSource>>,
    source_timeout: Duration,
}

impl PriceRouter {
    pub fn new(cache: Arc<PriceCache>, source_timeout: Duration) -> Self {
        Self {
            cache,
            sources: Vec::new(),
            source_timeout,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn PriceSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Fetch a quote for (symbol, venue), serving from cache when the entry
    /// is younger than `ttl`. All sources failing yields
    /// `PriceError::Unavailable`; callers skip the symbol for this cycle.
    pub async fn get_price(
        &self,
        symbol: &str,
        venue: &str,
        ttl: chrono::Duration,
    ) -> PriceResult<Quote> {
        if let Some(quote) = self.cache.get(symbol, venue, ttl) {
            log::debug!("Cache hit for {}@{}: {}", symbol, venue, quote.price);
            return Ok(quote);
        }

        for source in &self.sources {
            match tokio::time::timeout(self.source_timeout, source.fetch(symbol, venue)).await {
                Ok(Ok(quote)) => {
                    log::debug!(
                        "Fetched {}@{} = {} from {}",
                        symbol,
                        venue,
                        quote.price,
                        source.name()
                    );
                    self.cache.insert(quote.clone());
                    return Ok(quote);
                }
                Ok(Err(e)) => {
                    log::warn!("Source {} failed for {}@{}: {}", source.name(), symbol, venue, e);
                }
                Err(_) => {
                    log::warn!(
                        "Source {} timed out for {}@{} after {:?}",
                        source.name(),
                        symbol,
                        venue,
                        self.source_timeout
                    );
                }
            }
        }

        Err(PriceError::Unavailable {
            symbol: symbol.to_string(),
            venue: venue.to_string(),
            attempts: self.sources.len(),
        })
    }
}
