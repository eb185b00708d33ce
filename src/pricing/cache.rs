// src/pricing/cache.rs
use crate::domain::models::Quote;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Time-bounded quote cache keyed by (symbol, venue).
///
/// Entries are replaced atomically under a single mutex and expire lazily on
/// lookup; capacity is unbounded since the symbol universe is bounded by
/// active positions. The cache is explicitly constructed and injected so
/// tests can run against isolated instances.
pub struct PriceCache {
    entries: Mutex<HashMap<(String, String), Quote>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached quote for (symbol, venue) if it is younger than
    /// `ttl`. Stale entries are evicted on the way out.
    pub fn get(&self, symbol: &str, venue: &str, ttl: Duration) -> Option<Quote> {
        let key = (symbol.to_string(), venue.to_string());
        let mut entries = self.entries.lock().unwrap();

        match entries.get(&key) {
            Some(quote) if quote.age(Utc::now()) < ttl => Some(quote.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Insert or replace the entry for the quote's (symbol, venue) key.
    pub fn insert(&self, quote: Quote) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert((quote.symbol.clone(), quote.venue.clone()), quote);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(symbol: &str, price: rust_decimal::Decimal) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            venue: "NASDAQ".to_string(),
            price,
            change: dec!(0),
            change_percent: dec!(0),
            previous_close: price,
            currency: "USD".to_string(),
            source: "test".to_string(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn hit_within_ttl() {
        let cache = PriceCache::new();
        cache.insert(quote("AAPL", dec!(190)));

        let hit = cache.get("AAPL", "NASDAQ", Duration::seconds(240));
        assert_eq!(hit.map(|q| q.price), Some(dec!(190)));
    }

    #[test]
    fn stale_entry_is_evicted() {
        let cache = PriceCache::new();
        let mut old = quote("AAPL", dec!(190));
        old.fetched_at = Utc::now() - Duration::seconds(300);
        cache.insert(old);

        assert!(cache.get("AAPL", "NASDAQ", Duration::seconds(240)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_are_per_venue() {
        let cache = PriceCache::new();
        cache.insert(quote("AAPL", dec!(190)));

        assert!(cache.get("AAPL", "NYSE", Duration::seconds(240)).is_none());
        assert!(cache.get("MSFT", "NASDAQ", Duration::seconds(240)).is_none());
    }

    #[test]
    fn insert_replaces_entry() {
        let cache = PriceCache::new();
        cache.insert(quote("AAPL", dec!(190)));
        cache.insert(quote("AAPL", dec!(191)));

        let hit = cache.get("AAPL", "NASDAQ", Duration::seconds(240));
        assert_eq!(hit.map(|q| q.price), Some(dec!(191)));
        assert_eq!(cache.len(), 1);
    }
}
