// src/domain/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Price error: {0}")]
    Price(#[from] PriceError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure of a single price source. The router maps an exhausted source
/// list to `PriceError::Unavailable`; individual source errors never reach
/// valuation code.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Symbol not found: {0}")]
    NotFound(String),

    #[error("Source unreachable: {0}")]
    Unreachable(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum PriceError {
    /// Every configured source failed for this symbol. Callers skip the
    /// entity for the current cycle; a price of zero is never synthesized.
    #[error("No price available for {symbol}@{venue} after trying {attempts} source(s)")]
    Unavailable {
        symbol: String,
        venue: String,
        attempts: usize,
    },
}

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Business rejection (bad symbol, insufficient funds, filter breach).
    /// Never retried.
    #[error("Order rejected: {0}")]
    Rejected(String),

    /// The exchange does not know the referenced order.
    #[error("Unknown order: {0}")]
    UnknownOrder(String),
}

impl ExchangeError {
    /// Transient errors are retried with bounded attempts; the rest
    /// terminate the order immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExchangeError::Connection(_) | ExchangeError::RateLimited(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflicting update: {0}")]
    Conflict(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

// Result type aliases for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type SourceResult<T> = Result<T, SourceError>;
pub type PriceResult<T> = Result<T, PriceError>;
pub type ExchangeResult<T> = Result<T, ExchangeError>;
pub type NotifyResult<T> = Result<T, NotificationError>;
pub type StoreResult<T> = Result<T, StoreError>;
