// src/domain/mod.rs
pub mod errors;
pub mod models;

// Re-export common types for convenience
pub use errors::{
    AppError, AppResult, ExchangeError, ExchangeResult, NotificationError, NotifyResult,
    PriceError, PriceResult, SourceError, SourceResult, StoreError, StoreResult,
};
pub use models::{
    Alert, AlertId, AlertType, AssetClass, CategoryId, OrderId, OrderSide, OrderStatus, OwnerId,
    PendingOrder, PendingOrderType, Position, PositionId, Quote,
};
