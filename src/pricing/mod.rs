// src/pricing/mod.rs
pub mod cache;
pub mod router;
pub mod source;

pub use cache::PriceCache;
pub use router::PriceRouter;
pub use source::{PriceSource, StaticPriceSource};
