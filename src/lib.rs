// src/lib.rs
pub mod config;
pub mod domain;
pub mod exchange;
pub mod notify;
pub mod pricing;
pub mod reconcile;
pub mod store;
