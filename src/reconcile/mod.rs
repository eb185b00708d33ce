// src/reconcile/mod.rs
pub mod alerts;
pub mod lease;
pub mod orders;
pub mod scheduler;
pub mod valuer;

pub use alerts::{AlertEvaluator, EvaluationOutcome};
pub use lease::{Lease, LeaseMap};
pub use orders::{OrderCycleOutcome, OrderReconciler, OrderStep};
pub use scheduler::{CycleReport, ReconciliationScheduler, SchedulerIntervals};
pub use valuer::PositionValuer;
