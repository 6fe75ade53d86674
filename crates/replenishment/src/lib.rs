//! Replenishment domain module.
//!
//! This crate contains the business rules for hospital stock replenishment,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod engine;
pub mod model;

pub use engine::{DecisionEngine, OrderDecision, ReplenishmentPolicy};
pub use model::{
    Decision, DecisionType, EventSource, ObservabilityRecord, Order, OrderStatus, Priority,
    ProcessingStatus, StockEvent, TARGET_SERVICE,
};
