use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use replenish_replenishment::{Decision, ObservabilityRecord, Order, StockEvent};

/// Tables written by the processor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Table {
    StockEvents,
    Orders,
    DecisionLogs,
    EsbLogs,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::StockEvents => "StockEvents",
            Table::Orders => "Orders",
            Table::DecisionLogs => "DecisionLogs",
            Table::EsbLogs => "ESBLogs",
        }
    }
}

impl core::fmt::Display for Table {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store operation error.
///
/// - **Unavailable**: store unreachable, connection lost or already released
/// - **MissingTable**: the target table does not exist
/// - **Conflict**: unique key already present (e.g. a redelivered event id)
/// - **Constraint**: NOT NULL / CHECK violation
/// - **Query**: any other statement failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("table missing: {0}")]
    MissingTable(String),

    #[error("unique key conflict: {0}")]
    Conflict(String),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("query failed: {0}")]
    Query(String),
}

/// Append-only sink for the four record kinds produced per event.
///
/// Every method is attempted exactly once by the pipeline; implementations
/// must not retry internally.
#[async_trait]
pub trait ReplenishmentStore: Send + Sync {
    async fn insert_stock_event(&self, event: &StockEvent) -> Result<(), StoreError>;

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn insert_decision(&self, decision: &Decision) -> Result<(), StoreError>;

    async fn insert_observability(&self, record: &ObservabilityRecord) -> Result<(), StoreError>;

    /// Release the underlying connection. Called once at the end of a batch.
    async fn release(&self) {}
}

#[async_trait]
impl<S> ReplenishmentStore for Arc<S>
where
    S: ReplenishmentStore + ?Sized,
{
    async fn insert_stock_event(&self, event: &StockEvent) -> Result<(), StoreError> {
        (**self).insert_stock_event(event).await
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        (**self).insert_order(order).await
    }

    async fn insert_decision(&self, decision: &Decision) -> Result<(), StoreError> {
        (**self).insert_decision(decision).await
    }

    async fn insert_observability(&self, record: &ObservabilityRecord) -> Result<(), StoreError> {
        (**self).insert_observability(record).await
    }

    async fn release(&self) {
        (**self).release().await
    }
}

/// Opens one store connection per batch invocation.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    type Store: ReplenishmentStore;

    async fn connect(&self) -> Result<Self::Store, StoreError>;
}

#[async_trait]
impl<C> StoreConnector for Arc<C>
where
    C: StoreConnector + ?Sized,
{
    type Store = C::Store;

    async fn connect(&self) -> Result<Self::Store, StoreError> {
        (**self).connect().await
    }
}
