//! Durable replenishment store boundary.
//!
//! One store connection is acquired per batch invocation through a
//! `StoreConnector` and released when the batch ends. Writes are independent
//! statements: nothing here groups the rows of one event into a transaction.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryConnector, InMemoryStore};
pub use postgres::{PostgresConnector, PostgresStore};
pub use r#trait::{ReplenishmentStore, StoreConnector, StoreError, Table};
