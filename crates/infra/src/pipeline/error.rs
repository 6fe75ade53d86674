use serde::Serialize;
use thiserror::Error;

use crate::store::{StoreError, Table};

/// Failure taxonomy for one event (or one batch, for `ConnectionSetup`).
///
/// Carried as data in the batch report; none of these abort a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessingError {
    /// Malformed inbound payload; the event is abandoned.
    #[error("decode failed: {message}")]
    Decode { message: String },

    /// A single write failed; remaining steps still run.
    #[error("write to {table} failed: {message}")]
    Persistence { table: Table, message: String },

    /// The outbound command could not be handed to the transport.
    #[error("command emission failed: {message}")]
    Emit { message: String },

    /// The store was unreachable at batch start; persistence is skipped.
    #[error("store connection failed: {message}")]
    ConnectionSetup { message: String },

    /// A record could not be built (domain invariant); the event is abandoned.
    #[error("invariant violated: {message}")]
    Invariant { message: String },

    /// The redelivery policy refused the event.
    #[error("event refused as redelivery: {message}")]
    Redelivered { message: String },
}

impl ProcessingError {
    pub fn persistence(table: Table, err: &StoreError) -> Self {
        Self::Persistence {
            table,
            message: err.to_string(),
        }
    }

    pub fn is_emit(&self) -> bool {
        matches!(self, ProcessingError::Emit { .. })
    }
}
