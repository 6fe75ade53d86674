//! Prefixed string identifiers.
//!
//! Every record in the replenishment store is keyed by a human-readable
//! string (`evt-…`, `dec-…`, `ORD-…`). Upstream producers may supply their
//! own event ids, so identifiers are strings rather than raw UUIDs.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of an inbound stock telemetry event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockEventId(String);

/// Identifier of a decision log row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionId(String);

/// Identifier of an observability (ESB) log row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(String);

/// Identifier of an outbound command message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(String);

/// Identifier of a replenishment order.
///
/// Format: `ORD-<YYYYMMDD>-<8 uppercase hex>`. The suffix is random, so ids are
/// practically but not cryptographically unique; two orders created on the
/// same UTC day collide with probability 1 / 2^32 per pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

macro_rules! impl_prefixed_id {
    ($t:ty, $prefix:literal, $name:literal) => {
        impl $t {
            /// Generate a fresh identifier (`<prefix>-<uuid v4>`).
            pub fn generate() -> Self {
                Self(format!("{}-{}", $prefix, Uuid::new_v4()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::invalid_id(format!("{}: empty", $name)));
                }
                Ok(Self(trimmed.to_string()))
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }
    };
}

impl_prefixed_id!(StockEventId, "evt", "StockEventId");
impl_prefixed_id!(DecisionId, "dec", "DecisionId");
impl_prefixed_id!(LogId, "log", "LogId");
impl_prefixed_id!(CommandId, "cmd", "CommandId");

impl OrderId {
    /// Allocate an order id for an order created at `now`.
    pub fn allocate(now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        Self(format!("ORD-{}-{}", now.format("%Y%m%d"), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OrderId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '-');
        let (Some("ORD"), Some(date), Some(suffix)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(DomainError::invalid_id(format!("OrderId: expected ORD-<date>-<suffix>, got {s}")));
        };
        if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::invalid_id(format!("OrderId: bad date segment in {s}")));
        }
        if suffix.is_empty() {
            return Err(DomainError::invalid_id(format!("OrderId: empty suffix in {s}")));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<OrderId> for String {
    fn from(value: OrderId) -> Self {
        value.0
    }
}
