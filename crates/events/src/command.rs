use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use replenish_core::{CommandId, OrderId};
use replenish_replenishment::{Order, Priority};

/// Command type constant carried by every order creation command.
pub const COMMAND_TYPE_CREATE_ORDER: &str = "CreateOrder";

/// Warehouse every order is routed to.
pub const WAREHOUSE_ID: &str = "CENTRAL-WAREHOUSE";

/// Fixed delivery estimate offset (no calendar logic).
pub const DELIVERY_LEAD_DAYS: i64 = 2;

/// An outbound command (instruction to a downstream system).
///
/// Commands represent **intent**: the downstream consumer decides whether and
/// how to materialize them. They are emitted fire-and-forget, so they must own
/// all of their data and be safe to move across threads.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn command_id(&self) -> &CommandId;

    /// Stable command type discriminator (e.g. "CreateOrder").
    fn command_type(&self) -> &'static str;
}

/// Command instructing the warehouse system to materialize an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderCommand {
    pub command_id: CommandId,
    pub command_type: String,
    pub order_id: OrderId,
    pub hospital_id: String,
    pub product_code: String,
    pub order_quantity: i64,
    pub priority: Priority,
    #[serde(with = "iso_utc")]
    pub estimated_delivery_date: DateTime<Utc>,
    pub warehouse_id: String,
    #[serde(with = "iso_utc")]
    pub timestamp: DateTime<Utc>,
}

impl CreateOrderCommand {
    /// Build the creation command for a freshly persisted order.
    pub fn for_order(order: &Order, now: DateTime<Utc>) -> Self {
        Self {
            command_id: CommandId::generate(),
            command_type: COMMAND_TYPE_CREATE_ORDER.to_string(),
            order_id: order.id.clone(),
            hospital_id: order.hospital_id.clone(),
            product_code: order.product_code.clone(),
            order_quantity: order.quantity,
            priority: order.priority,
            estimated_delivery_date: now + Duration::days(DELIVERY_LEAD_DAYS),
            warehouse_id: WAREHOUSE_ID.to_string(),
            timestamp: now,
        }
    }
}

impl Command for CreateOrderCommand {
    fn command_id(&self) -> &CommandId {
        &self.command_id
    }

    fn command_type(&self) -> &'static str {
        COMMAND_TYPE_CREATE_ORDER
    }
}

/// `2026-01-07T22:45:00.123456Z` timestamps (microseconds, `Z` suffix).
mod iso_utc {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
