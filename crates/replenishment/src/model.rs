//! Replenishment records and their vocabularies.
//!
//! Every record here is written once and never updated by this system.
//! `Order::status` is later mutated by an external fulfilment process.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use replenish_core::{DecisionId, DomainError, DomainResult, LogId, OrderId, StockEventId};

/// Name this processor reports as `target_service` in observability rows.
pub const TARGET_SERVICE: &str = "StockEventProcessor";

/// Which architecture produced a record.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventSource {
    #[serde(rename = "SOA")]
    Soa,
    #[default]
    #[serde(rename = "Serverless")]
    Serverless,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Soa => "SOA",
            EventSource::Serverless => "Serverless",
        }
    }
}

impl FromStr for EventSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            s if s.eq_ignore_ascii_case("soa") => Ok(EventSource::Soa),
            s if s.eq_ignore_ascii_case("serverless") => Ok(EventSource::Serverless),
            other => Err(DomainError::validation(format!("unknown event source: {other}"))),
        }
    }
}

/// Urgency attached to a replenishment order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }
}

/// Lifecycle status of an order. Only `Pending` is ever written here.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    OrderCreated,
    OrderSkipped,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::OrderCreated => "ORDER_CREATED",
            DecisionType::OrderSkipped => "ORDER_SKIPPED",
        }
    }
}

/// Outcome reported in an observability row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Success,
    Failure,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Success => "SUCCESS",
            ProcessingStatus::Failure => "FAILURE",
        }
    }
}

/// Raw inventory telemetry for one hospital/product pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockEvent {
    pub id: StockEventId,
    pub hospital_id: String,
    pub product_code: String,
    pub current_stock_units: i64,
    pub daily_consumption_units: i64,
    pub days_of_supply: f64,
    pub source: EventSource,
    pub received_at: DateTime<Utc>,
}

/// Replenishment order, created in `Pending` state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub hospital_id: String,
    pub product_code: String,
    pub quantity: i64,
    pub priority: Priority,
    pub status: OrderStatus,
    pub source: EventSource,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Build a pending order for the stock event that triggered it.
    pub fn pending(
        id: OrderId,
        event: &StockEvent,
        quantity: i64,
        priority: Priority,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::invariant(format!(
                "order quantity must be positive, got {quantity}"
            )));
        }
        Ok(Self {
            id,
            hospital_id: event.hospital_id.clone(),
            product_code: event.product_code.clone(),
            quantity,
            priority,
            status: OrderStatus::Pending,
            source: event.source,
            created_at,
        })
    }
}

/// Append-only audit row explaining why an order was or was not created.
///
/// The constructors keep `order_id` and `decision_type` consistent: only
/// `OrderCreated` rows reference an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: DecisionId,
    pub event_id: StockEventId,
    pub order_id: Option<OrderId>,
    pub decision_type: DecisionType,
    pub reason: String,
    pub days_of_supply: f64,
    pub threshold_used: f64,
}

impl Decision {
    pub fn created(
        event_id: StockEventId,
        order_id: OrderId,
        reason: impl Into<String>,
        days_of_supply: f64,
        threshold_used: f64,
    ) -> Self {
        Self {
            id: DecisionId::generate(),
            event_id,
            order_id: Some(order_id),
            decision_type: DecisionType::OrderCreated,
            reason: reason.into(),
            days_of_supply,
            threshold_used,
        }
    }

    pub fn skipped(
        event_id: StockEventId,
        reason: impl Into<String>,
        days_of_supply: f64,
        threshold_used: f64,
    ) -> Self {
        Self {
            id: DecisionId::generate(),
            event_id,
            order_id: None,
            decision_type: DecisionType::OrderSkipped,
            reason: reason.into(),
            days_of_supply,
            threshold_used,
        }
    }
}

/// Per-event latency/status row (the `ESBLogs` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityRecord {
    pub id: LogId,
    /// Equals the stock event id.
    pub message_id: String,
    pub source_hospital_id: Option<String>,
    pub target_service: String,
    pub latency_ms: i64,
    pub status: ProcessingStatus,
}

impl ObservabilityRecord {
    pub fn new(
        message_id: impl Into<String>,
        source_hospital_id: Option<String>,
        latency_ms: u128,
        status: ProcessingStatus,
    ) -> Self {
        Self {
            id: LogId::generate(),
            message_id: message_id.into(),
            source_hospital_id,
            target_service: TARGET_SERVICE.to_string(),
            latency_ms: i64::try_from(latency_ms).unwrap_or(i64::MAX),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> StockEvent {
        StockEvent {
            id: "evt-1".parse().unwrap(),
            hospital_id: "HOSP-01".to_string(),
            product_code: "SALINE-500".to_string(),
            current_stock_units: 5,
            daily_consumption_units: 10,
            days_of_supply: 0.5,
            source: EventSource::Serverless,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn pending_order_copies_event_identity() {
        let ev = event();
        let order = Order::pending(OrderId::allocate(Utc::now()), &ev, 65, Priority::High, Utc::now())
            .unwrap();

        assert_eq!(order.hospital_id, "HOSP-01");
        assert_eq!(order.product_code, "SALINE-500");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.source, EventSource::Serverless);
    }

    #[test]
    fn pending_order_rejects_non_positive_quantity() {
        let ev = event();
        let err = Order::pending(OrderId::allocate(Utc::now()), &ev, 0, Priority::Urgent, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn skipped_decision_never_references_an_order() {
        let d = Decision::skipped("evt-1".parse().unwrap(), "Adequate stock: 5.0 days", 5.0, 2.0);
        assert_eq!(d.decision_type, DecisionType::OrderSkipped);
        assert!(d.order_id.is_none());
        assert!(d.id.as_str().starts_with("dec-"));
    }

    #[test]
    fn vocabularies_use_wire_spelling() {
        assert_eq!(serde_json::to_string(&Priority::Urgent).unwrap(), "\"URGENT\"");
        assert_eq!(serde_json::to_string(&EventSource::Soa).unwrap(), "\"SOA\"");
        assert_eq!(
            serde_json::to_string(&DecisionType::OrderSkipped).unwrap(),
            "\"ORDER_SKIPPED\""
        );
        assert_eq!("serverless".parse::<EventSource>().unwrap(), EventSource::Serverless);
        assert!("lambda".parse::<EventSource>().is_err());
    }

    #[test]
    fn observability_record_targets_this_processor() {
        let rec = ObservabilityRecord::new("evt-1", Some("HOSP-01".into()), 12, ProcessingStatus::Success);
        assert_eq!(rec.target_service, TARGET_SERVICE);
        assert_eq!(rec.latency_ms, 12);
        assert!(rec.id.as_str().starts_with("log-"));
    }
}
