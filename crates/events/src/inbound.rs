//! Inbound stock telemetry decoding.
//!
//! Payload shape (one message of a delivered batch):
//!
//! ```text
//! {eventId?, hospitalId, productCode, currentStockUnits, dailyConsumptionUnits, daysOfSupply, timestamp}
//! ```
//!
//! Missing optional fields are defaulted: a fresh `evt-` id, zero current
//! stock, one unit of daily consumption, and 99 days of supply. The 99-day
//! default keeps malformed telemetry from triggering orders.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use replenish_core::StockEventId;
use replenish_replenishment::{EventSource, StockEvent};

pub const DEFAULT_CURRENT_STOCK_UNITS: i64 = 0;
pub const DEFAULT_DAILY_CONSUMPTION_UNITS: i64 = 1;
pub const DEFAULT_DAYS_OF_SUPPLY: f64 = 99.0;

/// Malformed inbound payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl DecodeError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Decoded inbound telemetry, defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct StockEventPayload {
    pub event_id: StockEventId,
    pub hospital_id: String,
    pub product_code: String,
    pub current_stock_units: i64,
    pub daily_consumption_units: i64,
    pub days_of_supply: f64,
    /// Producer-side clock, when readable. Only used to log delivery lag;
    /// the stored event carries the receive time instead.
    pub reported_at: Option<DateTime<Utc>>,
}

impl StockEventPayload {
    /// Decode one raw message body.
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let obj = value.as_object().ok_or(DecodeError::NotAnObject)?;

        let event_id = match optional_string(obj, "eventId")? {
            Some(s) => s
                .parse::<StockEventId>()
                .map_err(|e| DecodeError::invalid("eventId", e.to_string()))?,
            None => StockEventId::generate(),
        };

        let hospital_id =
            optional_string(obj, "hospitalId")?.ok_or(DecodeError::MissingField("hospitalId"))?;
        let product_code =
            optional_string(obj, "productCode")?.ok_or(DecodeError::MissingField("productCode"))?;

        let current_stock_units =
            unit_count(obj, "currentStockUnits", DEFAULT_CURRENT_STOCK_UNITS)?;
        let daily_consumption_units =
            unit_count(obj, "dailyConsumptionUnits", DEFAULT_DAILY_CONSUMPTION_UNITS)?;
        let days_of_supply = days(obj, "daysOfSupply", DEFAULT_DAYS_OF_SUPPLY)?;

        let reported_at = obj.get("timestamp").and_then(Value::as_str).and_then(parse_timestamp);

        Ok(Self {
            event_id,
            hospital_id,
            product_code,
            current_stock_units,
            daily_consumption_units,
            days_of_supply,
            reported_at,
        })
    }

    /// Best-effort extraction of `eventId` from a body that may not decode.
    pub fn peek_event_id(body: &[u8]) -> Option<String> {
        let value: Value = serde_json::from_slice(body).ok()?;
        value
            .get("eventId")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    pub fn into_stock_event(self, source: EventSource, received_at: DateTime<Utc>) -> StockEvent {
        StockEvent {
            id: self.event_id,
            hospital_id: self.hospital_id,
            product_code: self.product_code,
            current_stock_units: self.current_stock_units,
            daily_consumption_units: self.daily_consumption_units,
            days_of_supply: self.days_of_supply,
            source,
            received_at,
        }
    }
}

fn optional_string(obj: &Map<String, Value>, field: &'static str) -> Result<Option<String>, DecodeError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(DecodeError::invalid(field, format!("expected string, got {other}"))),
    }
}

fn number(obj: &Map<String, Value>, field: &'static str) -> Result<Option<f64>, DecodeError> {
    let n = match obj.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| DecodeError::invalid(field, "not representable as a number"))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| DecodeError::invalid(field, e.to_string()))?,
        Some(other) => return Err(DecodeError::invalid(field, format!("expected number, got {other}"))),
    };
    if !n.is_finite() {
        return Err(DecodeError::invalid(field, "must be finite"));
    }
    Ok(Some(n))
}

fn unit_count(obj: &Map<String, Value>, field: &'static str, default: i64) -> Result<i64, DecodeError> {
    // Exact integers avoid the f64 round-trip.
    if let Some(i) = obj.get(field).and_then(Value::as_i64) {
        return non_negative(field, i);
    }
    match number(obj, field)? {
        None => Ok(default),
        Some(n) => non_negative(field, n.trunc() as i64),
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<i64, DecodeError> {
    if value < 0 {
        return Err(DecodeError::invalid(field, format!("must not be negative, got {value}")));
    }
    Ok(value)
}

fn days(obj: &Map<String, Value>, field: &'static str, default: f64) -> Result<f64, DecodeError> {
    Ok(number(obj, field)?.unwrap_or(default))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => Some(naive.and_utc()),
        Err(e) => {
            tracing::debug!(timestamp = raw, error = %e, "ignoring unreadable payload timestamp");
            None
        }
    }
}
