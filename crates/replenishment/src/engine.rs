//! Replenishment decision engine.
//!
//! Maps the stock state carried by one telemetry event to an order decision:
//!
//! - `days_of_supply >= critical` → no order
//! - `urgent <= days_of_supply < critical` → order, `HIGH` priority
//! - `days_of_supply < urgent` → order, `URGENT` priority
//!
//! Ordered quantity tops stock up to `restock_target_days` of consumption and
//! is never less than one day of consumption.

use serde::{Deserialize, Serialize};

use replenish_core::{DomainError, DomainResult};

use crate::model::Priority;

/// Immutable thresholds driving the decision engine.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplenishmentPolicy {
    /// Below this many days of supply an order is required.
    pub critical_threshold_days: f64,
    /// Below this many days of supply the order is `URGENT`.
    pub urgent_threshold_days: f64,
    /// Days of consumption an order aims to restore.
    pub restock_target_days: i64,
}

impl Default for ReplenishmentPolicy {
    fn default() -> Self {
        Self {
            critical_threshold_days: 2.0,
            urgent_threshold_days: 1.0,
            restock_target_days: 7,
        }
    }
}

impl ReplenishmentPolicy {
    /// Build a validated policy.
    pub fn new(
        critical_threshold_days: f64,
        urgent_threshold_days: f64,
        restock_target_days: i64,
    ) -> DomainResult<Self> {
        if !critical_threshold_days.is_finite() || !urgent_threshold_days.is_finite() {
            return Err(DomainError::validation("thresholds must be finite"));
        }
        if urgent_threshold_days <= 0.0 {
            return Err(DomainError::validation("urgent threshold must be positive"));
        }
        if urgent_threshold_days > critical_threshold_days {
            return Err(DomainError::validation(format!(
                "urgent threshold ({urgent_threshold_days}) must not exceed critical threshold ({critical_threshold_days})"
            )));
        }
        if restock_target_days < 1 {
            return Err(DomainError::validation("restock target must be at least one day"));
        }
        Ok(Self {
            critical_threshold_days,
            urgent_threshold_days,
            restock_target_days,
        })
    }
}

/// Result of evaluating one stock state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum OrderDecision {
    Order {
        quantity: i64,
        priority: Priority,
        reason: String,
    },
    Skip {
        reason: String,
    },
}

impl OrderDecision {
    pub fn should_order(&self) -> bool {
        matches!(self, OrderDecision::Order { .. })
    }

    pub fn priority(&self) -> Option<Priority> {
        match self {
            OrderDecision::Order { priority, .. } => Some(*priority),
            OrderDecision::Skip { .. } => None,
        }
    }

    /// Ordered quantity; zero when no order is needed.
    pub fn quantity(&self) -> i64 {
        match self {
            OrderDecision::Order { quantity, .. } => *quantity,
            OrderDecision::Skip { .. } => 0,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            OrderDecision::Order { reason, .. } | OrderDecision::Skip { reason } => reason,
        }
    }
}

/// Stateless, deterministic replenishment policy evaluator.
#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    policy: ReplenishmentPolicy,
}

impl DecisionEngine {
    pub fn new(policy: ReplenishmentPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ReplenishmentPolicy {
        &self.policy
    }

    /// Threshold recorded with every decision.
    pub fn threshold_used(&self) -> f64 {
        self.policy.critical_threshold_days
    }

    pub fn evaluate(
        &self,
        days_of_supply: f64,
        daily_consumption: i64,
        current_stock: i64,
    ) -> OrderDecision {
        let p = &self.policy;

        if days_of_supply >= p.critical_threshold_days {
            return OrderDecision::Skip {
                reason: format!("Adequate stock: {days_of_supply:.1} days"),
            };
        }

        let target_stock = daily_consumption.saturating_mul(p.restock_target_days);
        let deficit = target_stock.saturating_sub(current_stock);
        // A zero-consumption product still gets a one-unit order.
        let quantity = deficit.max(daily_consumption).max(1);

        let (priority, reason) = if days_of_supply < p.urgent_threshold_days {
            (
                Priority::Urgent,
                format!(
                    "CRITICAL: {days_of_supply:.1} days (< {:.1})",
                    p.urgent_threshold_days
                ),
            )
        } else {
            (
                Priority::High,
                format!(
                    "LOW STOCK: {days_of_supply:.1} days (< {:.1})",
                    p.critical_threshold_days
                ),
            )
        };

        OrderDecision::Order {
            quantity,
            priority,
            reason,
        }
    }
}
