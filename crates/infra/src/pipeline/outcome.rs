//! Per-event and per-batch processing outcomes.

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use replenish_core::OrderId;
use replenish_replenishment::{OrderDecision, ProcessingStatus};

use super::error::ProcessingError;

/// Progress of one event through the pipeline.
///
/// ```text
/// RECEIVED → RAW_PERSISTED → DECIDED → {ORDER_PENDING | SKIPPED} → AUDITED → OBSERVED
///     └──────────────┴────────────┴──────────────┴───────────────────┴──→ ABANDONED
/// ```
///
/// Stages track pipeline position, not write success: a failed best-effort
/// write is recorded in the step list and the event still moves on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStage {
    Received,
    RawPersisted,
    Decided,
    OrderPending,
    Skipped,
    Audited,
    Observed,
    Abandoned,
}

impl ProcessingStage {
    pub fn allows(self, next: ProcessingStage) -> bool {
        use ProcessingStage::*;
        match (self, next) {
            (Observed | Abandoned, _) => false,
            (_, Abandoned) => true,
            (Received, RawPersisted)
            | (RawPersisted, Decided)
            | (Decided, OrderPending | Skipped)
            | (OrderPending | Skipped, Audited)
            | (Audited, Observed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStage::Observed | ProcessingStage::Abandoned)
    }
}

/// Individually attempted pipeline steps.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    RecordStockEvent,
    PersistOrder,
    AuditDecision,
    EmitCommand,
    RecordObservability,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Completed,
    /// Not attempted (no store connection, or suppressed by mode).
    Skipped,
    Failed { error: ProcessingError },
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: Step,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Everything that happened to one message of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventOutcome {
    /// Position within the delivered batch.
    pub index: usize,
    pub event_id: Option<String>,
    pub hospital_id: Option<String>,
    pub stage: ProcessingStage,
    pub decision: Option<OrderDecision>,
    pub order_id: Option<OrderId>,
    pub steps: Vec<StepRecord>,
    pub abandon_reason: Option<ProcessingError>,
    pub latency_ms: u64,
    /// Status written to the observability table, if a row was written.
    pub observed_status: Option<ProcessingStatus>,
}

impl EventOutcome {
    pub fn received(index: usize) -> Self {
        Self {
            index,
            event_id: None,
            hospital_id: None,
            stage: ProcessingStage::Received,
            decision: None,
            order_id: None,
            steps: Vec::new(),
            abandon_reason: None,
            latency_ms: 0,
            observed_status: None,
        }
    }

    pub fn advance(&mut self, next: ProcessingStage) {
        if self.stage.allows(next) {
            self.stage = next;
        } else {
            debug!(index = self.index, from = ?self.stage, to = ?next, "ignoring stage transition");
        }
    }

    pub fn abandon(&mut self, reason: ProcessingError) {
        self.advance(ProcessingStage::Abandoned);
        self.abandon_reason = Some(reason);
    }

    pub fn record(&mut self, step: Step, outcome: StepOutcome) {
        self.steps.push(StepRecord { step, outcome });
    }

    pub fn step(&self, step: Step) -> Option<&StepOutcome> {
        self.steps.iter().find(|r| r.step == step).map(|r| &r.outcome)
    }

    pub fn is_abandoned(&self) -> bool {
        self.stage == ProcessingStage::Abandoned
    }

    /// Every failure observed for this event, abandonment first.
    pub fn errors(&self) -> Vec<&ProcessingError> {
        self.abandon_reason
            .iter()
            .chain(self.steps.iter().filter_map(|r| match &r.outcome {
                StepOutcome::Failed { error } => Some(error),
                _ => None,
            }))
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        !self.errors().is_empty()
    }
}

/// Aggregate counters over a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub decoded: usize,
    pub abandoned: usize,
    pub order_decisions: usize,
    pub skip_decisions: usize,
    pub failed_steps: usize,
}

/// Result of one batch invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub store_connected: bool,
    pub connection_error: Option<ProcessingError>,
    pub elapsed_ms: u64,
    pub summary: BatchSummary,
    pub events: Vec<EventOutcome>,
}

impl BatchReport {
    pub fn new(
        batch_id: Uuid,
        connection_error: Option<ProcessingError>,
        elapsed_ms: u64,
        events: Vec<EventOutcome>,
    ) -> Self {
        let mut summary = BatchSummary {
            total: events.len(),
            ..BatchSummary::default()
        };
        for e in &events {
            if e.event_id.is_some() && e.decision.is_some() {
                summary.decoded += 1;
            }
            if e.is_abandoned() {
                summary.abandoned += 1;
            }
            match &e.decision {
                Some(d) if d.should_order() => summary.order_decisions += 1,
                Some(_) => summary.skip_decisions += 1,
                None => {}
            }
            summary.failed_steps += e.steps.iter().filter(|s| s.outcome.is_failed()).count();
        }

        Self {
            batch_id,
            store_connected: connection_error.is_none(),
            connection_error,
            elapsed_ms,
            summary,
            events,
        }
    }

    pub fn event(&self, index: usize) -> Option<&EventOutcome> {
        self.events.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProcessingStage::*;

    #[test]
    fn happy_paths_are_allowed() {
        for path in [
            [Received, RawPersisted, Decided, OrderPending, Audited, Observed],
            [Received, RawPersisted, Decided, Skipped, Audited, Observed],
        ] {
            for pair in path.windows(2) {
                assert!(pair[0].allows(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
            }
        }
    }

    #[test]
    fn terminal_stages_are_final_and_skips_are_refused() {
        assert!(!Observed.allows(Abandoned));
        assert!(!Abandoned.allows(Observed));
        assert!(!Received.allows(Decided));
        assert!(!OrderPending.allows(Skipped));
        assert!(Decided.allows(Abandoned));
        assert!(Observed.is_terminal() && Abandoned.is_terminal());
    }

    #[test]
    fn invalid_transition_keeps_current_stage() {
        let mut outcome = EventOutcome::received(0);
        outcome.advance(Audited);
        assert_eq!(outcome.stage, Received);
    }

    #[test]
    fn errors_aggregate_abandonment_and_failed_steps() {
        let mut outcome = EventOutcome::received(3);
        outcome.record(Step::RecordStockEvent, StepOutcome::Completed);
        outcome.record(
            Step::EmitCommand,
            StepOutcome::Failed {
                error: ProcessingError::Emit {
                    message: "broker down".into(),
                },
            },
        );
        assert_eq!(outcome.errors().len(), 1);

        outcome.abandon(ProcessingError::Invariant {
            message: "quantity".into(),
        });
        let errors = outcome.errors();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], ProcessingError::Invariant { .. }));
        assert!(outcome.is_abandoned());
    }

    #[test]
    fn step_records_serialize_flat() {
        let rec = StepRecord {
            step: Step::AuditDecision,
            outcome: StepOutcome::Skipped,
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json, serde_json::json!({"step": "audit_decision", "outcome": "skipped"}));
    }
}
