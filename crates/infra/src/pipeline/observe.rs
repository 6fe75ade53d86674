//! Observability recorder: one latency/status row per event.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use tracing::{debug, warn};

use replenish_core::StockEventId;
use replenish_replenishment::{ObservabilityRecord, ProcessingStatus};

use super::error::ProcessingError;
use super::outcome::{EventOutcome, ProcessingStage, Step, StepOutcome};
use crate::store::{ReplenishmentStore, Table};

/// Which events get an observability row.
///
/// - `RecordFailures`: every event, `FAILURE` when any error was seen.
/// - `Legacy`: only events that reached the end without an emit error,
///   always as `SUCCESS`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ObservabilityMode {
    #[default]
    RecordFailures,
    Legacy,
}

impl ObservabilityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservabilityMode::RecordFailures => "record-failures",
            ObservabilityMode::Legacy => "legacy",
        }
    }
}

impl fmt::Display for ObservabilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown observability mode {0:?} (expected \"record-failures\" or \"legacy\")")]
pub struct UnknownObservabilityMode(String);

impl FromStr for ObservabilityMode {
    type Err = UnknownObservabilityMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "record-failures" | "record_failures" => Ok(ObservabilityMode::RecordFailures),
            "legacy" => Ok(ObservabilityMode::Legacy),
            _ => Err(UnknownObservabilityMode(s.to_string())),
        }
    }
}

/// Status the row would carry, or `None` when the mode suppresses it.
fn status_for(mode: ObservabilityMode, outcome: &EventOutcome) -> Option<ProcessingStatus> {
    match mode {
        ObservabilityMode::RecordFailures if outcome.has_failures() => {
            Some(ProcessingStatus::Failure)
        }
        ObservabilityMode::RecordFailures => Some(ProcessingStatus::Success),
        ObservabilityMode::Legacy => {
            let emit_failed = outcome.errors().iter().any(|e| e.is_emit());
            (!outcome.is_abandoned() && !emit_failed).then_some(ProcessingStatus::Success)
        }
    }
}

/// Measure latency from `started`, write the row, and close the event.
pub(super) async fn record_observation<S>(
    store: Option<&S>,
    mode: ObservabilityMode,
    started: Instant,
    outcome: &mut EventOutcome,
) where
    S: ReplenishmentStore,
{
    let latency = started.elapsed().as_millis();
    outcome.latency_ms = u64::try_from(latency).unwrap_or(u64::MAX);

    let step = match (store, status_for(mode, outcome)) {
        (_, None) => {
            debug!(index = outcome.index, mode = %mode, "observability row suppressed");
            StepOutcome::Skipped
        }
        (None, Some(_)) => StepOutcome::Skipped,
        (Some(store), Some(status)) => {
            let message_id = outcome
                .event_id
                .clone()
                .unwrap_or_else(|| StockEventId::generate().into_string());
            let row = ObservabilityRecord::new(message_id, outcome.hospital_id.clone(), latency, status);

            match store.insert_observability(&row).await {
                Ok(()) => {
                    outcome.observed_status = Some(status);
                    StepOutcome::Completed
                }
                Err(e) => {
                    warn!(message_id = %row.message_id, table = %Table::EsbLogs, error = %e, "observability insert failed");
                    StepOutcome::Failed {
                        error: ProcessingError::persistence(Table::EsbLogs, &e),
                    }
                }
            }
        }
    };

    outcome.record(Step::RecordObservability, step);
    if !outcome.is_abandoned() {
        outcome.advance(ProcessingStage::Observed);
    }
}
