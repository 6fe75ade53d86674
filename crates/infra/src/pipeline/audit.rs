//! Decision audit writer.
//!
//! Every decoded event gets exactly one decision row, order or not.

use tracing::warn;

use replenish_core::{OrderId, StockEventId};
use replenish_replenishment::Decision;

use super::error::ProcessingError;
use super::outcome::StepOutcome;
use crate::store::{ReplenishmentStore, Table};

/// Audit the skip branch with the reason the engine produced.
pub(super) async fn record_skipped<S>(
    store: Option<&S>,
    event_id: &StockEventId,
    reason: &str,
    days_of_supply: f64,
    threshold_used: f64,
) -> StepOutcome
where
    S: ReplenishmentStore,
{
    let row = Decision::skipped(event_id.clone(), reason, days_of_supply, threshold_used);
    write(store, &row).await
}

/// Audit the order branch, referencing the allocated order.
pub(super) async fn record_created<S>(
    store: Option<&S>,
    event_id: &StockEventId,
    order_id: &OrderId,
    reason: &str,
    days_of_supply: f64,
    threshold_used: f64,
) -> StepOutcome
where
    S: ReplenishmentStore,
{
    let row = Decision::created(
        event_id.clone(),
        order_id.clone(),
        reason,
        days_of_supply,
        threshold_used,
    );
    write(store, &row).await
}

async fn write<S>(store: Option<&S>, row: &Decision) -> StepOutcome
where
    S: ReplenishmentStore,
{
    let Some(store) = store else {
        return StepOutcome::Skipped;
    };

    match store.insert_decision(row).await {
        Ok(()) => StepOutcome::Completed,
        Err(e) => {
            warn!(
                event_id = %row.event_id,
                decision_type = row.decision_type.as_str(),
                error = %e,
                "decision log insert failed"
            );
            StepOutcome::Failed {
                error: ProcessingError::persistence(Table::DecisionLogs, &e),
            }
        }
    }
}
