//! Stock event recorder: persists the raw event before decisioning.

use tracing::warn;

use replenish_replenishment::StockEvent;

use super::error::ProcessingError;
use super::outcome::StepOutcome;
use crate::store::{ReplenishmentStore, Table};

pub(super) async fn record_stock_event<S>(store: Option<&S>, event: &StockEvent) -> StepOutcome
where
    S: ReplenishmentStore,
{
    let Some(store) = store else {
        return StepOutcome::Skipped;
    };

    match store.insert_stock_event(event).await {
        Ok(()) => StepOutcome::Completed,
        Err(e) => {
            warn!(event_id = %event.id, table = %Table::StockEvents, error = %e, "stock event insert failed");
            StepOutcome::Failed {
                error: ProcessingError::persistence(Table::StockEvents, &e),
            }
        }
    }
}
