//! Order orchestrator.
//!
//! Runs only on an order decision. Steps are independent and best-effort:
//!
//! 1. allocate an order id and persist the `PENDING` order
//! 2. persist the `ORDER_CREATED` decision row
//! 3. estimate delivery (now + 2 days)
//! 4. emit exactly one `CreateOrder` command, fire-and-forget
//!
//! The command is emitted even when the order row could not be written;
//! downstream materialization does not depend on the store.

use chrono::Utc;
use tracing::{error, info, warn};

use replenish_core::OrderId;
use replenish_events::{CommandChannel, CreateOrderCommand};
use replenish_replenishment::{DecisionEngine, Order, Priority, StockEvent};

use super::audit;
use super::error::ProcessingError;
use super::outcome::{EventOutcome, ProcessingStage, Step, StepOutcome};
use crate::store::{ReplenishmentStore, Table};

pub(super) struct OrderRequest<'a> {
    pub quantity: i64,
    pub priority: Priority,
    pub reason: &'a str,
}

pub(super) async fn place_order<S, B>(
    store: Option<&S>,
    channel: &B,
    engine: &DecisionEngine,
    event: &StockEvent,
    request: OrderRequest<'_>,
    outcome: &mut EventOutcome,
) where
    S: ReplenishmentStore,
    B: CommandChannel<CreateOrderCommand>,
{
    let now = Utc::now();
    let order = match Order::pending(
        OrderId::allocate(now),
        event,
        request.quantity,
        request.priority,
        now,
    ) {
        Ok(order) => order,
        Err(e) => {
            error!(event_id = %event.id, error = %e, "order could not be built; abandoning event");
            outcome.abandon(ProcessingError::Invariant {
                message: e.to_string(),
            });
            return;
        }
    };

    info!(
        event_id = %event.id,
        order_id = %order.id,
        quantity = order.quantity,
        priority = order.priority.as_str(),
        "creating replenishment order"
    );

    let persisted = persist_order(store, &order).await;
    outcome.record(Step::PersistOrder, persisted);
    outcome.order_id = Some(order.id.clone());
    outcome.advance(ProcessingStage::OrderPending);

    let audited = audit::record_created(
        store,
        &event.id,
        &order.id,
        request.reason,
        event.days_of_supply,
        engine.threshold_used(),
    )
    .await;
    outcome.record(Step::AuditDecision, audited);
    outcome.advance(ProcessingStage::Audited);

    let command = CreateOrderCommand::for_order(&order, Utc::now());
    outcome.record(Step::EmitCommand, emit(channel, command));
}

async fn persist_order<S>(store: Option<&S>, order: &Order) -> StepOutcome
where
    S: ReplenishmentStore,
{
    let Some(store) = store else {
        return StepOutcome::Skipped;
    };

    match store.insert_order(order).await {
        Ok(()) => {
            info!(order_id = %order.id, "order persisted");
            StepOutcome::Completed
        }
        Err(e) => {
            warn!(order_id = %order.id, table = %Table::Orders, error = %e, "order insert failed");
            StepOutcome::Failed {
                error: ProcessingError::persistence(Table::Orders, &e),
            }
        }
    }
}

fn emit<B>(channel: &B, command: CreateOrderCommand) -> StepOutcome
where
    B: CommandChannel<CreateOrderCommand>,
{
    let order_id = command.order_id.clone();
    let command_id = command.command_id.clone();

    match channel.publish(command) {
        Ok(()) => {
            info!(order_id = %order_id, command_id = %command_id, "order command emitted");
            StepOutcome::Completed
        }
        Err(e) => {
            error!(order_id = %order_id, command_id = %command_id, error = %e, "order command emission failed");
            StepOutcome::Failed {
                error: ProcessingError::Emit {
                    message: e.to_string(),
                },
            }
        }
    }
}
