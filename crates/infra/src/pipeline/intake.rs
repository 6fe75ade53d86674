//! Batch intake loop.
//!
//! One invocation handles one delivered batch: a single store connection
//! is opened up front, every message is processed in order, and the
//! connection is released at the end whatever happened in between.

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use replenish_events::{CommandChannel, CreateOrderCommand, StockEventPayload};
use replenish_replenishment::{DecisionEngine, EventSource, OrderDecision, StockEvent};

use super::audit;
use super::error::ProcessingError;
use super::observe::{ObservabilityMode, record_observation};
use super::orchestrator::{OrderRequest, place_order};
use super::outcome::{BatchReport, EventOutcome, ProcessingStage, Step};
use super::recorder::record_stock_event;
use super::redelivery::{Admission, AdmitAll, RedeliveryPolicy};
use crate::store::{ReplenishmentStore, StoreConnector};

/// Per-deployment knobs that are not part of the decision policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessorSettings {
    /// Stamped on every stock event and order.
    pub source: EventSource,
    pub observability_mode: ObservabilityMode,
}

pub struct BatchProcessor<C, B, R = AdmitAll> {
    connector: C,
    channel: B,
    engine: DecisionEngine,
    redelivery: R,
    settings: ProcessorSettings,
}

impl<C, B> BatchProcessor<C, B, AdmitAll>
where
    C: StoreConnector,
    B: CommandChannel<CreateOrderCommand>,
{
    pub fn new(connector: C, channel: B, engine: DecisionEngine, settings: ProcessorSettings) -> Self {
        Self {
            connector,
            channel,
            engine,
            redelivery: AdmitAll,
            settings,
        }
    }
}

impl<C, B, R> BatchProcessor<C, B, R>
where
    C: StoreConnector,
    B: CommandChannel<CreateOrderCommand>,
    R: RedeliveryPolicy,
{
    /// Swap the redelivery policy consulted before any write.
    pub fn with_redelivery<R2: RedeliveryPolicy>(self, redelivery: R2) -> BatchProcessor<C, B, R2> {
        BatchProcessor {
            connector: self.connector,
            channel: self.channel,
            engine: self.engine,
            redelivery,
            settings: self.settings,
        }
    }

    pub fn channel(&self) -> &B {
        &self.channel
    }

    /// Process one delivered batch. Never fails: every problem is captured
    /// in the returned report.
    pub async fn process_batch<I, M>(&self, messages: I) -> BatchReport
    where
        I: IntoIterator<Item = M>,
        M: AsRef<[u8]>,
    {
        let batch_id = Uuid::now_v7();
        let started = Instant::now();
        info!(%batch_id, "processing stock event batch");

        let (store, connection_error) = match self.connector.connect().await {
            Ok(store) => (Some(store), None),
            Err(e) => {
                error!(%batch_id, error = %e, "store connection failed; continuing without persistence");
                (
                    None,
                    Some(ProcessingError::ConnectionSetup {
                        message: e.to_string(),
                    }),
                )
            }
        };

        let mut events = Vec::new();
        for (index, message) in messages.into_iter().enumerate() {
            let outcome = self.process_message(store.as_ref(), index, message.as_ref()).await;
            events.push(outcome);
        }

        if let Some(store) = &store {
            store.release().await;
        }

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let report = BatchReport::new(batch_id, connection_error, elapsed_ms, events);
        info!(
            %batch_id,
            total = report.summary.total,
            abandoned = report.summary.abandoned,
            orders = report.summary.order_decisions,
            skips = report.summary.skip_decisions,
            failed_steps = report.summary.failed_steps,
            elapsed_ms,
            "stock event batch complete"
        );
        report
    }

    async fn process_message<S>(&self, store: Option<&S>, index: usize, body: &[u8]) -> EventOutcome
    where
        S: ReplenishmentStore,
    {
        let started = Instant::now();
        let mut outcome = EventOutcome::received(index);

        match StockEventPayload::decode(body) {
            Ok(payload) => {
                let received_at = Utc::now();
                if let Some(reported_at) = payload.reported_at {
                    debug!(
                        event_id = %payload.event_id,
                        lag_ms = (received_at - reported_at).num_milliseconds(),
                        "stock event delivery lag"
                    );
                }
                let event = payload.into_stock_event(self.settings.source, received_at);
                outcome.event_id = Some(event.id.to_string());
                outcome.hospital_id = Some(event.hospital_id.clone());
                self.process_event(store, &event, &mut outcome).await;
            }
            Err(e) => {
                outcome.event_id = StockEventPayload::peek_event_id(body);
                warn!(index, event_id = ?outcome.event_id, error = %e, "malformed stock event; abandoning");
                outcome.abandon(ProcessingError::Decode {
                    message: e.to_string(),
                });
            }
        }

        record_observation(store, self.settings.observability_mode, started, &mut outcome).await;
        outcome
    }

    async fn process_event<S>(&self, store: Option<&S>, event: &StockEvent, outcome: &mut EventOutcome)
    where
        S: ReplenishmentStore,
    {
        info!(
            event_id = %event.id,
            hospital_id = %event.hospital_id,
            product_code = %event.product_code,
            days_of_supply = event.days_of_supply,
            "stock event received"
        );

        if let Admission::Duplicate(reason) = self.redelivery.admit(event) {
            warn!(event_id = %event.id, %reason, "redelivered stock event refused");
            outcome.abandon(ProcessingError::Redelivered { message: reason });
            return;
        }

        let recorded = record_stock_event(store, event).await;
        outcome.record(Step::RecordStockEvent, recorded);
        outcome.advance(ProcessingStage::RawPersisted);

        let decision = self.engine.evaluate(
            event.days_of_supply,
            event.daily_consumption_units,
            event.current_stock_units,
        );
        info!(
            event_id = %event.id,
            should_order = decision.should_order(),
            reason = decision.reason(),
            "replenishment decision"
        );
        outcome.decision = Some(decision.clone());
        outcome.advance(ProcessingStage::Decided);

        match &decision {
            OrderDecision::Order {
                quantity,
                priority,
                reason,
            } => {
                let request = OrderRequest {
                    quantity: *quantity,
                    priority: *priority,
                    reason,
                };
                place_order(store, &self.channel, &self.engine, event, request, outcome).await;
            }
            OrderDecision::Skip { reason } => {
                outcome.advance(ProcessingStage::Skipped);
                let audited = audit::record_skipped(
                    store,
                    &event.id,
                    reason,
                    event.days_of_supply,
                    self.engine.threshold_used(),
                )
                .await;
                outcome.record(Step::AuditDecision, audited);
                outcome.advance(ProcessingStage::Audited);
            }
        }
    }
}
