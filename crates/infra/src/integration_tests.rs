//! Integration tests for the full batch pipeline.
//!
//! Tests: raw batch → decode → store → decision → order + command → observability
//!
//! Verifies:
//! - A malformed message never stops the rest of the batch
//! - Each write is independent: one failing table does not block the others
//! - Commands are emitted even when the store is unreachable
//! - Observability modes decide which events leave a latency row

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use replenish_events::{CommandChannel, CreateOrderCommand, InMemoryCommandChannel};
    use replenish_replenishment::{
        DecisionEngine, DecisionType, OrderStatus, Priority, ProcessingStatus, ReplenishmentPolicy,
    };

    use crate::pipeline::{
        BatchProcessor, ObservabilityMode, ProcessingError, ProcessingStage, ProcessorSettings,
        Step, StepOutcome,
    };
    use crate::store::{InMemoryConnector, InMemoryStore, Table};

    type Channel = Arc<InMemoryCommandChannel<CreateOrderCommand>>;

    struct Harness {
        store: Arc<InMemoryStore>,
        connector: Arc<InMemoryConnector>,
        channel: Channel,
        processor: BatchProcessor<Arc<InMemoryConnector>, Channel>,
    }

    fn harness(mode: ObservabilityMode) -> Harness {
        let store = InMemoryStore::arc();
        let connector = Arc::new(InMemoryConnector::new(store.clone()));
        let channel: Channel = Arc::new(InMemoryCommandChannel::new());
        let processor = BatchProcessor::new(
            connector.clone(),
            channel.clone(),
            DecisionEngine::new(ReplenishmentPolicy::default()),
            ProcessorSettings {
                observability_mode: mode,
                ..ProcessorSettings::default()
            },
        );
        Harness {
            store,
            connector,
            channel,
            processor,
        }
    }

    fn adequate(id: &str) -> String {
        format!(
            r#"{{"eventId":"{id}","hospitalId":"HOSP-01","productCode":"SALINE-500","currentStockUnits":500,"dailyConsumptionUnits":100,"daysOfSupply":5.0,"timestamp":"2026-01-07T22:45:00Z"}}"#
        )
    }

    fn critical(id: &str) -> String {
        format!(
            r#"{{"eventId":"{id}","hospitalId":"HOSP-02","productCode":"GLOVES-M","currentStockUnits":5,"dailyConsumptionUnits":10,"daysOfSupply":0.5}}"#
        )
    }

    fn low(id: &str) -> String {
        format!(
            r#"{{"eventId":"{id}","hospitalId":"HOSP-03","productCode":"MASK-N95","currentStockUnits":150,"dailyConsumptionUnits":100,"daysOfSupply":1.5}}"#
        )
    }

    #[tokio::test]
    async fn malformed_message_is_isolated_from_the_rest_of_the_batch() {
        let h = harness(ObservabilityMode::RecordFailures);
        let sub = h.channel.subscribe();

        let batch = vec![adequate("evt-1"), "{not json".to_string(), critical("evt-3")];
        let report = h.processor.process_batch(&batch).await;

        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.abandoned, 1);
        assert_eq!(report.summary.order_decisions, 1);
        assert_eq!(report.summary.skip_decisions, 1);

        let bad = report.event(1).unwrap();
        assert_eq!(bad.stage, ProcessingStage::Abandoned);
        assert!(matches!(bad.abandon_reason, Some(ProcessingError::Decode { .. })));

        assert_eq!(report.event(0).unwrap().stage, ProcessingStage::Observed);
        assert_eq!(report.event(2).unwrap().stage, ProcessingStage::Observed);

        assert_eq!(h.store.stock_events().len(), 2);
        assert_eq!(h.store.orders().len(), 1);
        assert_eq!(h.store.decisions().len(), 2);

        let logs = h.store.observability_records();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].status, ProcessingStatus::Success);
        assert_eq!(logs[1].status, ProcessingStatus::Failure);
        assert_eq!(logs[2].status, ProcessingStatus::Success);

        assert_eq!(sub.drain().len(), 1);
    }

    #[tokio::test]
    async fn critical_event_produces_matching_order_decision_and_command() {
        let h = harness(ObservabilityMode::RecordFailures);
        let sub = h.channel.subscribe();

        let report = h.processor.process_batch([critical("evt-crit")]).await;
        let outcome = report.event(0).unwrap();
        let order_id = outcome.order_id.clone().unwrap();

        let orders = h.store.orders();
        assert_eq!(orders[0].id, order_id);
        assert_eq!(orders[0].quantity, 65);
        assert_eq!(orders[0].priority, Priority::Urgent);
        assert_eq!(orders[0].status, OrderStatus::Pending);

        let decision = &h.store.decisions()[0];
        assert_eq!(decision.decision_type, DecisionType::OrderCreated);
        assert_eq!(decision.order_id.as_ref(), Some(&order_id));
        assert_eq!(decision.reason, "CRITICAL: 0.5 days (< 1.0)");
        assert_eq!(decision.threshold_used, 2.0);

        let command = sub.try_recv().unwrap();
        assert_eq!(command.order_id, order_id);
        assert_eq!(command.order_quantity, 65);
        assert_eq!(command.priority, Priority::Urgent);
        assert_eq!(command.hospital_id, "HOSP-02");

        let log = &h.store.observability_records()[0];
        assert_eq!(log.message_id, "evt-crit");
        assert_eq!(log.source_hospital_id.as_deref(), Some("HOSP-02"));
        assert_eq!(log.target_service, "StockEventProcessor");
    }

    #[tokio::test]
    async fn low_stock_orders_at_high_priority() {
        let h = harness(ObservabilityMode::RecordFailures);

        h.processor.process_batch([low("evt-low")]).await;

        let order = &h.store.orders()[0];
        assert_eq!(order.priority, Priority::High);
        assert_eq!(order.quantity, 550);
        assert_eq!(h.store.decisions()[0].reason, "LOW STOCK: 1.5 days (< 2.0)");
    }

    #[tokio::test]
    async fn unreachable_store_still_decides_and_emits() {
        let h = harness(ObservabilityMode::RecordFailures);
        h.connector.set_reachable(false);
        let sub = h.channel.subscribe();

        let report = h.processor.process_batch([critical("evt-a"), adequate("evt-b")]).await;

        assert!(!report.store_connected);
        assert!(matches!(
            report.connection_error,
            Some(ProcessingError::ConnectionSetup { .. })
        ));
        for outcome in &report.events {
            assert_eq!(outcome.stage, ProcessingStage::Observed);
            for record in outcome.steps.iter().filter(|r| r.step != Step::EmitCommand) {
                assert_eq!(record.outcome, StepOutcome::Skipped, "{:?}", record.step);
            }
        }
        assert_eq!(
            report.event(0).unwrap().step(Step::EmitCommand),
            Some(&StepOutcome::Completed)
        );
        assert_eq!(sub.drain().len(), 1);
        assert!(h.store.stock_events().is_empty());
        assert_eq!(h.store.release_count(), 0);
    }

    #[tokio::test]
    async fn failing_orders_table_does_not_block_audit_or_emission() {
        let h = harness(ObservabilityMode::RecordFailures);
        h.store.fail_table(Table::Orders);
        let sub = h.channel.subscribe();

        let report = h.processor.process_batch([critical("evt-x")]).await;
        let outcome = report.event(0).unwrap();

        assert!(matches!(
            outcome.step(Step::PersistOrder),
            Some(StepOutcome::Failed {
                error: ProcessingError::Persistence { table: Table::Orders, .. }
            })
        ));
        assert_eq!(outcome.step(Step::AuditDecision), Some(&StepOutcome::Completed));
        assert_eq!(outcome.step(Step::EmitCommand), Some(&StepOutcome::Completed));
        assert!(h.store.orders().is_empty());
        assert_eq!(h.store.decisions().len(), 1);
        assert_eq!(sub.drain().len(), 1);
        assert_eq!(outcome.observed_status, Some(ProcessingStatus::Failure));
    }

    #[tokio::test]
    async fn failing_stock_events_table_still_decides() {
        let h = harness(ObservabilityMode::RecordFailures);
        h.store.fail_table(Table::StockEvents);

        let report = h.processor.process_batch([adequate("evt-s")]).await;
        let outcome = report.event(0).unwrap();

        assert!(outcome.step(Step::RecordStockEvent).unwrap().is_failed());
        assert_eq!(outcome.stage, ProcessingStage::Observed);
        assert_eq!(h.store.decisions()[0].decision_type, DecisionType::OrderSkipped);
    }

    #[tokio::test]
    async fn emission_failure_is_recorded_without_undoing_writes() {
        let h = harness(ObservabilityMode::RecordFailures);
        h.channel.set_online(false);

        let report = h.processor.process_batch([critical("evt-e")]).await;
        let outcome = report.event(0).unwrap();

        assert!(matches!(
            outcome.step(Step::EmitCommand),
            Some(StepOutcome::Failed { error: ProcessingError::Emit { .. } })
        ));
        assert_eq!(h.store.orders().len(), 1);
        assert_eq!(h.store.decisions().len(), 1);
        assert_eq!(h.store.observability_records()[0].status, ProcessingStatus::Failure);
        assert_eq!(report.summary.failed_steps, 1);
    }

    #[tokio::test]
    async fn legacy_mode_only_records_events_that_completed_emission() {
        let h = harness(ObservabilityMode::Legacy);
        h.store.fail_table(Table::DecisionLogs);

        let report = h
            .processor
            .process_batch(vec![adequate("evt-ok"), "[]".to_string()])
            .await;
        assert_eq!(report.event(1).unwrap().stage, ProcessingStage::Abandoned);

        let logs = h.store.observability_records();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message_id, "evt-ok");
        assert_eq!(logs[0].status, ProcessingStatus::Success);

        h.channel.set_online(false);
        let report = h.processor.process_batch([critical("evt-down")]).await;
        assert_eq!(
            report.event(0).unwrap().step(Step::RecordObservability),
            Some(&StepOutcome::Skipped)
        );
        assert_eq!(h.store.observability_records().len(), 1);
    }

    #[tokio::test]
    async fn one_connection_per_batch_released_at_the_end() {
        let h = harness(ObservabilityMode::RecordFailures);

        h.processor
            .process_batch(vec![adequate("evt-1"), critical("evt-2"), low("evt-3")])
            .await;
        assert_eq!(h.connector.connect_count(), 1);
        assert_eq!(h.store.release_count(), 1);

        let empty: Vec<String> = Vec::new();
        let report = h.processor.process_batch(&empty).await;
        assert_eq!(report.summary.total, 0);
        assert_eq!(h.connector.connect_count(), 2);
        assert_eq!(h.store.release_count(), 2);
    }

    #[tokio::test]
    async fn redelivered_event_is_processed_again_by_default() {
        let h = harness(ObservabilityMode::RecordFailures);

        h.processor.process_batch([critical("evt-dup")]).await;
        h.processor.process_batch([critical("evt-dup")]).await;

        let orders = h.store.orders();
        assert_eq!(orders.len(), 2);
        assert_ne!(orders[0].id, orders[1].id);
        assert_eq!(h.store.stock_events().len(), 2);
    }
}
