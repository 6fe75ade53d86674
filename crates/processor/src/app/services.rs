//! Infrastructure wiring for the HTTP host.
//!
//! The router only sees `dyn BatchIntake`, so the concrete store connector
//! and command channel are chosen here from configuration.

use std::sync::Arc;

use async_trait::async_trait;

use replenish_events::{CommandChannel, CreateOrderCommand, InMemoryCommandChannel};
use replenish_infra::store::PostgresConnector;
use replenish_infra::{
    BatchProcessor, BatchReport, ProcessorConfig, ProcessorSettings, RedeliveryPolicy,
    StoreConnector,
};
use replenish_replenishment::DecisionEngine;

/// Type-erased batch processor.
#[async_trait]
pub trait BatchIntake: Send + Sync {
    async fn process(&self, messages: Vec<Vec<u8>>) -> BatchReport;
}

#[async_trait]
impl<C, B, R> BatchIntake for BatchProcessor<C, B, R>
where
    C: StoreConnector + 'static,
    B: CommandChannel<CreateOrderCommand> + 'static,
    R: RedeliveryPolicy + 'static,
{
    async fn process(&self, messages: Vec<Vec<u8>>) -> BatchReport {
        self.process_batch(messages).await
    }
}

pub struct AppServices {
    pub intake: Arc<dyn BatchIntake>,
}

impl AppServices {
    pub fn new(intake: Arc<dyn BatchIntake>) -> Self {
        Self { intake }
    }
}

/// Build services from resolved configuration.
///
/// - store: Postgres when `DB_HOST` is set, otherwise every batch runs
///   without persistence
/// - commands: Redis Streams when `REDIS_URL` is set (and the `redis`
///   feature is enabled), otherwise an in-process channel that only logs
pub fn build_services(config: &ProcessorConfig) -> anyhow::Result<AppServices> {
    if config.store.is_none() {
        tracing::warn!("DB_HOST not set; batches will run without persistence");
    }

    let connector = PostgresConnector::from_config(config.store.as_ref());
    let engine = DecisionEngine::new(config.policy);
    let settings = ProcessorSettings {
        source: config.source,
        observability_mode: config.observability_mode,
    };

    tracing::info!(
        source = config.source.as_str(),
        observability_mode = %config.observability_mode,
        critical_threshold_days = config.policy.critical_threshold_days,
        urgent_threshold_days = config.policy.urgent_threshold_days,
        restock_target_days = config.policy.restock_target_days,
        "processor configured"
    );

    #[cfg(feature = "redis")]
    if let Some(url) = &config.redis_url {
        let channel = replenish_infra::command_channel::RedisStreamsCommandChannel::<CreateOrderCommand>::new(
            url,
            Some(config.order_commands_stream.clone()),
        )?;
        tracing::info!(stream_key = channel.stream_key(), "emitting order commands to Redis Streams");
        let processor = BatchProcessor::new(connector, channel, engine, settings);
        return Ok(AppServices::new(Arc::new(processor)));
    }

    #[cfg(not(feature = "redis"))]
    if config.redis_url.is_some() {
        tracing::warn!("REDIS_URL set but the redis feature is disabled; ignoring");
    }

    tracing::warn!("order commands stay in-process (no broker configured)");
    let channel = Arc::new(InMemoryCommandChannel::new());
    spawn_command_logger(&channel);
    let processor = BatchProcessor::new(connector, channel, engine, settings);
    Ok(AppServices::new(Arc::new(processor)))
}

/// Log every command published on an in-process channel.
fn spawn_command_logger(channel: &Arc<InMemoryCommandChannel<CreateOrderCommand>>) {
    let sub = channel.subscribe();
    std::thread::spawn(move || {
        while let Ok(command) = sub.recv() {
            tracing::info!(
                command_id = %command.command_id,
                order_id = %command.order_id,
                hospital_id = %command.hospital_id,
                product_code = %command.product_code,
                order_quantity = command.order_quantity,
                priority = command.priority.as_str(),
                "order command (in-process)"
            );
        }
    });
}
