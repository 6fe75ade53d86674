//! Infrastructure layer: durable store, outbound channel, configuration and
//! the batch processing pipeline.

pub mod command_channel;
pub mod config;
pub mod pipeline;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use config::{ConfigError, ProcessorConfig, StoreConfig};
pub use pipeline::{
    Admission, AdmitAll, BatchProcessor, BatchReport, BatchSummary, EventOutcome,
    ObservabilityMode, ProcessingError, ProcessingStage, ProcessorSettings, RedeliveryPolicy,
    Step, StepOutcome, StepRecord,
};
pub use store::{ReplenishmentStore, StoreConnector, StoreError, Table};
