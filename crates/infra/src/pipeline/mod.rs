//! Per-batch processing pipeline.
//!
//! ```text
//! batch → for each message:
//!   decode → record raw event → decide → { orchestrate order + audit CREATED + emit
//!                                        | audit SKIPPED }
//!          → record latency/status
//! ```
//!
//! Each write is attempted once and its result captured as a `StepOutcome`;
//! a failing step never prevents the next one, and a failing event never
//! prevents the next event.

mod audit;
mod error;
mod intake;
mod observe;
mod orchestrator;
mod outcome;
mod recorder;
mod redelivery;

pub use error::ProcessingError;
pub use intake::{BatchProcessor, ProcessorSettings};
pub use observe::ObservabilityMode;
pub use outcome::{BatchReport, BatchSummary, EventOutcome, ProcessingStage, Step, StepOutcome, StepRecord};
pub use redelivery::{Admission, AdmitAll, RedeliveryPolicy};
