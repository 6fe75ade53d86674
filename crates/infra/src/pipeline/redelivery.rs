//! Redelivery decision point.
//!
//! The upstream transport delivers at least once. Whether a redelivered
//! event id should be processed again is a policy question; the pipeline
//! asks a `RedeliveryPolicy` once per decoded event, before any write.

use replenish_replenishment::StockEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admit,
    /// Refuse the event; the string explains why (logged and reported).
    Duplicate(String),
}

pub trait RedeliveryPolicy: Send + Sync {
    fn admit(&self, event: &StockEvent) -> Admission;
}

/// Admits every event, so redeliveries produce duplicate rows.
#[derive(Debug, Copy, Clone, Default)]
pub struct AdmitAll;

impl RedeliveryPolicy for AdmitAll {
    fn admit(&self, _event: &StockEvent) -> Admission {
        Admission::Admit
    }
}

impl<P> RedeliveryPolicy for std::sync::Arc<P>
where
    P: RedeliveryPolicy + ?Sized,
{
    fn admit(&self, event: &StockEvent) -> Admission {
        (**self).admit(event)
    }
}
