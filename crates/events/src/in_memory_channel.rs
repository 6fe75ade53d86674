//! In-memory command channel for tests/dev.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, mpsc};

use thiserror::Error;

use crate::channel::{CommandChannel, Subscription};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Publish failed due to internal lock poisoning.
    #[error("channel lock poisoned")]
    Poisoned,

    /// The channel was switched offline (simulated transport outage).
    #[error("channel unavailable")]
    Unavailable,
}

/// In-memory pub/sub channel.
///
/// - No IO / no async
/// - Best-effort fan-out to live subscribers
/// - Can be switched offline to exercise emission failures
#[derive(Debug)]
pub struct InMemoryCommandChannel<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
    online: AtomicBool,
}

impl<M> InMemoryCommandChannel<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated availability; offline publishes fail with `Unavailable`.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl<M> Default for InMemoryCommandChannel<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            online: AtomicBool::new(true),
        }
    }
}

impl<M> CommandChannel<M> for InMemoryCommandChannel<M>
where
    M: Clone + Send + 'static,
{
    type Error = ChannelError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable);
        }

        let mut subs = self.subscribers.lock().map_err(|_| ChannelError::Poisoned)?;

        // Drop any dead subscribers while publishing.
        subs.retain(|tx| tx.send(message.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // If the lock is poisoned, we still return a subscription;
        // it just won't receive messages until the process restarts.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}
