//! Redis Streams command channel.
//!
//! Each command is appended to one stream with `XADD`:
//!
//! ```text
//! XADD <stream> * order_id <id> command_type CreateOrder payload <json>
//! ```
//!
//! Publishing is fire-and-forget: success means Redis accepted the entry.
//! One publisher connection is kept per channel and reopened on the next
//! publish after a failure.
//! Subscriptions tail the stream from the moment they are created (`XREAD
//! BLOCK` from `$`) on a background thread; there are no consumer groups
//! and nothing is acknowledged.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::sync::mpsc::Sender;

use redis::Commands;
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument, warn};

use replenish_events::{Command, CommandChannel, CreateOrderCommand, Subscription};

pub const DEFAULT_STREAM_KEY: &str = "order-commands";

const READ_BLOCK_MS: usize = 1_000;
const READ_COUNT: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum RedisChannelError {
    #[error("redis connection error: {0}")]
    Connection(String),

    #[error("redis command error: {0}")]
    Command(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("malformed stream entry: {0}")]
    Deserialization(String),
}

/// Commands that can be keyed on the stream by order id.
pub trait StreamKeyed {
    fn stream_key(&self) -> &str;
}

impl StreamKeyed for CreateOrderCommand {
    fn stream_key(&self) -> &str {
        self.order_id.as_str()
    }
}

pub struct RedisStreamsCommandChannel<M> {
    client: Arc<redis::Client>,
    stream_key: String,
    publisher: Mutex<Option<redis::Connection>>,
    _marker: PhantomData<fn() -> M>,
}

impl<M> Clone for RedisStreamsCommandChannel<M> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            stream_key: self.stream_key.clone(),
            publisher: Mutex::new(None),
            _marker: PhantomData,
        }
    }
}

impl<M> core::fmt::Debug for RedisStreamsCommandChannel<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisStreamsCommandChannel")
            .field("stream_key", &self.stream_key)
            .finish()
    }
}

impl<M> RedisStreamsCommandChannel<M> {
    /// Open a client; no connection is made until the first publish.
    pub fn new(redis_url: impl AsRef<str>, stream_key: Option<String>) -> Result<Self, RedisChannelError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| RedisChannelError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            stream_key: stream_key.unwrap_or_else(|| DEFAULT_STREAM_KEY.to_string()),
            publisher: Mutex::new(None),
            _marker: PhantomData,
        })
    }

    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }

    fn connection(&self) -> Result<redis::Connection, RedisChannelError> {
        self.client
            .get_connection()
            .map_err(|e| RedisChannelError::Connection(e.to_string()))
    }
}

/// Field/value pairs written for one command.
fn stream_fields<M>(message: &M) -> Result<[(&'static str, String); 3], RedisChannelError>
where
    M: Command + StreamKeyed + Serialize,
{
    let payload =
        serde_json::to_string(message).map_err(|e| RedisChannelError::Serialization(e.to_string()))?;
    Ok([
        ("order_id", message.stream_key().to_string()),
        ("command_type", message.command_type().to_string()),
        ("payload", payload),
    ])
}

fn decode_entry<M: DeserializeOwned>(entry: &StreamId) -> Result<M, RedisChannelError> {
    let payload: String = entry
        .get("payload")
        .ok_or_else(|| RedisChannelError::Deserialization(format!("entry {} has no payload", entry.id)))?;
    serde_json::from_str(&payload)
        .map_err(|e| RedisChannelError::Deserialization(format!("entry {}: {e}", entry.id)))
}

impl<M> CommandChannel<M> for RedisStreamsCommandChannel<M>
where
    M: Command + StreamKeyed + Serialize + DeserializeOwned,
{
    type Error = RedisChannelError;

    #[instrument(
        skip(self, message),
        fields(stream_key = %self.stream_key, command_id = %message.command_id()),
        err
    )]
    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let fields = stream_fields(&message)?;
        let mut publisher = self
            .publisher
            .lock()
            .map_err(|_| RedisChannelError::Connection("publisher lock poisoned".to_string()))?;

        let mut conn = match publisher.take() {
            Some(conn) => conn,
            None => self.connection()?,
        };

        // A failed connection is dropped here, so the next publish reconnects.
        let entry_id: String = conn
            .xadd(&self.stream_key, "*", &fields)
            .map_err(|e| RedisChannelError::Command(format!("XADD failed: {e}")))?;
        *publisher = Some(conn);

        debug!(%entry_id, "command appended to stream");
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = std::sync::mpsc::channel();
        let channel = self.clone();

        std::thread::spawn(move || {
            if let Err(e) = channel.tail(&tx) {
                error!(stream_key = %channel.stream_key, error = %e, "command stream subscription stopped");
            }
        });

        Subscription::new(rx)
    }
}

impl<M> RedisStreamsCommandChannel<M>
where
    M: DeserializeOwned,
{
    /// Forward new entries until the receiver is dropped.
    fn tail(&self, tx: &Sender<M>) -> Result<(), RedisChannelError> {
        let mut conn = self.connection()?;
        let mut last_id = "$".to_string();
        let options = StreamReadOptions::default().block(READ_BLOCK_MS).count(READ_COUNT);

        loop {
            let reply: Option<StreamReadReply> = conn
                .xread_options(&[&self.stream_key], &[&last_id], &options)
                .map_err(|e| RedisChannelError::Command(format!("XREAD failed: {e}")))?;

            let Some(reply) = reply else {
                continue;
            };

            for entry in reply.keys.into_iter().flat_map(|k| k.ids) {
                last_id = entry.id.clone();
                match decode_entry::<M>(&entry) {
                    Ok(message) => {
                        if tx.send(message).is_err() {
                            return Ok(());
                        }
                    }
                    Err(e) => warn!(error = %e, "skipping stream entry"),
                }
            }
        }
    }
}
