//! Infrastructure-backed command channels.
//!
//! The channel abstraction and the in-memory transport live in
//! `replenish-events`; this module adds broker-backed transports.

#[cfg(feature = "redis")]
pub mod redis_streams;

#[cfg(feature = "redis")]
pub use redis_streams::{RedisChannelError, RedisStreamsCommandChannel};
