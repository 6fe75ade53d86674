//! Wire contracts and message transport mechanics.
//!
//! - `inbound`: decoding of stock telemetry payloads delivered in batches
//! - `command`: the outbound `CreateOrder` command contract
//! - `channel`: transport-agnostic pub/sub for emitted commands

pub mod channel;
pub mod command;
pub mod in_memory_channel;
pub mod inbound;

pub use channel::{CommandChannel, Subscription};
pub use command::{COMMAND_TYPE_CREATE_ORDER, Command, CreateOrderCommand, DELIVERY_LEAD_DAYS, WAREHOUSE_ID};
pub use in_memory_channel::{ChannelError, InMemoryCommandChannel};
pub use inbound::{DecodeError, StockEventPayload};
