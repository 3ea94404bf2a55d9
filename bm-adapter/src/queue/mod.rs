//! Queue module for RabbitMQ operations.
//!
//! This module provides:
//! - Canonical message and status types shared with the engine
//! - Async publisher implementing the backend over RabbitMQ
//!
//! ## Architecture
//!
//! ```text
//! Vendor webhooks → Web Server → bm_incoming_messages / bm_message_statuses → Engine
//! Engine → bm_outgoing_messages → Sender → Vendor API
//! ```

pub mod publisher;
pub mod types;

pub use publisher::Publisher;
pub use types::{
    ChannelLog, CorrelationKey, IncomingMessage, MessageStatus, MsgId, OutgoingMessage,
    StatusValue, INCOMING_QUEUE, OUTGOING_QUEUE, STATUS_QUEUE,
};
