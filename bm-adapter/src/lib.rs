//! Blackmyna SMS channel adapter.
//!
//! This library provides shared modules for the two binaries:
//! - `bm-web`: Web server receiving message and status webhooks from Blackmyna
//! - `bm-sender`: Worker sending queued outgoing messages through the Blackmyna API
//!
//! ## Architecture
//!
//! ```text
//! Blackmyna → Web Server → process → Backend → bm_incoming_messages / bm_message_statuses
//! bm_outgoing_messages → Sender → Blackmyna API → Backend → bm_message_statuses
//! ```

pub mod backend;
pub mod channel;
pub mod config;
pub mod error;
pub mod process;
pub mod queue;
pub mod send;
pub mod urn;
pub mod web;

// Re-export commonly used types
pub use backend::{Backend, MemoryBackend};
pub use channel::{Channel, ChannelRegistry};
pub use config::Config;
pub use error::{AdapterError, BackendError, TransportError};
pub use queue::{
    CorrelationKey, IncomingMessage, MessageStatus, MsgId, OutgoingMessage, Publisher,
    StatusValue, INCOMING_QUEUE, OUTGOING_QUEUE, STATUS_QUEUE,
};
pub use send::{dispatch, HttpTransport, Sender};
pub use urn::TelUrn;
pub use web::AppState;
