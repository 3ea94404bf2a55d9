//! Webhook payload translation.
//!
//! Translates Blackmyna webhook forms into canonical records and writes them
//! through the backend.
//!
//! ## Processing Flow
//!
//! ```text
//! receive form → receive_message() → IncomingMessage → Backend::write_message
//! status form  → receive_status()  → MessageStatus   → Backend::write_status
//! ```

pub mod receive;
pub mod status;

pub use receive::{receive_message, RECEIVE_FIELDS};
pub use status::{receive_status, VendorStatusCode, STATUS_FIELDS};
