//! Outbound sending.
//!
//! [`Sender`] talks to the vendor; [`dispatch`] wraps it for the queue
//! worker, resolving the channel and writing whatever status results.

pub mod sender;
pub mod transport;

pub use sender::{SendOutcome, Sender, SEND_URL};
pub use transport::{HttpTransport, OutboundRequest, Transport, VendorResponse};

use tracing::{error, info, warn};

use crate::backend::Backend;
use crate::channel::ChannelRegistry;
use crate::error::{AdapterError, BackendError};
use crate::queue::{ChannelLog, MessageStatus, OutgoingMessage, StatusValue};

/// Send one outgoing message and write the resulting status.
///
/// Unknown channels and missing credentials cannot succeed on retry, so they
/// are written as `failed`. Everything else is written as the sender left it.
/// Only backend write errors are returned.
pub async fn dispatch(
    backend: &dyn Backend,
    sender: &Sender,
    channels: &ChannelRegistry,
    msg: &OutgoingMessage,
) -> Result<MessageStatus, BackendError> {
    let status = match channels.get(&msg.channel_uuid) {
        None => failed_status(msg, AdapterError::ChannelNotFound(msg.channel_uuid)),
        Some(channel) => match sender.send(backend, &channel, msg).await {
            Ok(SendOutcome { status, error: None }) => status,
            Ok(SendOutcome {
                status,
                error: Some(e),
            }) => {
                warn!(
                    msg_id = %msg.id,
                    error_kind = e.kind(),
                    error = %e,
                    "bm_dispatch_send_error"
                );
                status
            }
            Err(e) => failed_status(msg, e),
        },
    };

    backend.write_status(&status).await?;

    info!(
        msg_id = %msg.id,
        channel_uuid = %msg.channel_uuid,
        status = %status.status(),
        "bm_dispatch_complete"
    );

    Ok(status)
}

fn failed_status(msg: &OutgoingMessage, e: AdapterError) -> MessageStatus {
    error!(
        msg_id = %msg.id,
        channel_uuid = %msg.channel_uuid,
        error_kind = e.kind(),
        error = %e,
        "bm_dispatch_failed"
    );

    let mut status = MessageStatus::for_id(msg.channel_uuid, msg.id, StatusValue::Failed);
    status.add_log(ChannelLog::new("Message Sent", msg.channel_uuid, Some(msg.id)).with_error("Message Send Error", &e));
    status
}
