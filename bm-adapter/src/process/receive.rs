//! Inbound message webhook translation.

use std::collections::HashMap;

use tracing::info;

use crate::backend::Backend;
use crate::channel::Channel;
use crate::error::AdapterError;
use crate::queue::IncomingMessage;
use crate::urn::TelUrn;
use crate::web::form::{validate_form, FieldRule};

/// Fields Blackmyna sends with every inbound message.
pub const RECEIVE_FIELDS: &[FieldRule] = &[
    FieldRule::required("to"),
    FieldRule::required("text"),
    FieldRule::required("from"),
];

/// Turn an inbound webhook form into an [`IncomingMessage`] and write it.
///
/// Nothing is written when validation fails.
pub async fn receive_message(
    backend: &dyn Backend,
    channel: &Channel,
    form: &HashMap<String, String>,
) -> Result<IncomingMessage, AdapterError> {
    let fields = validate_form(form, RECEIVE_FIELDS)?;

    let urn = TelUrn::for_country(fields.str("from"), &channel.country);
    let msg = backend.new_incoming_message(channel, urn, fields.str("text"));

    backend.write_message(&msg).await?;

    info!(
        channel_uuid = %channel.uuid,
        msg_uuid = %msg.uuid,
        urn = %msg.urn,
        to = fields.str("to"),
        text_length = msg.text.len(),
        "bm_message_received"
    );

    Ok(msg)
}
