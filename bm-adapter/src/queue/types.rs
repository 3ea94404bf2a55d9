//! Canonical message and status types exchanged with the engine.
//!
//! This module defines the payloads for:
//! - `bm_incoming_messages` queue: messages received from the vendor
//! - `bm_message_statuses` queue: delivery status updates
//! - `bm_outgoing_messages` queue: messages the engine wants sent

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::urn::TelUrn;

/// Queue name for received messages.
pub const INCOMING_QUEUE: &str = "bm_incoming_messages";

/// Queue name for status updates.
pub const STATUS_QUEUE: &str = "bm_message_statuses";

/// Queue name for messages waiting to be sent.
pub const OUTGOING_QUEUE: &str = "bm_outgoing_messages";

// =============================================================================
// Messages
// =============================================================================

/// Engine-internal numeric message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MsgId(pub i64);

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message received from the vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub uuid: Uuid,
    pub channel_uuid: Uuid,
    pub urn: TelUrn,
    pub text: String,
    pub received_on: DateTime<Utc>,
}

/// A message the engine wants delivered through the vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub id: MsgId,
    pub uuid: Uuid,
    pub channel_uuid: Uuid,
    pub urn: TelUrn,
    pub text: String,
    /// Attachments as `<content-type>:<url>`.
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl OutgoingMessage {
    /// Body text followed by one attachment URL per line.
    ///
    /// SMS has no media, so attachments are sent as links.
    pub fn text_and_attachments(&self) -> String {
        let mut text = self.text.clone();
        for attachment in &self.attachments {
            text.push('\n');
            text.push_str(attachment_url(attachment));
        }
        text.trim().to_string()
    }
}

/// URL part of `<content-type>:<url>`. Values without a content type are
/// treated as a bare URL.
fn attachment_url(attachment: &str) -> &str {
    match attachment.split_once(':') {
        Some((content_type, url)) if content_type.contains('/') => url,
        _ => attachment,
    }
}

// =============================================================================
// Statuses
// =============================================================================

/// Canonical delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusValue {
    /// Handed to the vendor, which assigned an id.
    Wired,
    /// Vendor submitted it to the carrier.
    Sent,
    /// Carrier confirmed delivery to the handset.
    Delivered,
    /// Send attempt failed; may be retried.
    Errored,
    /// Permanently failed.
    Failed,
}

impl StatusValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusValue::Wired => "wired",
            StatusValue::Sent => "sent",
            StatusValue::Delivered => "delivered",
            StatusValue::Errored => "errored",
            StatusValue::Failed => "failed",
        }
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The id a status is correlated on: ours or the vendor's, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CorrelationKey {
    InternalId(MsgId),
    ExternalId(String),
}

/// Audit record of a single exchange with the vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelLog {
    pub description: String,
    pub channel_uuid: Uuid,
    pub msg_id: Option<MsgId>,
    pub method: String,
    pub url: String,
    pub request: String,
    pub response: String,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
    pub created_on: DateTime<Utc>,
}

impl ChannelLog {
    pub fn new(description: impl Into<String>, channel_uuid: Uuid, msg_id: Option<MsgId>) -> Self {
        Self {
            description: description.into(),
            channel_uuid,
            msg_id,
            method: String::new(),
            url: String::new(),
            request: String::new(),
            response: String::new(),
            status_code: None,
            error: None,
            elapsed_ms: 0,
            created_on: Utc::now(),
        }
    }

    pub fn with_request(mut self, method: &str, url: &str, request: String) -> Self {
        self.method = method.to_string();
        self.url = url.to_string();
        self.request = request;
        self
    }

    pub fn with_response(mut self, status_code: Option<u16>, body: &str, elapsed: Duration) -> Self {
        self.status_code = status_code;
        self.response = body.to_string();
        self.elapsed_ms = elapsed.as_millis() as u64;
        self
    }

    /// Attach an error, prefixed with `description` like `"Message Send Error: ..."`.
    pub fn with_error(mut self, description: &str, error: &dyn fmt::Display) -> Self {
        self.error = Some(format!("{}: {}", description, error));
        self
    }
}

/// A delivery status update for one message.
///
/// The correlation key and status value are always present; fields are
/// private so the key cannot be swapped after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageStatus {
    channel_uuid: Uuid,
    key: CorrelationKey,
    status: StatusValue,
    external_id: Option<String>,
    #[serde(default)]
    logs: Vec<ChannelLog>,
    created_on: DateTime<Utc>,
}

impl MessageStatus {
    pub fn for_id(channel_uuid: Uuid, id: MsgId, status: StatusValue) -> Self {
        Self::new(channel_uuid, CorrelationKey::InternalId(id), status)
    }

    pub fn for_external_id(channel_uuid: Uuid, external_id: impl Into<String>, status: StatusValue) -> Self {
        Self::new(channel_uuid, CorrelationKey::ExternalId(external_id.into()), status)
    }

    fn new(channel_uuid: Uuid, key: CorrelationKey, status: StatusValue) -> Self {
        Self {
            channel_uuid,
            key,
            status,
            external_id: None,
            logs: Vec::new(),
            created_on: Utc::now(),
        }
    }

    pub fn channel_uuid(&self) -> Uuid {
        self.channel_uuid
    }

    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    pub fn status(&self) -> StatusValue {
        self.status
    }

    pub fn set_status(&mut self, status: StatusValue) {
        self.status = status;
    }

    /// Vendor id for this message: the key itself for callbacks, or the id
    /// attached after a successful send.
    pub fn external_id(&self) -> Option<&str> {
        match &self.key {
            CorrelationKey::ExternalId(id) => Some(id),
            CorrelationKey::InternalId(_) => self.external_id.as_deref(),
        }
    }

    /// Record the vendor-assigned id so later callbacks can be matched.
    pub fn set_external_id(&mut self, external_id: impl Into<String>) {
        self.external_id = Some(external_id.into());
    }

    pub fn logs(&self) -> &[ChannelLog] {
        &self.logs
    }

    pub fn add_log(&mut self, log: ChannelLog) {
        self.logs.push(log);
    }

    pub fn created_on(&self) -> DateTime<Utc> {
        self.created_on
    }
}
