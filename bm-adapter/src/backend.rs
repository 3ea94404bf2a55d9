//! Backend interface for durable writes of messages and statuses.
//!
//! The engine owns storage; the adapter only builds records and hands them
//! over. [`crate::queue::Publisher`] is the RabbitMQ implementation,
//! [`MemoryBackend`] keeps everything in process.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::channel::Channel;
use crate::error::BackendError;
use crate::queue::{CorrelationKey, IncomingMessage, MessageStatus, MsgId, StatusValue};
use crate::urn::TelUrn;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Build a new incoming message owned by `channel`.
    fn new_incoming_message(&self, channel: &Channel, urn: TelUrn, text: &str) -> IncomingMessage {
        IncomingMessage {
            uuid: Uuid::new_v4(),
            channel_uuid: channel.uuid,
            urn,
            text: text.to_string(),
            received_on: Utc::now(),
        }
    }

    /// Durably write an incoming message.
    async fn write_message(&self, msg: &IncomingMessage) -> Result<(), BackendError>;

    fn new_status_for_external_id(
        &self,
        channel: &Channel,
        external_id: &str,
        status: StatusValue,
    ) -> MessageStatus {
        MessageStatus::for_external_id(channel.uuid, external_id, status)
    }

    fn new_status_for_id(&self, channel: &Channel, id: MsgId, status: StatusValue) -> MessageStatus {
        MessageStatus::for_id(channel.uuid, id, status)
    }

    /// Write a status. Writing the same correlation key twice must be safe.
    async fn write_status(&self, status: &MessageStatus) -> Result<(), BackendError>;
}

/// In-process backend.
///
/// Statuses are stored per channel and correlation key, so a repeated callback
/// replaces the earlier record instead of adding a second one.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    messages: Mutex<Vec<IncomingMessage>>,
    statuses: Mutex<HashMap<(Uuid, CorrelationKey), MessageStatus>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<IncomingMessage> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn statuses(&self) -> Vec<MessageStatus> {
        self.statuses
            .lock()
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn status(&self, channel_uuid: Uuid, key: &CorrelationKey) -> Option<MessageStatus> {
        self.statuses
            .lock()
            .ok()?
            .get(&(channel_uuid, key.clone()))
            .cloned()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn write_message(&self, msg: &IncomingMessage) -> Result<(), BackendError> {
        self.messages
            .lock()
            .map_err(|e| BackendError(e.to_string()))?
            .push(msg.clone());
        Ok(())
    }

    async fn write_status(&self, status: &MessageStatus) -> Result<(), BackendError> {
        self.statuses
            .lock()
            .map_err(|e| BackendError(e.to_string()))?
            .insert((status.channel_uuid(), status.key().clone()), status.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_message() {
        let backend = MemoryBackend::new();
        let channel = Channel::new(Uuid::new_v4(), "2020", "US");
        let msg = backend.new_incoming_message(&channel, TelUrn::for_country("5551234567", "US"), "hi");

        backend.write_message(&msg).await.unwrap();

        let messages = backend.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].channel_uuid, channel.uuid);
        assert_eq!(messages[0].text, "hi");
    }

    #[tokio::test]
    async fn test_duplicate_status_overwrites() {
        let backend = MemoryBackend::new();
        let channel = Channel::new(Uuid::new_v4(), "2020", "US");

        let status = backend.new_status_for_external_id(&channel, "abc123", StatusValue::Sent);
        backend.write_status(&status).await.unwrap();
        backend.write_status(&status).await.unwrap();

        assert_eq!(backend.statuses().len(), 1);

        let delivered = backend.new_status_for_external_id(&channel, "abc123", StatusValue::Delivered);
        backend.write_status(&delivered).await.unwrap();

        let stored = backend
            .status(channel.uuid, &CorrelationKey::ExternalId("abc123".to_string()))
            .unwrap();
        assert_eq!(stored.status(), StatusValue::Delivered);
        assert_eq!(backend.statuses().len(), 1);
    }

    #[tokio::test]
    async fn test_internal_and_external_keys_distinct() {
        let backend = MemoryBackend::new();
        let channel = Channel::new(Uuid::new_v4(), "2020", "US");

        let by_id = backend.new_status_for_id(&channel, MsgId(1), StatusValue::Wired);
        let by_external = backend.new_status_for_external_id(&channel, "1", StatusValue::Sent);
        backend.write_status(&by_id).await.unwrap();
        backend.write_status(&by_external).await.unwrap();

        assert_eq!(backend.statuses().len(), 2);
    }

    #[tokio::test]
    async fn test_same_external_id_on_two_channels() {
        let backend = MemoryBackend::new();
        let first = Channel::new(Uuid::new_v4(), "2020", "US");
        let second = Channel::new(Uuid::new_v4(), "3030", "RW");

        let sent = backend.new_status_for_external_id(&first, "abc123", StatusValue::Sent);
        let failed = backend.new_status_for_external_id(&second, "abc123", StatusValue::Failed);
        backend.write_status(&sent).await.unwrap();
        backend.write_status(&failed).await.unwrap();

        assert_eq!(backend.statuses().len(), 2);
        let key = CorrelationKey::ExternalId("abc123".to_string());
        assert_eq!(backend.status(first.uuid, &key).unwrap().status(), StatusValue::Sent);
        assert_eq!(backend.status(second.uuid, &key).unwrap().status(), StatusValue::Failed);
    }
}
