//! Async RabbitMQ publisher acting as the engine backend.
//!
//! Incoming messages and statuses are published as persistent JSON messages
//! for the engine to consume. The channel runs in confirm mode, so a write
//! only succeeds once the broker has acked it. The publisher can be shared
//! across tasks.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions},
    publisher_confirm::Confirmation,
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::types::{
    CorrelationKey, IncomingMessage, MessageStatus, INCOMING_QUEUE, OUTGOING_QUEUE, STATUS_QUEUE,
};
use crate::backend::Backend;
use crate::error::BackendError;

/// Queues declared on every (re)connect.
const DECLARED_QUEUES: [&str; 3] = [INCOMING_QUEUE, STATUS_QUEUE, OUTGOING_QUEUE];

/// Async RabbitMQ publisher with connection management.
///
/// The publisher maintains a persistent connection and channel to RabbitMQ,
/// automatically reconnecting on failure.
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

struct PublisherInner {
    url: String,
    connection: RwLock<Option<Connection>>,
    channel: RwLock<Option<Channel>>,
}

impl Publisher {
    /// Create a new publisher with the given RabbitMQ URL.
    pub fn new(url: String) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                url,
                connection: RwLock::new(None),
                channel: RwLock::new(None),
            }),
        }
    }

    /// Ensure we have a valid connection and channel.
    async fn ensure_connected(&self) -> Result<Channel> {
        {
            let channel = self.inner.channel.read().await;
            if let Some(ch) = channel.as_ref() {
                if ch.status().connected() {
                    return Ok(ch.clone());
                }
            }
        }

        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        // Double-check after acquiring write lock
        if let Some(ch) = channel.as_ref() {
            if ch.status().connected() {
                return Ok(ch.clone());
            }
        }

        info!("rabbitmq_publisher_connecting");

        let conn = Connection::connect(&self.inner.url, ConnectionProperties::default())
            .await
            .context("Failed to connect to RabbitMQ")?;

        info!("rabbitmq_publisher_connected");

        let ch = conn
            .create_channel()
            .await
            .context("Failed to create channel")?;

        ch.confirm_select(ConfirmSelectOptions::default())
            .await
            .context("Failed to enable publisher confirms")?;

        for queue in DECLARED_QUEUES {
            ch.queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .with_context(|| format!("Failed to declare queue {}", queue))?;
        }

        info!(queues = ?DECLARED_QUEUES, "rabbitmq_queues_declared");

        *connection = Some(conn);
        *channel = Some(ch.clone());

        Ok(ch)
    }

    /// Publish a JSON payload to `queue` and wait for the broker confirm.
    async fn publish<T: Serialize>(&self, queue: &str, message_id: String, payload: &T) -> Result<()> {
        let channel = self.ensure_connected().await?;

        let body = serde_json::to_vec(payload).context("Failed to serialize payload")?;

        let confirmation = channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_content_type("application/json".into())
                    .with_message_id(message_id.clone().into()),
            )
            .await
            .with_context(|| format!("Failed to publish to {}", queue))?
            .await
            .context("Failed to confirm publish")?;
        check_confirmation(queue, confirmation)?;

        info!(
            queue = queue,
            message_id = %message_id,
            body_length = body.len(),
            "rabbitmq_published"
        );

        Ok(())
    }

    /// Close the connection gracefully.
    pub async fn close(&self) {
        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        if let Some(ch) = channel.take() {
            if let Err(e) = ch.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_channel_close_error");
            }
        }

        if let Some(conn) = connection.take() {
            if let Err(e) = conn.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_connection_close_error");
            }
        }

        info!("rabbitmq_publisher_closed");
    }
}

/// Only a broker ack counts as a durable write.
fn check_confirmation(queue: &str, confirmation: Confirmation) -> Result<()> {
    match confirmation {
        Confirmation::Ack(_) => Ok(()),
        Confirmation::Nack(_) => bail!("broker nacked publish to {}", queue),
        Confirmation::NotRequested => bail!("publish to {} was not confirmed", queue),
    }
}

/// Broker message id for a status, unique per correlation key.
fn status_message_id(status: &MessageStatus) -> String {
    match status.key() {
        CorrelationKey::InternalId(id) => format!("status-id-{}", id),
        CorrelationKey::ExternalId(id) => format!("status-ext-{}", id),
    }
}

#[async_trait]
impl Backend for Publisher {
    async fn write_message(&self, msg: &IncomingMessage) -> Result<(), BackendError> {
        self.publish(INCOMING_QUEUE, format!("msg-{}", msg.uuid), msg)
            .await
            .map_err(BackendError::from)
    }

    async fn write_status(&self, status: &MessageStatus) -> Result<(), BackendError> {
        self.publish(STATUS_QUEUE, status_message_id(status), status)
            .await
            .map_err(BackendError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{MsgId, StatusValue};
    use uuid::Uuid;

    #[test]
    fn test_publisher_creation() {
        let publisher = Publisher::new("amqp://localhost:5672".to_string());
        assert!(Arc::strong_count(&publisher.inner) == 1);
    }

    #[test]
    fn test_status_message_id() {
        let channel_uuid = Uuid::new_v4();
        let by_id = MessageStatus::for_id(channel_uuid, MsgId(12), StatusValue::Wired);
        let by_ext = MessageStatus::for_external_id(channel_uuid, "abc", StatusValue::Sent);

        assert_eq!(status_message_id(&by_id), "status-id-12");
        assert_eq!(status_message_id(&by_ext), "status-ext-abc");
    }

    #[test]
    fn test_only_ack_confirms_publish() {
        assert!(check_confirmation(STATUS_QUEUE, Confirmation::Ack(None)).is_ok());

        let nack = check_confirmation(STATUS_QUEUE, Confirmation::Nack(None)).unwrap_err();
        assert_eq!(nack.to_string(), "broker nacked publish to bm_message_statuses");

        let err = check_confirmation(INCOMING_QUEUE, Confirmation::NotRequested).unwrap_err();
        let backend_err = BackendError::from(err);
        assert_eq!(
            backend_err.to_string(),
            "backend write failed: publish to bm_incoming_messages was not confirmed"
        );
    }
}
