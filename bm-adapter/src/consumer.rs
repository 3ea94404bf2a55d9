//! RabbitMQ consumer module using lapin.
//!
//! This module handles connecting to RabbitMQ, consuming outgoing messages
//! from the bm_outgoing_messages queue, and spawning async tasks to send each
//! message concurrently.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, QueueDeclareOptions},
    types::FieldTable,
    Connection, ConnectionProperties,
};
use tokio::signal;
use tracing::{error, info, warn};

use blackmyna::{dispatch, ChannelRegistry, Config, HttpTransport, OutgoingMessage, Publisher, Sender, OUTGOING_QUEUE};

/// Run the RabbitMQ consumer.
///
/// This function:
/// 1. Connects to RabbitMQ using the configured URL
/// 2. Sets up QoS so at most `worker_concurrency` sends are in flight
/// 3. Declares the queue (idempotent operation)
/// 4. Starts consuming messages, spawning a task for each
/// 5. Handles graceful shutdown on SIGINT/SIGTERM
pub async fn run(config: Config) -> Result<()> {
    let config = Arc::new(config);

    info!(url_length = config.cloudamqp_url.len(), "rabbitmq_connecting");

    let conn = Connection::connect(&config.cloudamqp_url, ConnectionProperties::default())
        .await
        .context("Failed to connect to RabbitMQ")?;

    info!("rabbitmq_connected");

    let channel = conn.create_channel().await.context("Failed to create channel")?;

    info!("rabbitmq_channel_created");

    let prefetch_count = config.worker_concurrency.min(u16::MAX as usize) as u16;
    channel
        .basic_qos(prefetch_count, BasicQosOptions::default())
        .await
        .context("Failed to set QoS")?;

    info!(prefetch_count = prefetch_count, "rabbitmq_qos_set");

    channel
        .queue_declare(
            OUTGOING_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("Failed to declare queue")?;

    info!(queue = OUTGOING_QUEUE, "rabbitmq_queue_declared");

    // Statuses go back to the engine through the publisher backend
    let publisher = Publisher::new(config.cloudamqp_url.clone());
    let transport = HttpTransport::new(Duration::from_millis(config.request_timeout_ms))?;
    let sender = Arc::new(Sender::new(Arc::new(transport), config.send_url.clone()));
    let channels = ChannelRegistry::new(config.channels.clone());

    info!(
        channel_count = channels.len(),
        send_url = %config.send_url,
        timeout_ms = config.request_timeout_ms,
        "sender_ready"
    );

    let mut consumer = channel
        .basic_consume(
            OUTGOING_QUEUE,
            "bm-sender",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .context("Failed to start consumer")?;

    info!(queue = OUTGOING_QUEUE, "rabbitmq_consumer_started");

    let channel = Arc::new(channel);

    let shutdown = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT"),
            _ = terminate => info!("Received SIGTERM"),
        }
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("sender_stopping");
                break;
            }
            delivery = consumer.next() => {
                match delivery {
                    Some(Ok(delivery)) => {
                        let delivery_tag = delivery.delivery_tag;

                        let publisher = publisher.clone();
                        let sender = Arc::clone(&sender);
                        let channels = channels.clone();
                        let channel = Arc::clone(&channel);

                        tokio::spawn(async move {
                            let msg: Result<OutgoingMessage, _> = serde_json::from_slice(&delivery.data);

                            let requeue = match msg {
                                Ok(msg) => {
                                    info!(
                                        queue = OUTGOING_QUEUE,
                                        msg_id = %msg.id,
                                        delivery_tag = delivery_tag,
                                        "rabbitmq_message_received"
                                    );

                                    match dispatch(&publisher, &sender, &channels, &msg).await {
                                        Ok(_) => None,
                                        Err(e) => {
                                            error!(msg_id = %msg.id, error = %e, "sender_status_write_failed");
                                            Some(true)
                                        }
                                    }
                                }
                                Err(e) => {
                                    // Malformed payloads will never parse; drop them
                                    error!(delivery_tag = delivery_tag, error = %e, "rabbitmq_message_parse_failed");
                                    Some(false)
                                }
                            };

                            let result = match requeue {
                                None => channel.basic_ack(delivery_tag, BasicAckOptions::default()).await,
                                Some(requeue) => {
                                    channel
                                        .basic_nack(
                                            delivery_tag,
                                            BasicNackOptions {
                                                requeue,
                                                ..Default::default()
                                            },
                                        )
                                        .await
                                }
                            };

                            if let Err(e) = result {
                                error!(delivery_tag = delivery_tag, error = %e, "rabbitmq_ack_failed");
                            }
                        });
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "rabbitmq_delivery_error");
                    }
                    None => {
                        warn!("rabbitmq_consumer_closed");
                        break;
                    }
                }
            }
        }
    }

    publisher.close().await;

    info!("sender_shutdown_complete");
    Ok(())
}
