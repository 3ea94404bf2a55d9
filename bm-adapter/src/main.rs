//! Blackmyna Sender - async RabbitMQ consumer for outgoing SMS.
//!
//! This worker consumes canonical outgoing messages from the
//! bm_outgoing_messages queue, sends each through the Blackmyna HTTP API and
//! publishes the resulting status for the engine.

mod consumer;

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use blackmyna::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    tracing::info!("sender_starting");

    let config = Config::from_env();
    tracing::info!(
        cloudamqp_url_set = !config.cloudamqp_url.is_empty(),
        channel_count = config.channels.len(),
        concurrency = config.worker_concurrency,
        request_timeout_ms = config.request_timeout_ms,
        "config_loaded"
    );

    consumer::run(config).await?;

    Ok(())
}
