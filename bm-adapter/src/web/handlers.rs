//! Webhook endpoint handlers.
//!
//! Each handler resolves the channel from the path, merges query string and
//! urlencoded body fields (body wins), hands them to the matching translator
//! and renders the outcome for the vendor:
//! - 200 with the written record on success
//! - 400 for invalid fields or unknown status codes
//! - 404 for unknown channels

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::backend::Backend;
use crate::channel::{Channel, ChannelRegistry};
use crate::error::AdapterError;
use crate::process::{receive_message, receive_status};
use crate::queue::{IncomingMessage, MessageStatus, StatusValue};
use crate::web::form::merge_fields;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn Backend>,
    pub channels: ChannelRegistry,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn Backend>) -> Self {
        let channels = ChannelRegistry::new(config.channels.clone());
        Self {
            config: Arc::new(config),
            backend,
            channels,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Responses
// =============================================================================

/// Body returned to the vendor for every webhook.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub message: &'static str,
    pub data: Vec<ResponseData>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResponseData {
    Msg {
        channel_uuid: Uuid,
        msg_uuid: Uuid,
        urn: String,
        text: String,
        received_on: DateTime<Utc>,
    },
    Status {
        channel_uuid: Uuid,
        status: StatusValue,
        external_id: Option<String>,
    },
    Error {
        error: String,
    },
}

impl From<&IncomingMessage> for ResponseData {
    fn from(msg: &IncomingMessage) -> Self {
        ResponseData::Msg {
            channel_uuid: msg.channel_uuid,
            msg_uuid: msg.uuid,
            urn: msg.urn.to_string(),
            text: msg.text.clone(),
            received_on: msg.received_on,
        }
    }
}

impl From<&MessageStatus> for ResponseData {
    fn from(status: &MessageStatus) -> Self {
        ResponseData::Status {
            channel_uuid: status.channel_uuid(),
            status: status.status(),
            external_id: status.external_id().map(str::to_string),
        }
    }
}

type HandlerResponse = (StatusCode, Json<WebhookResponse>);

fn accepted(message: &'static str, data: ResponseData) -> HandlerResponse {
    (
        StatusCode::OK,
        Json(WebhookResponse {
            message,
            data: vec![data],
        }),
    )
}

fn rejected(err: &AdapterError) -> HandlerResponse {
    let code = match err {
        AdapterError::Validation(_) | AdapterError::UnknownStatus { .. } => StatusCode::BAD_REQUEST,
        AdapterError::ChannelNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if code.is_server_error() {
        error!(error_kind = err.kind(), error = %err, "bm_webhook_failed");
    } else {
        warn!(error_kind = err.kind(), error = %err, "bm_webhook_rejected");
    }

    (
        code,
        Json(WebhookResponse {
            message: "Error",
            data: vec![ResponseData::Error {
                error: err.to_string(),
            }],
        }),
    )
}

fn bad_request(error: String) -> HandlerResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(WebhookResponse {
            message: "Error",
            data: vec![ResponseData::Error { error }],
        }),
    )
}

fn bad_channel_path(raw: &str) -> HandlerResponse {
    warn!(channel_uuid = %raw, "bm_webhook_invalid_channel_uuid");
    bad_request(format!("invalid channel uuid: '{}'", raw))
}

/// Query string fields overlaid with the urlencoded body, if any.
fn webhook_fields(
    query: Option<String>,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<HashMap<String, String>, HandlerResponse> {
    let body = body.map_err(|e| {
        warn!(error = %e, "bm_webhook_unreadable_body");
        bad_request(format!("unable to read request body: {}", e))
    })?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    Ok(merge_fields(query.as_deref(), content_type, &body))
}

fn lookup_channel(state: &AppState, raw: &str) -> Result<Arc<Channel>, HandlerResponse> {
    let uuid = Uuid::parse_str(raw).map_err(|_| bad_channel_path(raw))?;
    state
        .channels
        .get(&uuid)
        .ok_or_else(|| rejected(&AdapterError::ChannelNotFound(uuid)))
}

// =============================================================================
// Blackmyna Webhooks
// =============================================================================

/// Inbound message webhook, `GET|POST /c/bm/:channel_uuid/receive`.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(channel_uuid): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> HandlerResponse {
    let channel = match lookup_channel(&state, &channel_uuid) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let form = match webhook_fields(query, &headers, body) {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    match receive_message(state.backend.as_ref(), &channel, &form).await {
        Ok(msg) => accepted("Message Accepted", ResponseData::from(&msg)),
        Err(e) => rejected(&e),
    }
}

/// Delivery status webhook, `GET|POST /c/bm/:channel_uuid/status`.
pub async fn status_webhook(
    State(state): State<AppState>,
    Path(channel_uuid): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> HandlerResponse {
    let channel = match lookup_channel(&state, &channel_uuid) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let form = match webhook_fields(query, &headers, body) {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    match receive_status(state.backend.as_ref(), &channel, &form).await {
        Ok(status) => accepted("Status Update Accepted", ResponseData::from(&status)),
        Err(e) => rejected(&e),
    }
}
