//! Web server module for handling Blackmyna webhooks.
//!
//! This module provides the router that:
//! - Receives inbound message and delivery status webhooks per channel
//! - Validates the form fields
//! - Writes the translated record through the backend
//! - Answers the vendor with an acknowledgement or a descriptive error

pub mod form;
pub mod handlers;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

pub use form::{merge_fields, validate_form, Constraint, FieldRule, ValidationError};
pub use handlers::{
    health, receive_webhook, status_webhook, AppState, HealthResponse, ResponseData,
    WebhookResponse,
};

/// Build the webhook router. Vendor webhooks are accepted as GET or POST.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/c/bm/:channel_uuid/receive",
            get(receive_webhook).post(receive_webhook),
        )
        .route(
            "/c/bm/:channel_uuid/status",
            get(status_webhook).post(status_webhook),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
