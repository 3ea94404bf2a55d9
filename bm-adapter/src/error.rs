//! Error taxonomy for the adapter.
//!
//! Webhook errors (`Validation`, `UnknownStatus`, `ChannelNotFound`) are
//! answered synchronously to the vendor. Send errors are split between hard
//! failures (`Configuration`) and soft ones recorded on a status
//! (`Transport`, `ResponseFormat`).

use thiserror::Error;
use uuid::Uuid;

use crate::web::form::ValidationError;

/// Any error the adapter can report for a single request or send attempt.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Malformed or missing webhook fields.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Vendor status code outside the known set.
    #[error("unknown status '{value}', must be one of 1, 2, 8 or 16")]
    UnknownStatus { value: i64 },

    /// Channel is missing a credential needed to send.
    #[error("no {field} set for BM channel")]
    Configuration { field: &'static str },

    /// Network failure, timeout or non-2xx response from the vendor.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Vendor accepted the message but the body carried no correlation id.
    #[error("{0}")]
    ResponseFormat(String),

    /// The backend failed to persist a message or status.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// No channel is registered under the given UUID.
    #[error("channel not found: {0}")]
    ChannelNotFound(Uuid),
}

impl AdapterError {
    /// Short machine-readable kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterError::Validation(_) => "validation",
            AdapterError::UnknownStatus { .. } => "unknown_status",
            AdapterError::Configuration { .. } => "configuration",
            AdapterError::Transport(_) => "transport",
            AdapterError::ResponseFormat(_) => "response_format",
            AdapterError::Backend(_) => "backend",
            AdapterError::ChannelNotFound(_) => "channel_not_found",
        }
    }
}

/// Failure of a single outbound HTTP exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The vendor answered with a non-2xx status.
    #[error("vendor returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Response body, when the vendor sent one.
    pub fn body(&self) -> Option<&str> {
        match self {
            TransportError::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    /// HTTP status, when the vendor sent one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure to write through the backend.
#[derive(Debug, Error)]
#[error("backend write failed: {0}")]
pub struct BackendError(pub String);

impl From<anyhow::Error> for BackendError {
    fn from(err: anyhow::Error) -> Self {
        BackendError(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status_names_value_and_accepted_set() {
        let err = AdapterError::UnknownStatus { value: 99 };
        assert_eq!(
            err.to_string(),
            "unknown status '99', must be one of 1, 2, 8 or 16"
        );
    }

    #[test]
    fn test_configuration_names_missing_field() {
        let err = AdapterError::Configuration { field: "API key" };
        assert_eq!(err.to_string(), "no API key set for BM channel");
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn test_transport_error_accessors() {
        let err = TransportError::Status {
            status: 503,
            body: "busy".to_string(),
        };
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(err.body(), Some("busy"));

        let err = TransportError::Timeout { timeout_ms: 10 };
        assert_eq!(err.status_code(), None);
        assert_eq!(err.to_string(), "request timed out after 10ms");
    }
}
