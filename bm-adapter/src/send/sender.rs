//! Outbound message sending through the Blackmyna HTTP API.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use super::transport::{OutboundRequest, Transport};
use crate::backend::Backend;
use crate::channel::{Channel, CONFIG_API_KEY, CONFIG_PASSWORD, CONFIG_USERNAME};
use crate::error::AdapterError;
use crate::queue::{ChannelLog, MessageStatus, OutgoingMessage, StatusValue};

/// Vendor endpoint for outbound SMS.
pub const SEND_URL: &str = "http://api.blackmyna.com/2/smsmessaging/outbound";

/// Result of a send attempt that reached the point of building a status.
///
/// `error` is set when the request failed in transport or the response cannot
/// be correlated; the status stays `errored` in both cases.
#[derive(Debug)]
pub struct SendOutcome {
    pub status: MessageStatus,
    pub error: Option<AdapterError>,
}

/// Builds vendor requests and interprets their responses.
#[derive(Clone)]
pub struct Sender {
    transport: Arc<dyn Transport>,
    send_url: String,
}

impl Sender {
    pub fn new(transport: Arc<dyn Transport>, send_url: impl Into<String>) -> Self {
        Self {
            transport,
            send_url: send_url.into(),
        }
    }

    /// Send `msg` through `channel`.
    ///
    /// Returns `Err` only when the channel is missing credentials, before any
    /// request is made. Transport failures come back as an `errored` status
    /// with the error in its log and in [`SendOutcome::error`].
    pub async fn send(
        &self,
        backend: &dyn Backend,
        channel: &Channel,
        msg: &OutgoingMessage,
    ) -> Result<SendOutcome, AdapterError> {
        let username = required_config(channel, CONFIG_USERNAME, "username")?;
        let password = required_config(channel, CONFIG_PASSWORD, "password")?;
        // Validated but not sent: the send endpoint only takes Basic auth.
        let _api_key = required_config(channel, CONFIG_API_KEY, "API key")?;

        let request = OutboundRequest {
            url: self.send_url.clone(),
            form: vec![
                ("address".to_string(), msg.urn.path().to_string()),
                ("senderaddress".to_string(), channel.address.clone()),
                ("message".to_string(), msg.text_and_attachments()),
            ],
            username,
            password,
        };

        let mut status = backend.new_status_for_id(channel, msg.id, StatusValue::Errored);
        let log = ChannelLog::new("Message Sent", channel.uuid, Some(msg.id)).with_request(
            "POST",
            &request.url,
            request.describe(),
        );

        let started = Instant::now();
        let response = match self.transport.execute(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    channel_uuid = %channel.uuid,
                    msg_id = %msg.id,
                    error = %e,
                    "bm_send_transport_failed"
                );
                status.add_log(
                    log.with_response(e.status_code(), e.body().unwrap_or_default(), started.elapsed())
                        .with_error("Message Send Error", &e),
                );
                return Ok(SendOutcome {
                    status,
                    error: Some(AdapterError::Transport(e)),
                });
            }
        };

        status.add_log(log.with_response(Some(response.status), &response.body, started.elapsed()));

        let Some(external_id) = external_id_from_body(&response.body) else {
            warn!(
                channel_uuid = %channel.uuid,
                msg_id = %msg.id,
                body_length = response.body.len(),
                "bm_send_no_external_id"
            );
            return Ok(SendOutcome {
                status,
                error: Some(AdapterError::ResponseFormat(
                    "no external id returned in body".to_string(),
                )),
            });
        };

        status.set_status(StatusValue::Wired);
        status.set_external_id(external_id);

        info!(
            channel_uuid = %channel.uuid,
            msg_id = %msg.id,
            external_id = status.external_id().unwrap_or_default(),
            "bm_send_wired"
        );

        Ok(SendOutcome { status, error: None })
    }
}

fn required_config(channel: &Channel, key: &str, field: &'static str) -> Result<String, AdapterError> {
    let value = channel.string_config_for_key(key, "");
    if value.is_empty() {
        return Err(AdapterError::Configuration { field });
    }
    Ok(value)
}

/// `id` of the first element of a JSON array body, e.g. `[{"id":"123"}]`.
fn external_id_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get(0)?
        .get("id")?
        .as_str()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::backend::MemoryBackend;
    use crate::error::TransportError;
    use crate::queue::{CorrelationKey, MsgId};
    use crate::send::transport::VendorResponse;
    use crate::urn::TelUrn;

    type Responder = Box<dyn Fn() -> Result<VendorResponse, TransportError> + Send + Sync>;

    struct MockTransport {
        calls: Mutex<Vec<OutboundRequest>>,
        responder: Responder,
    }

    impl MockTransport {
        fn new(responder: impl Fn() -> Result<VendorResponse, TransportError> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                responder: Box::new(responder),
            })
        }

        fn replying(body: &str) -> Arc<Self> {
            let body = body.to_string();
            Self::new(move || {
                Ok(VendorResponse {
                    status: 200,
                    body: body.clone(),
                })
            })
        }

        fn calls(&self) -> Vec<OutboundRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn execute(&self, request: &OutboundRequest) -> Result<VendorResponse, TransportError> {
            self.calls.lock().unwrap().push(request.clone());
            (self.responder)()
        }
    }

    fn channel() -> Channel {
        Channel::new(Uuid::new_v4(), "2020", "RW")
            .with_config(CONFIG_USERNAME, "Username")
            .with_config(CONFIG_PASSWORD, "Password")
            .with_config(CONFIG_API_KEY, "KEY")
    }

    fn message(channel: &Channel) -> OutgoingMessage {
        OutgoingMessage {
            id: MsgId(10),
            uuid: Uuid::new_v4(),
            channel_uuid: channel.uuid,
            urn: TelUrn::for_country("+250788383383", "RW"),
            text: "Simple Message".to_string(),
            attachments: vec!["image/jpeg:https://foo.bar/image.jpg".to_string()],
        }
    }

    fn sender(transport: Arc<MockTransport>) -> Sender {
        Sender::new(transport, SEND_URL)
    }

    #[tokio::test]
    async fn test_send_wired() {
        let transport = MockTransport::replying(r#"[{"id":"123"}]"#);
        let channel = channel();

        let outcome = sender(transport.clone())
            .send(&MemoryBackend::new(), &channel, &message(&channel))
            .await
            .unwrap();

        assert!(outcome.error.is_none());
        assert_eq!(outcome.status.status(), StatusValue::Wired);
        assert_eq!(outcome.status.external_id(), Some("123"));
        assert_eq!(outcome.status.key(), &CorrelationKey::InternalId(MsgId(10)));

        let logs = outcome.status.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status_code, Some(200));
        assert_eq!(logs[0].response, r#"[{"id":"123"}]"#);
        assert!(logs[0].error.is_none());
    }

    #[tokio::test]
    async fn test_send_request_shape() {
        let transport = MockTransport::replying(r#"[{"id":"123"}]"#);
        let channel = channel();

        sender(transport.clone())
            .send(&MemoryBackend::new(), &channel, &message(&channel))
            .await
            .unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        let request = &calls[0];

        assert_eq!(request.url, SEND_URL);
        assert_eq!(request.username, "Username");
        assert_eq!(request.password, "Password");
        assert_eq!(
            request.form,
            vec![
                ("address".to_string(), "+250788383383".to_string()),
                ("senderaddress".to_string(), "2020".to_string()),
                (
                    "message".to_string(),
                    "Simple Message\nhttps://foo.bar/image.jpg".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_api_key_not_sent() {
        let transport = MockTransport::replying(r#"[{"id":"123"}]"#);
        let channel = channel();

        sender(transport.clone())
            .send(&MemoryBackend::new(), &channel, &message(&channel))
            .await
            .unwrap();

        let request = &transport.calls()[0];
        assert!(request.form.iter().all(|(_, v)| v != "KEY"));
        assert!(!request.describe().contains("KEY"));
    }

    #[tokio::test]
    async fn test_send_missing_external_id() {
        let channel = channel();

        for body in [r#"[{"status":"ok"}]"#, r#"[{"id":""}]"#, "[]", "not json", r#"{"id":"123"}"#] {
            let transport = MockTransport::replying(body);
            let outcome = sender(transport)
                .send(&MemoryBackend::new(), &channel, &message(&channel))
                .await
                .unwrap();

            assert_eq!(outcome.status.status(), StatusValue::Errored, "body {}", body);
            assert_eq!(outcome.status.external_id(), None);
            match outcome.error {
                Some(AdapterError::ResponseFormat(m)) => assert_eq!(m, "no external id returned in body"),
                other => panic!("expected response format error, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_send_transport_failure_is_soft() {
        let transport = MockTransport::new(|| {
            Err(TransportError::Status {
                status: 401,
                body: "Unauthorized".to_string(),
            })
        });
        let channel = channel();

        let outcome = sender(transport.clone())
            .send(&MemoryBackend::new(), &channel, &message(&channel))
            .await
            .unwrap();

        match outcome.error {
            Some(ref e @ AdapterError::Transport(TransportError::Status { status: 401, .. })) => {
                assert_eq!(e.kind(), "transport");
            }
            ref other => panic!("expected transport error, got {:?}", other),
        }
        assert_eq!(outcome.status.status(), StatusValue::Errored);
        assert_eq!(transport.calls().len(), 1);

        let log = &outcome.status.logs()[0];
        assert_eq!(log.status_code, Some(401));
        assert_eq!(log.response, "Unauthorized");
        assert_eq!(log.error.as_deref(), Some("Message Send Error: vendor returned HTTP 401"));
    }

    #[tokio::test]
    async fn test_send_timeout_is_soft() {
        let transport = MockTransport::new(|| Err(TransportError::Timeout { timeout_ms: 30000 }));
        let channel = channel();

        let outcome = sender(transport)
            .send(&MemoryBackend::new(), &channel, &message(&channel))
            .await
            .unwrap();

        assert!(matches!(
            outcome.error,
            Some(AdapterError::Transport(TransportError::Timeout { timeout_ms: 30000 }))
        ));
        assert_eq!(outcome.status.status(), StatusValue::Errored);
        assert!(outcome.status.logs()[0]
            .error
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_credentials_make_no_request() {
        let cases = [
            (CONFIG_USERNAME, "username"),
            (CONFIG_PASSWORD, "password"),
            (CONFIG_API_KEY, "API key"),
        ];

        for (key, field) in cases {
            let transport = MockTransport::replying(r#"[{"id":"123"}]"#);
            let mut channel = channel();
            channel.config.remove(key);

            let err = sender(transport.clone())
                .send(&MemoryBackend::new(), &channel, &message(&channel))
                .await
                .unwrap_err();

            assert!(
                matches!(err, AdapterError::Configuration { field: f } if f == field),
                "got {:?}",
                err
            );
            assert_eq!(err.to_string(), format!("no {} set for BM channel", field));
            assert!(transport.calls().is_empty());
        }
    }

    #[test]
    fn test_external_id_from_body() {
        assert_eq!(external_id_from_body(r#"[{"id":"abc"},{"id":"def"}]"#), Some("abc".to_string()));
        assert_eq!(external_id_from_body(r#"[{"id":123}]"#), None);
        assert_eq!(external_id_from_body(""), None);
    }
}
