//! Outbound push notifications used by the assistant's tools.

use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::http::client::HttpClient;

pub const DEFAULT_PUSHOVER_BASE_URL: &str = "https://api.pushover.net";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    NotConfigured,
    HttpStatus { status: u16, body: String },
    Transport(String),
}

impl Display for NotifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "missing PUSHOVER_TOKEN or PUSHOVER_USER"),
            Self::HttpStatus { status, body } => {
                write!(f, "notification failed with status {status}: {body}")
            }
            Self::Transport(msg) => write!(f, "notification transport error: {msg}"),
        }
    }
}

impl Error for NotifyError {}

pub type NotifyResult<T> = std::result::Result<T, NotifyError>;

/// Best-effort delivery of a short text message.
///
/// Callers receive the outcome but are free to ignore it; tools do, because
/// the recording contract they expose to the model is "accepted".
pub trait NotificationSink {
    fn send(&self, text: &str) -> impl std::future::Future<Output = NotifyResult<()>> + Send;
}

#[derive(Debug, Clone)]
pub struct PushoverSink {
    http: HttpClient,
    credentials: Option<(String, String)>,
    base_url: String,
}

impl PushoverSink {
    pub fn new(
        http: HttpClient,
        token: Option<String>,
        user: Option<String>,
        base_url: String,
    ) -> Self {
        let credentials = token
            .filter(|v| !v.trim().is_empty())
            .zip(user.filter(|v| !v.trim().is_empty()));

        Self {
            http,
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}/1/messages.json", self.base_url)
    }
}

impl NotificationSink for PushoverSink {
    async fn send(&self, text: &str) -> NotifyResult<()> {
        let Some((token, user)) = &self.credentials else {
            return Err(NotifyError::NotConfigured);
        };

        let resp = self
            .http
            .post_form(
                &self.endpoint(),
                &[("token", token.as_str()), ("user", user.as_str()), ("message", text)],
                None,
            )
            .await
            .map_err(|err| NotifyError::Transport(err.to_string()))?;

        if !resp.is_success() {
            return Err(NotifyError::HttpStatus {
                status: resp.status,
                body: resp.body.chars().take(400).collect(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{NotificationSink, NotifyError, PushoverSink};
    use crate::http::client::HttpClient;
    use crate::http::debug::HttpDebugConfig;
    use reqwest::Client;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http() -> HttpClient {
        HttpClient::new(Client::new(), HttpDebugConfig::disabled())
    }

    #[tokio::test]
    async fn send_posts_credentials_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/messages.json"))
            .and(body_string_contains("token=app-token"))
            .and(body_string_contains("user=user-key"))
            .and(body_string_contains("message=Recording+hello"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":1}"#))
            .expect(1)
            .mount(&server)
            .await;

        let sink = PushoverSink::new(
            http(),
            Some("app-token".to_string()),
            Some("user-key".to_string()),
            server.uri(),
        );

        sink.send("Recording hello").await.expect("delivered");
    }

    #[tokio::test]
    async fn send_reports_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid token"))
            .mount(&server)
            .await;

        let sink = PushoverSink::new(
            http(),
            Some("bad".to_string()),
            Some("user-key".to_string()),
            server.uri(),
        );

        let err = sink.send("hi").await.expect_err("should fail");
        assert_eq!(
            err,
            NotifyError::HttpStatus {
                status: 400,
                body: "invalid token".to_string()
            }
        );
    }

    #[tokio::test]
    async fn send_without_credentials_is_not_configured() {
        let sink = PushoverSink::new(
            http(),
            Some("app-token".to_string()),
            Some(" ".to_string()),
            "http://127.0.0.1:9".to_string(),
        );

        assert!(!sink.is_configured());
        assert_eq!(sink.send("hi").await, Err(NotifyError::NotConfigured));
    }
}
