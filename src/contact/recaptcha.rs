use std::time::Duration;

use serde::Deserialize;

use crate::http::client::HttpClient;

pub const DEFAULT_RECAPTCHA_BASE_URL: &str = "https://www.google.com";
pub const MIN_HUMAN_SCORE: f64 = 0.5;

const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    Passed { score: f64 },
    Rejected(String),
}

pub trait BotVerifier {
    fn verify(
        &self,
        token: Option<&str>,
    ) -> impl std::future::Future<Output = Verification> + Send;
}

/// reCAPTCHA v3 `siteverify` client. Scores range from 0.0 (bot) to 1.0
/// (human).
#[derive(Debug, Clone)]
pub struct RecaptchaVerifier {
    http: HttpClient,
    secret_key: Option<String>,
    base_url: String,
}

impl RecaptchaVerifier {
    pub fn new(http: HttpClient, secret_key: Option<String>, base_url: String) -> Self {
        Self {
            http,
            secret_key: secret_key.filter(|v| !v.trim().is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/recaptcha/api/siteverify", self.base_url)
    }

    async fn siteverify(&self, secret: &str, token: &str) -> Result<SiteVerifyResponse, String> {
        let resp = self
            .http
            .post_form(
                &self.endpoint(),
                &[("secret", secret), ("response", token)],
                Some(VERIFY_TIMEOUT),
            )
            .await
            .map_err(|err| err.to_string())?;

        serde_json::from_str(&resp.body)
            .map_err(|err| format!("unexpected response (HTTP {}): {err}", resp.status))
    }
}

impl BotVerifier for RecaptchaVerifier {
    async fn verify(&self, token: Option<&str>) -> Verification {
        let Some(secret) = self.secret_key.as_deref() else {
            tracing::warn!("RECAPTCHA_SECRET_KEY not set");
            return Verification::Rejected("reCAPTCHA secret key not configured".to_string());
        };
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Verification::Rejected("reCAPTCHA token missing".to_string());
        };

        let result = match self.siteverify(secret, token).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(error = %err, "reCAPTCHA verification error");
                return Verification::Rejected(format!("reCAPTCHA verification error: {err}"));
            }
        };

        tracing::info!(
            success = result.success,
            score = result.score,
            action = %result.action,
            "reCAPTCHA verification"
        );

        if result.success && result.score >= MIN_HUMAN_SCORE {
            Verification::Passed {
                score: result.score,
            }
        } else if result.success {
            Verification::Rejected(format!("reCAPTCHA score too low: {}", result.score))
        } else {
            Verification::Rejected(format!(
                "reCAPTCHA verification failed: {:?}",
                result.error_codes
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    action: String,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::{BotVerifier, RecaptchaVerifier, Verification};
    use crate::http::client::HttpClient;
    use crate::http::debug::HttpDebugConfig;
    use reqwest::Client;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn verifier(secret: Option<&str>, base_url: String) -> RecaptchaVerifier {
        RecaptchaVerifier::new(
            HttpClient::new(Client::new(), HttpDebugConfig::disabled()),
            secret.map(ToString::to_string),
            base_url,
        )
    }

    async fn server_replying(body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/recaptcha/api/siteverify"))
            .and(body_string_contains("secret=s3cret"))
            .and(body_string_contains("response=tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn high_score_passes() {
        let server = server_replying(json!({"success": true, "score": 0.9, "action": "contact"})).await;

        let outcome = verifier(Some("s3cret"), server.uri()).verify(Some("tok")).await;
        assert_eq!(outcome, Verification::Passed { score: 0.9 });
    }

    #[tokio::test]
    async fn threshold_score_passes() {
        let server = server_replying(json!({"success": true, "score": 0.5})).await;

        let outcome = verifier(Some("s3cret"), server.uri()).verify(Some("tok")).await;
        assert_eq!(outcome, Verification::Passed { score: 0.5 });
    }

    #[tokio::test]
    async fn low_score_is_rejected_with_score() {
        let server = server_replying(json!({"success": true, "score": 0.3})).await;

        let outcome = verifier(Some("s3cret"), server.uri()).verify(Some("tok")).await;
        assert_eq!(
            outcome,
            Verification::Rejected("reCAPTCHA score too low: 0.3".to_string())
        );
    }

    #[tokio::test]
    async fn failed_verification_reports_error_codes() {
        let server = server_replying(json!({
            "success": false,
            "error-codes": ["invalid-input-response"]
        }))
        .await;

        let outcome = verifier(Some("s3cret"), server.uri()).verify(Some("tok")).await;
        assert_eq!(
            outcome,
            Verification::Rejected(
                "reCAPTCHA verification failed: [\"invalid-input-response\"]".to_string()
            )
        );
    }

    #[tokio::test]
    async fn missing_token_is_rejected_without_calling_google() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let v = verifier(Some("s3cret"), server.uri());
        assert_eq!(
            v.verify(None).await,
            Verification::Rejected("reCAPTCHA token missing".to_string())
        );
        assert_eq!(
            v.verify(Some("")).await,
            Verification::Rejected("reCAPTCHA token missing".to_string())
        );
    }

    #[tokio::test]
    async fn missing_secret_is_rejected() {
        let outcome = verifier(None, "http://127.0.0.1:9".to_string())
            .verify(Some("tok"))
            .await;
        assert_eq!(
            outcome,
            Verification::Rejected("reCAPTCHA secret key not configured".to_string())
        );
    }

    #[tokio::test]
    async fn garbage_response_is_a_verification_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let outcome = verifier(Some("s3cret"), server.uri()).verify(Some("tok")).await;
        let Verification::Rejected(reason) = outcome else {
            panic!("expected rejection");
        };
        assert!(reason.starts_with("reCAPTCHA verification error:"));
        assert!(reason.contains("HTTP 502"));
    }
}
