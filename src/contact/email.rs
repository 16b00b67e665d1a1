use std::error::Error;
use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::http::client::HttpClient;

pub const DEFAULT_RESEND_BASE_URL: &str = "https://api.resend.com";
pub const DEFAULT_RESEND_FROM: &str = "onboarding@resend.dev";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailError {
    NotConfigured,
    HttpStatus { status: u16, body: String },
    Transport(String),
}

impl Display for MailError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "missing RESEND_API_KEY"),
            Self::HttpStatus { status, body } => {
                write!(f, "email send failed with status {status}: {body}")
            }
            Self::Transport(msg) => write!(f, "email transport error: {msg}"),
        }
    }
}

impl Error for MailError {}

pub trait Mailer {
    fn send(
        &self,
        email: OutboundEmail,
    ) -> impl std::future::Future<Output = Result<(), MailError>> + Send;
}

#[derive(Debug, Clone)]
pub struct ResendMailer {
    http: HttpClient,
    api_key: Option<String>,
    base_url: String,
}

impl ResendMailer {
    pub fn new(http: HttpClient, api_key: Option<String>, base_url: String) -> Self {
        Self {
            http,
            api_key: api_key.filter(|v| !v.trim().is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/emails", self.base_url)
    }
}

impl Mailer for ResendMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), MailError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(MailError::NotConfigured);
        };

        let resp = self
            .http
            .post_json(&self.endpoint(), Some(api_key), &email)
            .await
            .map_err(|err| MailError::Transport(err.to_string()))?;

        if !resp.is_success() {
            return Err(MailError::HttpStatus {
                status: resp.status,
                body: resp.body.chars().take(400).collect(),
            });
        }

        tracing::info!(to = %email.to, subject = %email.subject, "contact email sent");
        Ok(())
    }
}
