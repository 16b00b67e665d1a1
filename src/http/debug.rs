use reqwest::Url;
use reqwest::header::HeaderValue;
use serde_json::Value;

const REDACTION: &str = "***REDACTED***";

// Exact keys carrying credentials for the services we call: OpenAI and
// Resend (authorization), Pushover (token, user), reCAPTCHA (secret, response).
const SENSITIVE_KEYS: [&str; 8] = [
    "authorization",
    "token",
    "user",
    "secret",
    "response",
    "password",
    "api_key",
    "x-api-key",
];
const SENSITIVE_SUFFIXES: [&str; 3] = ["_token", "_secret", "_key"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpDebugConfig {
    pub enabled: bool,
    pub redact_secrets: bool,
    pub max_body_chars: usize,
}

impl HttpDebugConfig {
    pub fn from_verbose(verbose: bool) -> Self {
        Self {
            enabled: verbose,
            redact_secrets: true,
            max_body_chars: 4_000,
        }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self::from_verbose(false)
    }
}

pub fn redact_url(url: &Url, enable_redaction: bool) -> String {
    if !enable_redaction || url.query().is_none() {
        return url.as_str().to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let shown = if is_sensitive_key(&k) {
                REDACTION.to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), shown)
        })
        .collect();

    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.as_str().to_string()
}

pub fn redact_header_value(name: &str, value: &HeaderValue, enable_redaction: bool) -> String {
    if enable_redaction && is_sensitive_key(name) {
        return REDACTION.to_string();
    }
    value
        .to_str()
        .map(ToString::to_string)
        .unwrap_or_else(|_| "<non-utf8>".to_string())
}

/// Redacts sensitive keys anywhere inside a JSON body. Non-JSON bodies are
/// returned untouched.
pub fn redact_text_body(raw: &str, enable_redaction: bool) -> String {
    if !enable_redaction {
        return raw.to_string();
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(mut json) => {
            redact_json_value(&mut json);
            serde_json::to_string(&json).unwrap_or_else(|_| raw.to_string())
        }
        Err(_) => raw.to_string(),
    }
}

pub fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let count = input.chars().count();
    if count <= max_chars {
        return input.to_string();
    }

    let truncated = input.chars().take(max_chars).collect::<String>();
    format!("{truncated}... <truncated {} chars>", count - max_chars)
}

fn redact_json_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, item) in map.iter_mut() {
                if is_sensitive_key(key) {
                    *item = Value::String(REDACTION.to_string());
                } else {
                    redact_json_value(item);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_json_value),
        _ => {}
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.contains(&key.as_str())
        || SENSITIVE_SUFFIXES.iter().any(|suffix| key.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::{
        HttpDebugConfig, is_sensitive_key, redact_header_value, redact_text_body, redact_url,
        truncate_for_log,
    };
    use reqwest::Url;
    use reqwest::header::HeaderValue;

    #[test]
    fn from_verbose_defaults_to_redaction() {
        let cfg = HttpDebugConfig::from_verbose(true);
        assert!(cfg.enabled);
        assert!(cfg.redact_secrets);
        assert_eq!(cfg.max_body_chars, 4_000);
    }

    #[test]
    fn redact_url_masks_sensitive_query_params() {
        let url = Url::parse("https://example.com/path?secret=super-secret&view=full").expect("url");
        let redacted = redact_url(&url, true);
        assert!(redacted.contains("view=full"));
        assert!(!redacted.contains("super-secret"));
    }

    #[test]
    fn redact_url_leaves_urls_without_query_alone() {
        let url = Url::parse("https://api.openai.com/v1/chat/completions").expect("url");
        assert_eq!(
            redact_url(&url, true),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn redact_header_value_masks_authorization_only() {
        let bearer = HeaderValue::from_static("Bearer sk-live");
        let json = HeaderValue::from_static("application/json");
        assert_eq!(
            redact_header_value("Authorization", &bearer, true),
            "***REDACTED***"
        );
        assert_eq!(
            redact_header_value("content-type", &json, true),
            "application/json"
        );
        assert_eq!(redact_header_value("authorization", &bearer, false), "Bearer sk-live");
    }

    #[test]
    fn redact_text_body_masks_form_credentials_but_keeps_message() {
        let raw = r#"{"token":"app","user":"u-1","message":"Recording Ada with email a@b.com"}"#;
        let redacted = redact_text_body(raw, true);
        assert!(redacted.contains("\"token\":\"***REDACTED***\""));
        assert!(redacted.contains("\"user\":\"***REDACTED***\""));
        assert!(redacted.contains("Recording Ada with email a@b.com"));
    }

    #[test]
    fn redact_text_body_masks_nested_keys_and_ignores_role_values() {
        let raw = r#"{"messages":[{"role":"user","content":"hi"}],"nested":{"resend_api_key":"123"}}"#;
        let redacted = redact_text_body(raw, true);
        assert!(redacted.contains("\"role\":\"user\""));
        assert!(redacted.contains("\"resend_api_key\":\"***REDACTED***\""));
        assert!(!redacted.contains("123"));
    }

    #[test]
    fn suffix_rules_catch_provider_specific_keys() {
        assert!(is_sensitive_key("recaptcha_secret"));
        assert!(is_sensitive_key("PUSHOVER_TOKEN"));
        assert!(!is_sensitive_key("message"));
        assert!(!is_sensitive_key("tool_call_id"));
    }

    #[test]
    fn truncate_for_log_appends_marker() {
        let out = truncate_for_log("abcdefghijklmnopqrstuvwxyz", 5);
        assert!(out.starts_with("abcde"));
        assert!(out.contains("<truncated 21 chars>"));
    }
}
