use anyhow::{Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::agent::AgentConfig;
use crate::contact::email::{DEFAULT_RESEND_BASE_URL, DEFAULT_RESEND_FROM};
use crate::contact::recaptcha::DEFAULT_RECAPTCHA_BASE_URL;
use crate::llm::openai::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
use crate::notify::DEFAULT_PUSHOVER_BASE_URL;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_SUMMARY_PATH: &str = "me/summary.txt";
pub const DEFAULT_PROFILE_PATH: &str = "me/linkedin.pdf";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;

const CONFIG_DIR_NAME: &str = "persona-chat";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub config_path: PathBuf,
    pub config_is_explicit: bool,
    pub persona_name: String,
    pub summary_path: PathBuf,
    pub profile_path: PathBuf,
    pub prompt_directives: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub pushover_token: Option<String>,
    pub pushover_user: Option<String>,
    pub pushover_base_url: String,
    pub recaptcha_secret_key: Option<String>,
    pub recaptcha_base_url: String,
    pub resend_api_key: Option<String>,
    pub resend_from: String,
    pub resend_base_url: String,
    pub contact_recipient: String,
    pub host: String,
    pub port: u16,
    pub request_timeout_ms: u64,
    pub agent: AgentConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFileConfig {
    persona_name: Option<String>,
    summary_path: Option<String>,
    profile_path: Option<String>,
    prompt_directives: Option<String>,
    openai_api_key: Option<String>,
    openai_model: Option<String>,
    openai_base_url: Option<String>,
    pushover_token: Option<String>,
    pushover_user: Option<String>,
    pushover_base_url: Option<String>,
    recaptcha_secret_key: Option<String>,
    recaptcha_base_url: Option<String>,
    resend_api_key: Option<String>,
    resend_from: Option<String>,
    resend_base_url: Option<String>,
    contact_recipient: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    request_timeout_ms: Option<u64>,
    agent: Option<RawAgentConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAgentConfig {
    max_round_trips: Option<usize>,
    per_call_timeout_ms: Option<u64>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    /// Layers, lowest to highest precedence: built-in defaults, the TOML
    /// file, then the process environment (including a local `.env`).
    pub fn load_with_path(explicit_path: Option<&Path>) -> Result<Self> {
        let (config_path, config_is_explicit) = match explicit_path {
            Some(path) => (path.to_path_buf(), true),
            None => (discover_config_path()?, false),
        };
        if config_is_explicit && !config_path.is_file() {
            bail!(
                "Failed to load config {}: file does not exist",
                config_path.display()
            );
        }
        let file = load_file_config(&config_path)?.unwrap_or_default();

        load_dotenv();

        let persona_name = layered("PERSONA_NAME", file.persona_name.as_deref())
            .ok_or_else(|| missing_key(&config_path, "persona_name", "PERSONA_NAME"))?;
        let contact_recipient =
            layered("CONTACT_RECIPIENT", file.contact_recipient.as_deref()).ok_or_else(|| {
                missing_key(&config_path, "contact_recipient", "CONTACT_RECIPIENT")
            })?;

        let port = match env_non_empty("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|err| anyhow!("Failed to load config: PORT '{raw}' is invalid: {err}"))?,
            None => file.port.unwrap_or(DEFAULT_PORT),
        };

        let defaults = AgentConfig::default();
        let agent = match &file.agent {
            Some(raw) => AgentConfig {
                max_round_trips: raw.max_round_trips.unwrap_or(defaults.max_round_trips),
                per_call_timeout_ms: raw
                    .per_call_timeout_ms
                    .unwrap_or(defaults.per_call_timeout_ms),
            },
            None => defaults,
        };
        if agent.max_round_trips == 0 {
            return Err(config_error(
                &config_path,
                "agent.max_round_trips",
                "must be at least 1",
            ));
        }
        if agent.per_call_timeout_ms == 0 {
            return Err(config_error(
                &config_path,
                "agent.per_call_timeout_ms",
                "must be at least 1",
            ));
        }

        Ok(Self {
            persona_name,
            summary_path: PathBuf::from(
                layered("SUMMARY_PATH", file.summary_path.as_deref())
                    .unwrap_or_else(|| DEFAULT_SUMMARY_PATH.to_string()),
            ),
            profile_path: PathBuf::from(
                layered("PROFILE_PATH", file.profile_path.as_deref())
                    .unwrap_or_else(|| DEFAULT_PROFILE_PATH.to_string()),
            ),
            prompt_directives: layered("PROMPT_DIRECTIVES", file.prompt_directives.as_deref()),
            openai_api_key: layered("OPENAI_API_KEY", file.openai_api_key.as_deref()),
            openai_model: layered("OPENAI_MODEL", file.openai_model.as_deref())
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_base_url: layered("OPENAI_BASE_URL", file.openai_base_url.as_deref())
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            pushover_token: layered("PUSHOVER_TOKEN", file.pushover_token.as_deref()),
            pushover_user: layered("PUSHOVER_USER", file.pushover_user.as_deref()),
            pushover_base_url: layered("PUSHOVER_BASE_URL", file.pushover_base_url.as_deref())
                .unwrap_or_else(|| DEFAULT_PUSHOVER_BASE_URL.to_string()),
            recaptcha_secret_key: layered(
                "RECAPTCHA_SECRET_KEY",
                file.recaptcha_secret_key.as_deref(),
            ),
            recaptcha_base_url: layered("RECAPTCHA_BASE_URL", file.recaptcha_base_url.as_deref())
                .unwrap_or_else(|| DEFAULT_RECAPTCHA_BASE_URL.to_string()),
            resend_api_key: layered("RESEND_API_KEY", file.resend_api_key.as_deref()),
            resend_from: layered("RESEND_FROM", file.resend_from.as_deref())
                .unwrap_or_else(|| DEFAULT_RESEND_FROM.to_string()),
            resend_base_url: layered("RESEND_BASE_URL", file.resend_base_url.as_deref())
                .unwrap_or_else(|| DEFAULT_RESEND_BASE_URL.to_string()),
            contact_recipient,
            host: layered("HOST", file.host.as_deref()).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            request_timeout_ms: file
                .request_timeout_ms
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
            agent,
            config_path,
            config_is_explicit,
        })
    }
}

// Variables already present in the process environment win over `.env`.
fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "ignoring unreadable .env file"),
    }
}

fn discover_config_path() -> Result<PathBuf> {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if trimmed.is_empty() {
            bail!("Failed to resolve config path: XDG_CONFIG_HOME is set but empty");
        }

        return Ok(PathBuf::from(trimmed)
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| anyhow!("Failed to resolve config path: HOME directory is unavailable"))?;

    Ok(home
        .join(".config")
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME))
}

fn load_file_config(config_path: &Path) -> Result<Option<RawFileConfig>> {
    if !config_path.is_file() {
        return Ok(None);
    }

    let config_text = fs::read_to_string(config_path).map_err(|err| {
        anyhow!(
            "Failed to load config {}: unable to read file: {err}",
            config_path.display()
        )
    })?;

    toml::from_str(&config_text)
        .map(Some)
        .map_err(|err| anyhow!("Failed to load config {}: {err}", config_path.display()))
}

fn layered(env_key: &str, file_value: Option<&str>) -> Option<String> {
    env_non_empty(env_key).or_else(|| file_value.and_then(non_empty).map(ToOwned::to_owned))
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .and_then(|value| non_empty(&value).map(ToOwned::to_owned))
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn missing_key(config_path: &Path, key: &str, env_key: &str) -> anyhow::Error {
    config_error(
        config_path,
        key,
        &format!("is required (set {env_key} or `{key}` in the config file)"),
    )
}

fn config_error(config_path: &Path, key_path: &str, reason: &str) -> anyhow::Error {
    anyhow!(
        "Failed to load config {}: {key_path}: {reason}",
        config_path.display()
    )
}
