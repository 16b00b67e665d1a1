pub mod agent;
pub mod cli;
pub mod config;
pub mod contact;
pub mod corpus;
pub mod http;
pub mod llm;
pub mod notify;
pub mod server;

use std::sync::Arc;
use std::time::Duration;

use agent::dispatch::ToolRegistry;
use anyhow::{Result, anyhow};
use axum::Router;
use cli::CliArgs;
use config::AppConfig;
use contact::email::ResendMailer;
use contact::recaptcha::RecaptchaVerifier;
use corpus::GroundingCorpus;
use http::client::HttpClient;
use http::debug::HttpDebugConfig;
use llm::openai::OpenAiProvider;
use notify::PushoverSink;
use server::{ServerContext, build_router};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

pub async fn run(args: CliArgs) -> Result<()> {
    init_tracing(args.verbose);

    let mut config = AppConfig::load_with_path(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.port = port;
    }
    tracing::info!(
        path = %config.config_path.display(),
        explicit = config.config_is_explicit,
        found = config.config_path.is_file(),
        "configuration loaded"
    );

    let corpus =
        GroundingCorpus::load(&config.persona_name, &config.summary_path, &config.profile_path)?;
    let http = build_http_client(&config, args.verbose)?;
    let router = build_app(&config, corpus, http)?;

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|err| anyhow!("Failed to bind {addr}: {err}"))?;
    tracing::info!(%addr, persona = %config.persona_name, "persona chat listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Wires the production collaborators into a router. Fails when the model
/// provider cannot be constructed (no API key).
pub fn build_app(config: &AppConfig, corpus: GroundingCorpus, http: HttpClient) -> Result<Router> {
    let provider = OpenAiProvider::new(
        http.clone(),
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        config.openai_base_url.clone(),
    )
    .map_err(|err| anyhow!("Failed to initialise model provider: {err}"))?;

    let sink = PushoverSink::new(
        http.clone(),
        config.pushover_token.clone(),
        config.pushover_user.clone(),
        config.pushover_base_url.clone(),
    );
    if !sink.is_configured() {
        tracing::warn!("PUSHOVER_TOKEN or PUSHOVER_USER not set; notifications are disabled");
    }

    let verifier = RecaptchaVerifier::new(
        http.clone(),
        config.recaptcha_secret_key.clone(),
        config.recaptcha_base_url.clone(),
    );
    let mailer = ResendMailer::new(
        http,
        config.resend_api_key.clone(),
        config.resend_base_url.clone(),
    );

    tracing::info!(model = %provider.model(), "model provider ready");

    let ctx = ServerContext {
        corpus,
        prompt_directives: config.prompt_directives.clone(),
        provider,
        tools: ToolRegistry::new(sink),
        agent: config.agent,
        verifier,
        mailer,
        mail_from: config.resend_from.clone(),
        contact_recipient: config.contact_recipient.clone(),
    };

    Ok(build_router(Arc::new(ctx)))
}

pub fn build_http_client(config: &AppConfig, verbose: bool) -> Result<HttpClient> {
    let inner = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.request_timeout_ms))
        .build()
        .map_err(|err| anyhow!("Failed to build HTTP client: {err}"))?;
    Ok(HttpClient::new(inner, HttpDebugConfig::from_verbose(verbose)))
}

fn init_tracing(verbose: bool) {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if verbose {
        if let Ok(directive) = "persona_chat=debug".parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
