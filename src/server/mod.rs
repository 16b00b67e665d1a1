//! HTTP surface: `/health`, `/chat` and `/contact`.
//!
//! Every collaborator is injected through [`ServerContext`], built once at
//! startup and shared by all requests.

mod error;
mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::agent::AgentConfig;
use crate::agent::dispatch::ToolRegistry;
use crate::contact::email::Mailer;
use crate::contact::recaptcha::BotVerifier;
use crate::corpus::GroundingCorpus;
use crate::llm::provider::LlmProvider;
use crate::notify::NotificationSink;

pub use error::ApiError;
pub use handlers::{ChatRequest, parse_chat_request};

pub struct ServerContext<P, N, V, M> {
    pub corpus: GroundingCorpus,
    pub prompt_directives: Option<String>,
    pub provider: P,
    pub tools: ToolRegistry<N>,
    pub agent: AgentConfig,
    pub verifier: V,
    pub mailer: M,
    pub mail_from: String,
    pub contact_recipient: String,
}

pub fn build_router<P, N, V, M>(ctx: Arc<ServerContext<P, N, V, M>>) -> Router
where
    P: LlmProvider + Send + Sync + 'static,
    N: NotificationSink + Send + Sync + 'static,
    V: BotVerifier + Send + Sync + 'static,
    M: Mailer + Send + Sync + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/chat", post(handlers::chat::<P, N, V, M>))
        .route("/contact", post(handlers::contact::<P, N, V, M>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
