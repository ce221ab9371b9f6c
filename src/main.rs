mod config;
mod llm;
mod routes;
mod services;
mod state;

use tracing_subscriber::EnvFilter;

use crate::llm::config::LlmConfig;
use crate::llm::retry::RetryPolicy;
use crate::llm::types::LlmError;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match config::ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "server config invalid");
            std::process::exit(1);
        }
    };

    let settings = match services::settings::SettingsStore::load(config.settings_path.clone()).await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %e, path = %config.settings_path.display(), "settings load failed");
            std::process::exit(1);
        }
    };
    tracing::info!(path = %settings.path().display(), "settings loaded");

    // A missing GEMINI_API_KEY is not fatal: a key saved in settings also works.
    let base_llm = match LlmConfig::from_env() {
        Ok(llm) => Some(llm),
        Err(LlmError::MissingApiKey { .. }) => None,
        Err(e) => {
            tracing::error!(error = %e, "LLM config invalid");
            std::process::exit(1);
        }
    };

    let http = reqwest::Client::builder()
        .user_agent(concat!("ide-server/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("http client init failed");

    let port = config.port;
    tracing::info!(
        workspace = %config.workspace_path.display(),
        env = config.env.as_str(),
        "workspace ready"
    );
    let state = state::AppState::new(config, settings, base_llm, http, RetryPolicy::default());
    state.refresh_llm().await;

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "ide-server listening");
    axum::serve(listener, app).await.expect("server failed");
}
