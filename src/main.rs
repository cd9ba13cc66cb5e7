use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, EnvFilter};

use listing_genius::{
    config::AppConfig,
    controller::ViewController,
    export::ExportFont,
    gemini::GeminiClient,
    history::{FileStore, HistoryCache},
    routes::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env()?;
    match &config.gemini.api_key {
        Some(key) => tracing::info!("Using API key: {}...", key.chars().take(6).collect::<String>()),
        None => tracing::warn!("GEMINI_API_KEY is not set; generations will ask for a key"),
    }

    let store = FileStore::new(&config.history_dir);
    tracing::info!("History file: {}", store.path().display());
    let history = HistoryCache::load(Box::new(store));

    let gemini = GeminiClient::new(config.gemini.clone());
    let controller = ViewController::new(history).with_credential_missing(!gemini.has_credential());
    let state = AppState::new(controller, Arc::new(gemini))
        .with_export_font(ExportFont::discover(config.export_font.as_deref()));

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        );

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    tracing::info!(addr = %config.addr, "Starting server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
