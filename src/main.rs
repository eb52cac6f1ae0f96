mod analyzer;
mod config;
mod error;
mod insight;
mod model;
mod parser;
mod server;
mod service;
mod utils;

use config::AppConfig;
use insight::{BasicEngine, GeminiEngine, InsightEngine};
use parser::GooglePayParser;
use server::{AppState, build_router};
use service::{AnalysisService, UpstreamPolicy};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration from the environment (and .env)
    let config = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            init_tracing("info");
            error!("Config load error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    init_tracing(&config.log_level);

    // Set panic hook to log details about any panic
    std::panic::set_hook(Box::new(|panic_info| {
        error!("😱 Panic occurred: {}", panic_info);
    }));

    let engine: Arc<dyn InsightEngine> = match &config.gemini {
        Some(gemini) => match GeminiEngine::new(gemini.clone(), config.ai_timeout) {
            Ok(engine) => Arc::new(engine),
            Err(e) => {
                error!("Failed to create Gemini client: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            warn!("GEMINI_API_KEY is not set, /analyze will use basic analysis");
            Arc::new(BasicEngine::new())
        }
    };

    let service = AnalysisService::new(
        Arc::new(GooglePayParser::new()),
        engine,
        UpstreamPolicy::from_config(&config),
    );
    info!(
        ai_engine = service.engine_name(),
        timeout_secs = config.ai_timeout.as_secs(),
        max_retries = config.ai_max_retries,
        "🚀 Analyzer starting"
    );

    let app = build_router(
        AppState {
            service: Arc::new(service),
        },
        config.max_upload_bytes,
    );

    let addr: SocketAddr = match config.bind_addr().parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid bind address {}: {}", config.bind_addr(), e);
            return ExitCode::FAILURE;
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!(%addr, "listening");
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("🛑 Analyzer stopped.");
    ExitCode::SUCCESS
}

/// Reads `RUST_LOG`, then `LOG_LEVEL`, then falls back to `default_level`.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt().with_env_filter(filter).with_target(true).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
