//! tally-daemon entry point.
//!
//! Sets up tracing, builds the shared state, wires middleware, optionally
//! starts the schedule loop, and serves HTTP until ctrl-c.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tally_config::ConfigSource;
use tally_daemon::{routes, state};
use tally_runtime::{ConfiguredPass, Runner};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let source = config_source_from_env();
    info!(source = %source.describe(), "config source selected");

    let runner = Runner::new(Arc::new(ConfiguredPass::new(source)));
    let schedule = state::interval_from_env();
    let shared = Arc::new(state::AppState::with_schedule(runner, schedule));

    if let Some(every) = schedule {
        info!(interval_secs = every.as_secs(), "schedule loop enabled");
        state::spawn_scheduler(Arc::clone(&shared), every);
    }

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8898)));
    info!("tally-daemon listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr} failed"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// `TALLY_CONFIG` holds comma-separated config paths in merge order;
/// otherwise the source is auto-detected.
fn config_source_from_env() -> ConfigSource {
    match std::env::var("TALLY_CONFIG") {
        Ok(raw) if !raw.trim().is_empty() => ConfigSource::File(
            raw.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect(),
        ),
        _ => ConfigSource::detect(),
    }
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("TALLY_DAEMON_ADDR").ok()?.parse().ok()
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
