//! flan-daemon entry point.
//!
//! Thin on purpose: set up tracing, resolve config, build the kitchen, start
//! the scheduler, wire middleware and serve. Handlers live in `routes.rs`;
//! shared state lives in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use flan_config::{resolve_paths, FlanConfig, UnusedKeyPolicy};
use flan_daemon::{routes, state};
use flan_engine::{Kitchen, StaticCatalog, SystemClock};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience. Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let (config, config_hash) = load_config()?;
    let tick = Duration::from_millis(config.scheduler.tick_ms);

    let kitchen = Kitchen::new(
        config.engine_config(),
        Arc::new(SystemClock),
        Arc::new(StaticCatalog::standard()),
    )
    .context("build kitchen")?;
    let kitchen = Arc::new(kitchen);

    state::spawn_scheduler(Arc::clone(&kitchen), tick);

    let shared = Arc::new(state::AppState::new(kitchen, config_hash));
    let app = routes::build_router(shared)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 5000)));
    info!("flan-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
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

/// `FLAN_CONFIG` is a comma-separated list of YAML layers, merged in order.
/// Without it the daemon runs on built-in defaults.
fn load_config() -> anyhow::Result<(FlanConfig, Option<String>)> {
    let Ok(raw) = std::env::var("FLAN_CONFIG") else {
        info!("FLAN_CONFIG not set; using built-in defaults");
        return Ok((FlanConfig::default(), None));
    };

    let paths: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let resolved = resolve_paths(&paths, UnusedKeyPolicy::Warn)
        .with_context(|| format!("load FLAN_CONFIG={raw}"))?;

    for pointer in &resolved.unused.unused_leaf_pointers {
        warn!(pointer = %pointer, "config key not consumed");
    }
    info!(
        config_hash = %resolved.loaded.config_hash,
        layers = paths.len(),
        "config resolved"
    );
    Ok((resolved.config, Some(resolved.loaded.config_hash)))
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("FLAN_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5000",
        "http://127.0.0.1:5000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
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
