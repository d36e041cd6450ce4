//! Shared runtime state for flan-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The kitchen owns all
//! protocol state; this module only adds build metadata and the scheduler.

use std::sync::Arc;
use std::time::Duration;

use flan_engine::Kitchen;
use serde::Serialize;
use tracing::debug;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub kitchen: Arc<Kitchen>,
    pub build: BuildInfo,
    /// Hash of the resolved config layers, when the daemon booted from files.
    pub config_hash: Option<String>,
}

impl AppState {
    pub fn new(kitchen: Arc<Kitchen>, config_hash: Option<String>) -> Self {
        Self {
            kitchen,
            build: BuildInfo {
                service: "flan-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            config_hash,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Spawn a background task that runs `Kitchen::tick` every `interval`.
///
/// Ticks settle orders and sessions that nobody is polling, so stream
/// subscribers see progress and expiry without a request to drive them.
pub fn spawn_scheduler(kitchen: Arc<Kitchen>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            kitchen.tick();
            debug!(now_ms = kitchen.now_ms(), "scheduler tick");
        }
    })
}
