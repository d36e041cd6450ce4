//! Shared fixtures for FLAN scenario tests.
//!
//! [`KitchenFixture`] is a kitchen on a [`ManualClock`]: nothing moves until
//! the test says so, so every scenario is deterministic and sleep-free.

use std::fs;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use flan_config::{resolve_from_strings, UnusedKeyPolicy};
use flan_engine::{
    Clock, EngineConfig, Kitchen, ManualClock, OvenId, SessionId, SessionState, StaticCatalog,
};
use flan_protocol::{PacketHeader, RequestType, SealOptions};
use serde_json::{json, Value};

/// Start time of every fixture clock. Non-zero so "unset" timestamps stand out.
pub const FIXTURE_START_MS: u64 = 1_000_000;

pub struct KitchenFixture {
    pub clock: Arc<ManualClock>,
    pub kitchen: Arc<Kitchen>,
}

impl KitchenFixture {
    /// Default kitchen: 3 ovens, the standard recipe catalog.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// # Panics
    /// If `config` does not validate. Fixtures are test-only.
    pub fn with_config(config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::new(FIXTURE_START_MS));
        let kitchen = Kitchen::new(config, clock.clone(), Arc::new(StaticCatalog::standard()))
            .expect("fixture config must validate");
        Self {
            clock,
            kitchen: Arc::new(kitchen),
        }
    }

    /// Build the kitchen from YAML layers, as the daemon does.
    pub fn from_yaml(layers: &[&str]) -> Result<Self> {
        let resolved = resolve_from_strings(layers, UnusedKeyPolicy::Fail)?;
        let clock = Arc::new(ManualClock::new(FIXTURE_START_MS));
        let kitchen = Kitchen::new(
            resolved.config.engine_config(),
            clock.clone(),
            Arc::new(StaticCatalog::standard()),
        )?;
        Ok(Self {
            clock,
            kitchen: Arc::new(kitchen),
        })
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Move the clock and run one scheduler tick.
    pub fn advance(&self, ms: u64) -> u64 {
        let now = self.clock.advance(ms);
        self.kitchen.tick();
        now
    }

    /// Handshake on oven `n` and wait out its preheat ramp.
    ///
    /// # Panics
    /// If the handshake is refused.
    pub fn ready_session(&self, n: u32, temperature: i64) -> SessionId {
        let id = self
            .kitchen
            .open_session(Some(&OvenId::numbered(n)), temperature)
            .expect("handshake refused");
        let session = self.kitchen.get_session(&id).expect("session vanished");
        self.clock.set(session.ready_at);
        assert_eq!(
            self.kitchen.get_session(&id).expect("session vanished").state,
            SessionState::Ready
        );
        id
    }
}

impl Default for KitchenFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// `{header, body}` with size and checksum filled in.
pub fn sealed_packet(request_type: RequestType, body: &str) -> Value {
    sealed_packet_with(request_type, body, SealOptions::default())
}

pub fn sealed_packet_with(request_type: RequestType, body: &str, opts: SealOptions) -> Value {
    json!({
        "header": PacketHeader::seal(request_type, body, opts).to_raw(),
        "body": body,
    })
}

/// Read a `{header, body}` packet file.
pub fn load_packet_json(path: &str) -> Result<(Value, String)> {
    let raw = fs::read_to_string(path).with_context(|| format!("read packet: {path}"))?;
    let v: Value = serde_json::from_str(&raw).context("parse packet json")?;
    let Some(header) = v.get("header").cloned() else {
        bail!("packet file has no header: {path}");
    };
    let body = v
        .get("body")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok((header, body))
}
