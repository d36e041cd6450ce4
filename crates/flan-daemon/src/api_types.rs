//! Request and response types for the flan-daemon HTTP endpoints.
//!
//! Every response body is an [`Envelope`]. No business logic lives here.

use flan_engine::{Event, Oven, OrderId, Recipe, Session};
use flan_protocol::StatusLine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// FLAN response envelope. The HTTP status always equals `status.code`.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub protocol: &'static str,
    pub status: StatusLine,
    /// Wall clock, ms since the Unix epoch.
    pub timestamp: i64,
    /// Same instant, RFC 3339.
    pub timestamp_readable: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

fn default_portions() -> i64 {
    1
}

/// Body of `POST /v1/handshake` and of a HANDSHAKE packet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandshakeRequest {
    /// Omit to take the first idle oven.
    #[serde(default)]
    pub oven_id: Option<String>,
    /// Defaults to 180 on the JSON route and to the header temperature in a
    /// HANDSHAKE packet.
    #[serde(default)]
    pub temperature: Option<i64>,
}

/// Body of `POST /v1/orders` and of an ORDER packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub session_id: String,
    pub recipe_id: String,
    #[serde(default = "default_portions")]
    pub portions: i64,
    /// LOW | NORMAL | HIGH, case-insensitive. Defaults to NORMAL.
    #[serde(default)]
    pub priority: Option<String>,
}

/// Body of `POST /v1/packet`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketRequest {
    pub header: Value,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Response data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HandshakeData {
    pub session: Session,
    pub syn_ack: SynAck,
}

#[derive(Debug, Clone, Serialize)]
pub struct SynAck {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub oven_id: String,
    pub ready_in_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderAccepted {
    pub order_id: OrderId,
    pub session_id: String,
    pub recipe_id: String,
    pub estimated_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OvensData {
    pub ovens: Vec<Oven>,
    pub available: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OvenFaultData {
    pub oven: Oven,
    pub failed_orders: Vec<OrderId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OvenResetData {
    pub oven: Oven,
    pub was_faulted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipesData {
    pub recipes: Vec<Recipe>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryData {
    pub events: Vec<Event>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PingData {
    pub pong: bool,
    pub latency_ms: f64,
    pub texture: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointDoc {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
    pub network_equivalent: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocsData {
    pub protocol: &'static str,
    pub full_name: &'static str,
    pub rfc: &'static str,
    pub endpoints: Vec<EndpointDoc>,
    pub status_codes: Vec<StatusLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthData {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub config_hash: Option<String>,
}

/// `data` of an error envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorData {
    pub error: String,
}
