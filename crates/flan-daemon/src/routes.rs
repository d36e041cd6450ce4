//! Axum router and all HTTP handlers for flan-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Every handler answers with a FLAN [`Envelope`] whose
//! HTTP status equals the FLAN code, errors included.

use std::{convert::Infallible, str::FromStr, sync::Arc, time::Instant};

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use flan_engine::{EngineError, EventKind, Kitchen, OrderId, OvenId, OvenState, Priority, SessionId};
use flan_protocol::{
    map, Outcome, PacketError, RequestType, StatusClass, StatusCode as FlanStatus, PROTOCOL_NAME,
};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    api_types::{
        DocsData, EndpointDoc, Envelope, ErrorData, HandshakeData, HandshakeRequest, HealthData,
        HistoryData, HistoryQuery, OrderAccepted, OrderRequest, OvenFaultData, OvenResetData,
        OvensData, PacketRequest, PingData, RecipesData, SynAck,
    },
    state::AppState,
};

/// Handshake temperature when the JSON route omits one.
const DEFAULT_TEMPERATURE: i64 = 180;
const DEFAULT_HISTORY_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/packet", post(packet))
        .route("/v1/handshake", post(handshake))
        .route("/v1/orders", post(create_order))
        .route("/v1/orders/:id", get(order_status))
        .route("/v1/sessions/:id", get(session_status))
        .route("/v1/sessions/:id/close", post(close_session))
        .route("/v1/ovens", get(ovens))
        .route("/v1/ovens/:id/fault", post(fault_oven))
        .route("/v1/ovens/:id/reset", post(reset_oven))
        .route("/v1/recipes", get(recipes))
        .route("/v1/history", get(history))
        .route("/v1/stream", get(stream))
        .route("/v1/ping", get(ping))
        .route("/v1/teapot", get(teapot))
        .route("/v1/docs", get(docs))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Envelope helpers
// ---------------------------------------------------------------------------

fn envelope<T: Serialize>(status: FlanStatus, data: Option<T>, message: Option<String>) -> Response {
    let now = Utc::now();
    let body = Envelope {
        protocol: PROTOCOL_NAME,
        status: status.line(),
        timestamp: now.timestamp_millis(),
        timestamp_readable: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        data,
        message,
    };
    let http = StatusCode::from_u16(status.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (http, Json(body)).into_response()
}

fn ok<T: Serialize>(data: T) -> Response {
    envelope(map(Outcome::Success), Some(data), None)
}

fn created<T: Serialize>(data: T, message: &str) -> Response {
    envelope(map(Outcome::Created), Some(data), Some(message.to_string()))
}

fn bad_request(message: String) -> Response {
    envelope::<()>(map(Outcome::Malformed), None, Some(message))
}

fn engine_error(e: EngineError) -> Response {
    let status = e.status();
    if status.class() == StatusClass::ServerError {
        warn!(code = status.code(), error = %e, "request failed");
    }
    envelope(
        status,
        Some(ErrorData {
            error: format!("{:?}", e.class()),
        }),
        Some(e.to_string()),
    )
}

fn packet_error(e: &PacketError) -> Response {
    warn!(kind = e.kind.as_str(), detail = %e.detail, "packet rejected");
    envelope(
        map(Outcome::from(e)),
        Some(ErrorData {
            error: e.kind.as_str().to_string(),
        }),
        Some(e.to_string()),
    )
}

fn json_rejection(rej: JsonRejection) -> Response {
    bad_request(rej.body_text())
}

// ---------------------------------------------------------------------------
// Shared operations (JSON routes and packet dispatch)
// ---------------------------------------------------------------------------

fn open_handshake(kitchen: &Kitchen, oven_id: Option<&str>, temperature: i64) -> Response {
    let oven_id = oven_id.map(OvenId::new);
    let session = match kitchen
        .open_session(oven_id.as_ref(), temperature)
        .and_then(|id| kitchen.get_session(&id))
    {
        Ok(session) => session,
        Err(e) => return engine_error(e),
    };

    info!(
        session_id = %session.id,
        oven_id = %session.oven_id,
        temperature,
        "handshake"
    );
    let syn_ack = SynAck {
        kind: "SYN-ACK",
        oven_id: session.oven_id.to_string(),
        ready_in_ms: session.ready_at.saturating_sub(kitchen.now_ms()),
    };
    created(HandshakeData { session, syn_ack }, "oven preheating")
}

fn place_order(kitchen: &Kitchen, req: OrderRequest) -> Response {
    let Ok(session_id) = SessionId::from_str(&req.session_id) else {
        return bad_request(format!("invalid session id {:?}", req.session_id));
    };
    let priority = match req.priority.as_deref() {
        None => Priority::default(),
        Some(raw) => match Priority::parse(raw) {
            Some(p) => p,
            None => return bad_request(format!("unknown priority {raw:?}")),
        },
    };

    let snap = match kitchen
        .submit(&session_id, &req.recipe_id, req.portions, priority)
        .and_then(|id| kitchen.get_status(&id))
    {
        Ok(snap) => snap,
        Err(e) => return engine_error(e),
    };

    created(
        OrderAccepted {
            order_id: snap.id,
            session_id: session_id.to_string(),
            recipe_id: snap.recipe_id,
            estimated_duration_ms: snap.estimated_duration_ms,
        },
        "order in the oven",
    )
}

fn poll_order(kitchen: &Kitchen, raw_id: &str) -> Response {
    let id = match OrderId::from_str(raw_id) {
        Ok(id) => id,
        Err(msg) => return bad_request(msg),
    };
    match kitchen.get_status(&id) {
        // Terminal orders poll with their own code (408, 500).
        Ok(snap) => envelope(snap.status, Some(snap), None),
        Err(e) => engine_error(e),
    }
}

fn pong(started: Instant) -> Response {
    ok(PingData {
        pong: true,
        latency_ms: started.elapsed().as_secs_f64() * 1000.0,
        texture: "smooth",
    })
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> Response {
    ok(HealthData {
        ok: true,
        service: st.build.service,
        version: st.build.version,
        config_hash: st.config_hash.clone(),
    })
}

// ---------------------------------------------------------------------------
// POST /v1/packet
// ---------------------------------------------------------------------------

/// Validate a raw `{header, body}` packet, then dispatch on its request type.
/// Nothing reaches the kitchen unless the packet validates.
pub(crate) async fn packet(
    State(st): State<Arc<AppState>>,
    body: Result<Json<PacketRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let Json(req) = match body {
        Ok(b) => b,
        Err(rej) => return json_rejection(rej),
    };

    let valid = match st.kitchen.validate_packet(&req.header, &req.body) {
        Ok(v) => v,
        Err(e) => return packet_error(&e),
    };
    let (header, body) = valid.into_parts();
    info!(
        request_type = %header.request_type,
        source_id = %header.source_id,
        ttl = header.ttl,
        "packet accepted"
    );

    match header.request_type {
        RequestType::Handshake => {
            let req = if body.trim().is_empty() {
                HandshakeRequest::default()
            } else {
                match serde_json::from_str::<HandshakeRequest>(&body) {
                    Ok(r) => r,
                    Err(e) => return bad_request(format!("handshake body: {e}")),
                }
            };
            let temperature = req.temperature.unwrap_or(header.temperature);
            open_handshake(&st.kitchen, req.oven_id.as_deref(), temperature)
        }
        RequestType::Order => match serde_json::from_str::<OrderRequest>(&body) {
            Ok(req) => place_order(&st.kitchen, req),
            Err(e) => bad_request(format!("order body: {e}")),
        },
        RequestType::Poll => poll_order(&st.kitchen, &body),
        RequestType::Ping => pong(started),
    }
}

// ---------------------------------------------------------------------------
// Sessions and orders
// ---------------------------------------------------------------------------

pub(crate) async fn handshake(
    State(st): State<Arc<AppState>>,
    body: Result<Json<HandshakeRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(b) => b,
        Err(rej) => return json_rejection(rej),
    };
    let temperature = req.temperature.unwrap_or(DEFAULT_TEMPERATURE);
    open_handshake(&st.kitchen, req.oven_id.as_deref(), temperature)
}

pub(crate) async fn create_order(
    State(st): State<Arc<AppState>>,
    body: Result<Json<OrderRequest>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(req)) => place_order(&st.kitchen, req),
        Err(rej) => json_rejection(rej),
    }
}

pub(crate) async fn order_status(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    poll_order(&st.kitchen, &id)
}

pub(crate) async fn session_status(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = SessionId::from_str(&id) else {
        return bad_request(format!("invalid session id {id:?}"));
    };
    match st.kitchen.get_session(&id) {
        Ok(session) => ok(session),
        Err(e) => engine_error(e),
    }
}

pub(crate) async fn close_session(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = SessionId::from_str(&id) else {
        return bad_request(format!("invalid session id {id:?}"));
    };
    match st.kitchen.close_session(&id) {
        Ok(session) => {
            info!(session_id = %session.id, oven_id = %session.oven_id, "session closed");
            ok(session)
        }
        Err(e) => engine_error(e),
    }
}

// ---------------------------------------------------------------------------
// Ovens
// ---------------------------------------------------------------------------

pub(crate) async fn ovens(State(st): State<Arc<AppState>>) -> Response {
    let ovens = st.kitchen.ovens();
    let available = ovens.iter().filter(|o| o.state == OvenState::Idle).count();
    ok(OvensData {
        total: ovens.len(),
        available,
        ovens,
    })
}

pub(crate) async fn fault_oven(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let id = OvenId::new(id);
    let failed_orders = match st.kitchen.fault_oven(&id) {
        Ok(failed) => failed,
        Err(e) => return engine_error(e),
    };
    warn!(oven_id = %id, failed = failed_orders.len(), "oven fault injected");
    match st.kitchen.oven(&id) {
        Ok(oven) => ok(OvenFaultData {
            oven,
            failed_orders,
        }),
        Err(e) => engine_error(e),
    }
}

pub(crate) async fn reset_oven(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let id = OvenId::new(id);
    let was_faulted = match st.kitchen.reset_oven(&id) {
        Ok(reset) => reset,
        Err(e) => return engine_error(e),
    };
    info!(oven_id = %id, was_faulted, "oven reset");
    match st.kitchen.oven(&id) {
        Ok(oven) => ok(OvenResetData { oven, was_faulted }),
        Err(e) => engine_error(e),
    }
}

// ---------------------------------------------------------------------------
// Catalog, history, diagnostics
// ---------------------------------------------------------------------------

pub(crate) async fn recipes(State(st): State<Arc<AppState>>) -> Response {
    let recipes = st.kitchen.recipes();
    ok(RecipesData {
        total: recipes.len(),
        recipes,
    })
}

pub(crate) async fn history(
    State(st): State<Arc<AppState>>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Response {
    let Query(q) = match query {
        Ok(q) => q,
        Err(rej) => return bad_request(rej.body_text()),
    };
    let limit = q.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    ok(HistoryData {
        events: st.kitchen.recent_events(limit),
        total: st.kitchen.bus().history_len(),
    })
}

pub(crate) async fn ping() -> Response {
    pong(Instant::now())
}

pub(crate) async fn teapot(State(st): State<Arc<AppState>>) -> Response {
    envelope::<()>(
        st.kitchen.teapot(),
        None,
        Some("I'm a teapot. No flan will be brewed here.".to_string()),
    )
}

pub(crate) async fn docs() -> Response {
    ok(DocsData {
        protocol: PROTOCOL_NAME,
        full_name: "Flan Layered Access Network",
        rfc: "RFC 3141 (Request For Caramel)",
        endpoints: endpoint_docs(),
        status_codes: FlanStatus::ALL.iter().map(FlanStatus::line).collect(),
    })
}

fn endpoint_docs() -> Vec<EndpointDoc> {
    const fn doc(
        method: &'static str,
        path: &'static str,
        description: &'static str,
        network_equivalent: &'static str,
    ) -> EndpointDoc {
        EndpointDoc {
            method,
            path,
            description,
            network_equivalent,
        }
    }

    vec![
        doc("POST", "/v1/packet", "Validate and dispatch a raw FLAN packet", "IP datagram"),
        doc("POST", "/v1/handshake", "Preheat an oven and open a session", "TCP Handshake - SYN"),
        doc("POST", "/v1/orders", "Submit an order on a ready session", "Data transfer - DATA"),
        doc("GET", "/v1/orders/:id", "Order status and progress", "Status polling"),
        doc("GET", "/v1/sessions/:id", "Session state", "Connection state"),
        doc("POST", "/v1/sessions/:id/close", "Close a session and free its oven", "TCP teardown - FIN"),
        doc("GET", "/v1/ovens", "Oven states and availability", "Health check"),
        doc("POST", "/v1/ovens/:id/fault", "Inject an oven fault", "Link failure"),
        doc("POST", "/v1/ovens/:id/reset", "Reset a faulted oven", "Interface reset"),
        doc("GET", "/v1/recipes", "Recipe catalog", "Service discovery"),
        doc("GET", "/v1/history", "Recent lifecycle events", "Packet capture"),
        doc("GET", "/v1/stream", "Live lifecycle events", "SSE / WebSocket"),
        doc("GET", "/v1/ping", "Liveness probe", "ICMP Ping"),
        doc("GET", "/v1/teapot", "Always 418", "RFC 2324"),
        doc("GET", "/v1/docs", "This document", "RFC"),
    ]
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let events = kitchen_to_sse(st.kitchen.subscribe());

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn kitchen_to_sse(
    events: impl Stream<Item = flan_engine::Event> + Send + 'static,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    events.filter_map(|ev| async move {
        let event_name = match ev.kind {
            EventKind::Created => "created",
            EventKind::Progress => "progress",
            EventKind::Completed => "completed",
            EventKind::Failed => "failed",
            EventKind::TimedOut => "timed_out",
        };
        let data = serde_json::to_string(&ev).ok()?;
        Some(Ok(Event::default()
            .event(event_name)
            .id(ev.sequence_number.to_string())
            .data(data)))
    })
}
