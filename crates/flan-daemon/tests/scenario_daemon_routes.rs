//! In-process scenario tests for flan-daemon HTTP endpoints.
//!
//! These tests build the Axum router around a manual-clock kitchen and drive
//! it via `tower::ServiceExt::oneshot`. No socket, no sleeps.
//!
//! # Invariants under test
//! - Every response is a FLAN envelope and the HTTP status equals its code.
//! - Packets are validated before dispatch; rejections map to 400 / 408.
//! - Contention is 302, unknown ids are 404, a faulted oven is 503.
//! - The teapot is always 418.

use std::{sync::Arc, time::Duration};

use axum::http::{Request, StatusCode};
use flan_daemon::{routes, state};
use flan_engine::Priority;
use flan_protocol::{RequestType, SealOptions};
use flan_testkit::{sealed_packet, sealed_packet_with, KitchenFixture};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_router(fx: &KitchenFixture) -> axum::Router {
    let st = Arc::new(state::AppState::new(
        Arc::clone(&fx.kitchen),
        Some("cafebabe".to_string()),
    ));
    routes::build_router(st)
}

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

/// Drive the router with a single request and return (status, envelope).
async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, Value) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    let json = serde_json::from_slice(&body).expect("body is not valid JSON");
    (status, json)
}

/// The envelope's code must always match the HTTP status.
fn assert_envelope(status: StatusCode, env: &Value, code: u16) {
    assert_eq!(status.as_u16(), code);
    assert_eq!(env["protocol"], "FLAN/1.0");
    assert_eq!(env["status"]["code"], code);
    assert!(env["timestamp"].as_i64().unwrap() > 0);
    assert!(env["timestamp_readable"].as_str().unwrap().ends_with('Z'));
}

// ---------------------------------------------------------------------------
// Health, docs, diagnostics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_perfect_flan_with_config_hash() {
    let fx = KitchenFixture::new();
    let (status, env) = call(make_router(&fx), get("/v1/health")).await;

    assert_envelope(status, &env, 200);
    assert_eq!(env["status"]["name"], "Perfect Flan");
    assert_eq!(env["data"]["ok"], true);
    assert_eq!(env["data"]["service"], "flan-daemon");
    assert_eq!(env["data"]["config_hash"], "cafebabe");
}

#[tokio::test]
async fn teapot_is_always_418() {
    let fx = KitchenFixture::new();
    let (status, env) = call(make_router(&fx), get("/v1/teapot")).await;

    assert_envelope(status, &env, 418);
    assert_eq!(env["status"]["name"], "I'm a Teapot");
    assert!(env.get("data").is_none());
    assert!(env["message"].as_str().unwrap().contains("teapot"));
}

#[tokio::test]
async fn docs_list_every_status_code() {
    let fx = KitchenFixture::new();
    let (status, env) = call(make_router(&fx), get("/v1/docs")).await;

    assert_envelope(status, &env, 200);
    assert_eq!(env["data"]["full_name"], "Flan Layered Access Network");
    assert_eq!(env["data"]["rfc"], "RFC 3141 (Request For Caramel)");

    let codes: Vec<u64> = env["data"]["status_codes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["code"].as_u64().unwrap())
        .collect();
    assert_eq!(codes.len(), 15);
    assert!(codes.contains(&418));
    assert!(codes.windows(2).all(|w| w[0] < w[1]));

    let paths: Vec<&str> = env["data"]["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["path"].as_str().unwrap())
        .collect();
    assert!(paths.contains(&"/v1/packet"));
    assert!(paths.contains(&"/v1/stream"));
}

#[tokio::test]
async fn ping_and_recipes() {
    let fx = KitchenFixture::new();

    let (status, env) = call(make_router(&fx), get("/v1/ping")).await;
    assert_envelope(status, &env, 200);
    assert_eq!(env["data"]["pong"], true);
    assert_eq!(env["data"]["texture"], "smooth");

    let (status, env) = call(make_router(&fx), get("/v1/recipes")).await;
    assert_envelope(status, &env, 200);
    assert_eq!(env["data"]["total"], 4);
    assert_eq!(env["data"]["recipes"][0]["id"], "flan_caramel");
}

// ---------------------------------------------------------------------------
// Handshake and orders
// ---------------------------------------------------------------------------

#[tokio::test]
async fn handshake_is_201_then_302_on_the_same_oven() {
    let fx = KitchenFixture::new();

    let (status, env) = call(
        make_router(&fx),
        post_json("/v1/handshake", json!({ "oven_id": "oven-2", "temperature": 180 })),
    )
    .await;
    assert_envelope(status, &env, 201);
    assert_eq!(env["status"]["name"], "Flan Created");
    assert_eq!(env["data"]["session"]["state"], "pending");
    assert_eq!(env["data"]["syn_ack"]["type"], "SYN-ACK");
    assert_eq!(env["data"]["syn_ack"]["oven_id"], "oven-2");
    // 160 degrees above ambient at 2ms per degree
    assert_eq!(env["data"]["syn_ack"]["ready_in_ms"], 320);

    let (status, env) = call(
        make_router(&fx),
        post_json("/v1/handshake", json!({ "oven_id": "oven-2" })),
    )
    .await;
    assert_envelope(status, &env, 302);
    assert_eq!(env["status"]["name"], "Oven Busy");
}

#[tokio::test]
async fn handshake_defaults_take_first_idle_oven() {
    let fx = KitchenFixture::new();
    let (status, env) = call(make_router(&fx), post_json("/v1/handshake", json!({}))).await;

    assert_envelope(status, &env, 201);
    assert_eq!(env["data"]["session"]["oven_id"], "oven-1");
    assert_eq!(env["data"]["session"]["requested_temperature"], 180);
}

#[tokio::test]
async fn handshake_rejects_bad_json_and_out_of_range_temperature() {
    let fx = KitchenFixture::new();

    let req = Request::builder()
        .method("POST")
        .uri("/v1/handshake")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, env) = call(make_router(&fx), req).await;
    assert_envelope(status, &env, 400);
    assert_eq!(env["status"]["name"], "Bad Recipe");

    let (status, env) = call(
        make_router(&fx),
        post_json("/v1/handshake", json!({ "temperature": 900 })),
    )
    .await;
    assert_envelope(status, &env, 400);
}

#[tokio::test]
async fn order_is_201_and_polls_through_to_done() {
    let fx = KitchenFixture::new();
    let session = fx.ready_session(1, 180);

    let (status, env) = call(
        make_router(&fx),
        post_json(
            "/v1/orders",
            json!({
                "session_id": session.to_string(),
                "recipe_id": "flan_orange",
                "portions": 4,
            }),
        ),
    )
    .await;
    assert_envelope(status, &env, 201);
    assert_eq!(env["data"]["order_id"], "CMD-0001");
    assert_eq!(env["data"]["estimated_duration_ms"], 5_850);

    let (status, env) = call(make_router(&fx), get("/v1/orders/CMD-0001")).await;
    assert_envelope(status, &env, 200);
    assert_eq!(env["data"]["state"], "cooking");

    fx.advance(5_850);
    let (status, env) = call(make_router(&fx), get("/v1/orders/CMD-0001")).await;
    assert_envelope(status, &env, 200);
    assert_eq!(env["data"]["state"], "done");
    assert_eq!(env["data"]["progress_percent"], 100);
    assert_eq!(env["data"]["result_code"], 200);
}

#[tokio::test]
async fn timed_out_order_polls_as_408() {
    let fx = KitchenFixture::new();
    let session = fx.ready_session(1, 50);
    let order = fx
        .kitchen
        .submit(&session, "flan_chocolat", 1, Priority::Normal)
        .unwrap();
    fx.advance(10_000);

    let (status, env) = call(make_router(&fx), get(&format!("/v1/orders/{order}"))).await;
    assert_envelope(status, &env, 408);
    assert_eq!(env["status"]["name"], "Cooking Timeout");
    assert_eq!(env["data"]["state"], "timed_out");
}

#[tokio::test]
async fn order_errors_map_to_flan_codes() {
    let fx = KitchenFixture::new();
    let session = fx.ready_session(1, 180);

    // unknown recipe
    let (status, env) = call(
        make_router(&fx),
        post_json(
            "/v1/orders",
            json!({ "session_id": session.to_string(), "recipe_id": "flan_pistache" }),
        ),
    )
    .await;
    assert_envelope(status, &env, 404);
    assert_eq!(env["status"]["name"], "Flan Not Found");

    // zero portions
    let (status, env) = call(
        make_router(&fx),
        post_json(
            "/v1/orders",
            json!({ "session_id": session.to_string(), "recipe_id": "flan_vanille", "portions": 0 }),
        ),
    )
    .await;
    assert_envelope(status, &env, 400);

    // unknown priority
    let (status, env) = call(
        make_router(&fx),
        post_json(
            "/v1/orders",
            json!({
                "session_id": session.to_string(),
                "recipe_id": "flan_vanille",
                "priority": "URGENT",
            }),
        ),
    )
    .await;
    assert_envelope(status, &env, 400);

    // malformed and unknown order ids
    let (status, env) = call(make_router(&fx), get("/v1/orders/not-an-order")).await;
    assert_envelope(status, &env, 400);
    let (status, env) = call(make_router(&fx), get("/v1/orders/CMD-0099")).await;
    assert_envelope(status, &env, 404);
}

#[tokio::test]
async fn pending_session_cannot_order() {
    let fx = KitchenFixture::new();
    let session = fx.kitchen.open_session(None, 180).unwrap();

    let (status, env) = call(
        make_router(&fx),
        post_json(
            "/v1/orders",
            json!({ "session_id": session.to_string(), "recipe_id": "flan_vanille" }),
        ),
    )
    .await;
    assert_envelope(status, &env, 401);
    assert_eq!(env["status"]["name"], "Kitchen Locked");
}

#[tokio::test]
async fn session_status_and_close_free_the_oven() {
    let fx = KitchenFixture::new();
    let session = fx.ready_session(3, 180);

    let (status, env) = call(make_router(&fx), get(&format!("/v1/sessions/{session}"))).await;
    assert_envelope(status, &env, 200);
    assert_eq!(env["data"]["state"], "ready");
    assert_eq!(env["data"]["oven_id"], "oven-3");

    let (status, env) = call(
        make_router(&fx),
        post_empty(&format!("/v1/sessions/{session}/close")),
    )
    .await;
    assert_envelope(status, &env, 200);
    assert_eq!(env["data"]["state"], "closed");

    let (_, env) = call(make_router(&fx), get("/v1/ovens")).await;
    assert_eq!(env["data"]["available"], 3);

    let (status, env) = call(
        make_router(&fx),
        get("/v1/sessions/00000000-0000-0000-0000-000000000000"),
    )
    .await;
    assert_envelope(status, &env, 404);
}

// ---------------------------------------------------------------------------
// Ovens
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ovens_report_availability() {
    let fx = KitchenFixture::new();
    fx.ready_session(1, 180);

    let (status, env) = call(make_router(&fx), get("/v1/ovens")).await;
    assert_envelope(status, &env, 200);
    assert_eq!(env["data"]["total"], 3);
    assert_eq!(env["data"]["available"], 2);
    assert_eq!(env["data"]["ovens"][0]["id"], "oven-1");
    assert_eq!(env["data"]["ovens"][0]["state"], "heating");
}

#[tokio::test]
async fn faulted_oven_is_503_until_reset() {
    let fx = KitchenFixture::new();
    let session = fx.ready_session(3, 180);
    fx.kitchen
        .submit(&session, "flan_vanille", 1, Priority::Normal)
        .unwrap();

    let (status, env) = call(make_router(&fx), post_empty("/v1/ovens/oven-3/fault")).await;
    assert_envelope(status, &env, 200);
    assert_eq!(env["data"]["oven"]["state"], "faulted");
    assert_eq!(env["data"]["failed_orders"], json!(["CMD-0001"]));

    let (status, env) = call(
        make_router(&fx),
        post_json("/v1/handshake", json!({ "oven_id": "oven-3" })),
    )
    .await;
    assert_envelope(status, &env, 503);
    assert_eq!(env["status"]["name"], "Kitchen Closed");

    let (status, env) = call(make_router(&fx), post_empty("/v1/ovens/oven-3/reset")).await;
    assert_envelope(status, &env, 200);
    assert_eq!(env["data"]["was_faulted"], true);
    assert_eq!(env["data"]["oven"]["state"], "idle");

    let (status, env) = call(make_router(&fx), post_empty("/v1/ovens/oven-9/fault")).await;
    assert_envelope(status, &env, 404);
}

// ---------------------------------------------------------------------------
// POST /v1/packet
// ---------------------------------------------------------------------------

#[tokio::test]
async fn handshake_packet_uses_header_temperature() {
    let fx = KitchenFixture::new();
    let pkt = sealed_packet_with(
        RequestType::Handshake,
        r#"{"oven_id":"oven-2"}"#,
        SealOptions {
            temperature: 160,
            ..SealOptions::default()
        },
    );

    let (status, env) = call(make_router(&fx), post_json("/v1/packet", pkt)).await;
    assert_envelope(status, &env, 201);
    assert_eq!(env["data"]["session"]["oven_id"], "oven-2");
    assert_eq!(env["data"]["session"]["requested_temperature"], 160);
}

#[tokio::test]
async fn order_and_poll_packets_dispatch() {
    let fx = KitchenFixture::new();
    let session = fx.ready_session(1, 180);

    let body = json!({ "session_id": session.to_string(), "recipe_id": "flan_vanille" }).to_string();
    let (status, env) = call(
        make_router(&fx),
        post_json("/v1/packet", sealed_packet(RequestType::Order, &body)),
    )
    .await;
    assert_envelope(status, &env, 201);
    assert_eq!(env["data"]["order_id"], "CMD-0001");

    let (status, env) = call(
        make_router(&fx),
        post_json("/v1/packet", sealed_packet(RequestType::Poll, "CMD-0001")),
    )
    .await;
    assert_envelope(status, &env, 200);
    assert_eq!(env["data"]["recipe_id"], "flan_vanille");
}

#[tokio::test]
async fn tampered_packet_is_400_and_changes_nothing() {
    let fx = KitchenFixture::new();
    let mut pkt = sealed_packet(RequestType::Handshake, r#"{"oven_id":"oven-1"}"#);
    pkt["body"] = json!(r#"{"oven_id":"oven-2"}"#);

    let (status, env) = call(make_router(&fx), post_json("/v1/packet", pkt)).await;
    assert_envelope(status, &env, 400);
    assert_eq!(env["data"]["error"], "CHECKSUM_MISMATCH");

    let (_, env) = call(make_router(&fx), get("/v1/ovens")).await;
    assert_eq!(env["data"]["available"], 3);
}

#[tokio::test]
async fn expired_packet_is_408() {
    let fx = KitchenFixture::new();
    let pkt = sealed_packet_with(
        RequestType::Ping,
        "",
        SealOptions {
            ttl: 0,
            ..SealOptions::default()
        },
    );

    let (status, env) = call(make_router(&fx), post_json("/v1/packet", pkt)).await;
    assert_envelope(status, &env, 408);
    assert_eq!(env["data"]["error"], "EXPIRED_TTL");
}

#[tokio::test]
async fn ping_packet_pongs() {
    let fx = KitchenFixture::new();
    let (status, env) = call(
        make_router(&fx),
        post_json("/v1/packet", sealed_packet(RequestType::Ping, "")),
    )
    .await;
    assert_envelope(status, &env, 200);
    assert_eq!(env["data"]["pong"], true);
}

// ---------------------------------------------------------------------------
// History and stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_honours_limit() {
    let fx = KitchenFixture::new();
    let session = fx.ready_session(1, 180);
    fx.kitchen
        .submit(&session, "flan_vanille", 1, Priority::Normal)
        .unwrap();
    fx.advance(4_000);

    // created + 4 checkpoints + completed
    let (status, env) = call(make_router(&fx), get("/v1/history")).await;
    assert_envelope(status, &env, 200);
    assert_eq!(env["data"]["total"], 6);
    assert_eq!(env["data"]["events"].as_array().unwrap().len(), 6);

    let (_, env) = call(make_router(&fx), get("/v1/history?limit=2")).await;
    let events = env["data"]["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1]["kind"], "completed");
    assert_eq!(env["data"]["total"], 6);

    let (status, env) = call(make_router(&fx), get("/v1/history?limit=lots")).await;
    assert_envelope(status, &env, 400);
}

#[tokio::test]
async fn stream_delivers_named_lifecycle_events() {
    let fx = KitchenFixture::new();
    let session = fx.ready_session(1, 180);

    let resp = make_router(&fx)
        .oneshot(get("/v1/stream"))
        .await
        .expect("oneshot failed");
    assert_eq!(resp.status(), StatusCode::OK);

    fx.kitchen
        .submit(&session, "flan_caramel", 1, Priority::High)
        .unwrap();

    let mut body = resp.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("no SSE frame")
        .expect("stream ended")
        .expect("frame error");
    let text = String::from_utf8(frame.into_data().expect("data frame").to_vec()).unwrap();

    assert!(text.contains("event: created"), "{text}");
    assert!(text.contains("CMD-0001"), "{text}");
    assert!(text.contains("id: 1"), "{text}");
}
