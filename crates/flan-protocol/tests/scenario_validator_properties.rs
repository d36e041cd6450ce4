//! Scenario: packet validator and status mapping properties.
//!
//! # Invariants under test
//! - Validation is idempotent: the same input always yields the same result.
//! - ttl ≤ 0 yields ExpiredTTL whatever else is wrong with the header.
//! - Every packet error maps to exactly one status code (408 or 400).
//! - A sealed packet validates; flipping one body byte breaks the checksum.
//! - The outcome → status mapping is total and stable.

use flan_protocol::{
    map, validate, Outcome, PacketErrorKind, PacketHeader, PacketLimits, RequestType,
    SealOptions, StatusCode,
};
use serde_json::{json, Value};

fn sealed(request_type: RequestType, body: &str) -> Value {
    PacketHeader::seal(request_type, body, SealOptions::default()).to_raw()
}

#[test]
fn validation_is_idempotent() {
    let limits = PacketLimits::default();
    let body = r#"{"recipe_id":"flan_orange","portions":4}"#;
    let good = sealed(RequestType::Order, body);

    let first = validate(&good, body, &limits);
    let second = validate(&good, body, &limits);
    assert!(first.is_ok());
    assert_eq!(first, second);

    let mut bad = good.clone();
    bad["temperature"] = json!(999);
    assert_eq!(validate(&bad, body, &limits), validate(&bad, body, &limits));
}

#[test]
fn non_positive_ttl_always_wins() {
    let limits = PacketLimits::default();
    let body = "hello";

    let headers = [
        json!({ "ttl": 0 }),
        json!({ "ttl": -3, "version": "nope" }),
        json!({ "ttl": 0, "version": 1, "request_type": "PING", "size_ml": 99999,
                "temperature": 5000, "source_id": "a", "dest_id": "b", "checksum": "WRONG" }),
        json!({ "ttl": -1.0 }),
        json!({ "ttl": 0.0, "version": 1 }),
        json!({ "ttl": -1e30 }),
        json!({ "ttl": "0" }),
        json!({ "ttl": " -2 ", "request_type": 7 }),
    ];
    for h in headers {
        let err = validate(&h, body, &limits).unwrap_err();
        assert_eq!(err.kind, PacketErrorKind::ExpiredTtl, "header {h}");
        assert_eq!(map(Outcome::from(&err)).code(), 408);
    }
}

#[test]
fn positive_non_integer_ttl_is_malformed() {
    let limits = PacketLimits::default();
    let good = sealed(RequestType::Ping, "");
    for ttl in [json!(1.5), json!("30"), json!(1e30)] {
        let mut h = good.clone();
        h["ttl"] = ttl.clone();
        let err = validate(&h, "", &limits).unwrap_err();
        assert_eq!(err.kind, PacketErrorKind::MalformedHeader, "ttl {ttl}");
    }
}

#[test]
fn each_defect_is_reported_with_its_own_kind() {
    let limits = PacketLimits::default();
    let body = "ping";
    let good = sealed(RequestType::Ping, body);

    let cases: Vec<(&str, Value, PacketErrorKind)> = vec![
        ("version", json!(2), PacketErrorKind::MalformedHeader),
        ("request_type", json!("DELETE"), PacketErrorKind::MalformedHeader),
        ("size_ml", json!(10_000), PacketErrorKind::SizeOutOfRange),
        ("temperature", json!(-1), PacketErrorKind::TemperatureOutOfRange),
        ("temperature", json!(301), PacketErrorKind::TemperatureOutOfRange),
        ("checksum", json!("00000000"), PacketErrorKind::ChecksumMismatch),
        ("source_id", json!(42), PacketErrorKind::MalformedHeader),
    ];

    for (field, value, kind) in cases {
        let mut h = good.clone();
        h[field] = value;
        let err = validate(&h, body, &limits).unwrap_err();
        assert_eq!(err.kind, kind, "field {field}");
        assert_eq!(map(Outcome::from(&err)), StatusCode::BadRecipe);
    }

    let mut missing = good.clone();
    missing.as_object_mut().unwrap().remove("dest_id");
    assert_eq!(
        validate(&missing, body, &limits).unwrap_err().kind,
        PacketErrorKind::MalformedHeader
    );
}

#[test]
fn tampered_body_fails_texture_verification() {
    let limits = PacketLimits::default();
    let h = sealed(RequestType::Order, "portions=4");
    validate(&h, "portions=4", &limits).unwrap();

    let err = validate(&h, "portions=5", &limits).unwrap_err();
    assert_eq!(err.kind, PacketErrorKind::ChecksumMismatch);
    assert!(err.to_string().contains("texture verification failed"));
}

#[test]
fn hop_counts_down_to_expiry() {
    let limits = PacketLimits::default();
    let opts = SealOptions {
        ttl: 2,
        ..SealOptions::default()
    };
    let raw = PacketHeader::seal(RequestType::Poll, "CMD-0001", opts).to_raw();
    let packet = validate(&raw, "CMD-0001", &limits).unwrap();

    let packet = packet.hop().unwrap();
    assert_eq!(packet.header().ttl, 1);
    let err = packet.hop().unwrap_err();
    assert_eq!(err.kind, PacketErrorKind::ExpiredTtl);
}

#[test]
fn configured_limits_are_honoured() {
    let limits = PacketLimits {
        max_size_ml: 4,
        max_temperature: 200,
        ..PacketLimits::default()
    };
    let body = "12345";
    let err = validate(&sealed(RequestType::Ping, body), body, &limits).unwrap_err();
    assert_eq!(err.kind, PacketErrorKind::SizeOutOfRange);

    let opts = SealOptions {
        temperature: 250,
        ..SealOptions::default()
    };
    let raw = PacketHeader::seal(RequestType::Ping, "ok", opts).to_raw();
    let err = validate(&raw, "ok", &limits).unwrap_err();
    assert_eq!(err.kind, PacketErrorKind::TemperatureOutOfRange);
}

#[test]
fn outcome_mapping_is_stable() {
    let outcomes = [
        (Outcome::Success, 200, "Perfect Flan"),
        (Outcome::Created, 201, "Flan Created"),
        (Outcome::TemporarilyBusy, 302, "Oven Busy"),
        (Outcome::NotFound, 404, "Flan Not Found"),
        (Outcome::ProcessingTimeout, 408, "Cooking Timeout"),
        (Outcome::Teapot, 418, "I'm a Teapot"),
        (Outcome::Internal, 500, "Oven Broken"),
        (Outcome::Unavailable, 503, "Kitchen Closed"),
    ];
    for (outcome, code, name) in outcomes {
        for _ in 0..3 {
            let status = map(outcome);
            assert_eq!(status.code(), code);
            assert_eq!(status.name(), name);
        }
    }
    assert_eq!(StatusCode::teapot().code(), 418);
}
