//! Config hash stability.
//!
//! GREEN when:
//! - Loading the same layers twice yields the same config_hash.
//! - Key order inside a YAML doc does not change the hash.
//! - Different values produce different hashes.
//! - Overlays take effect and the merged result hashes stably.

use flan_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
kitchen:
  oven_count: 3
  ambient_temperature: 20
cooking:
  timeout_factor_percent: 200
  cooldown_ms: 5000
events:
  history_limit: 100
"#;

const BASE_YAML_REORDERED: &str = r#"
events:
  history_limit: 100
cooking:
  cooldown_ms: 5000
  timeout_factor_percent: 200
kitchen:
  ambient_temperature: 20
  oven_count: 3
"#;

const OVERLAY_YAML: &str = r#"
kitchen:
  oven_count: 6
cooking:
  cooldown_ms: 1000
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        original.config_hash, reordered.config_hash,
        "reordering keys in YAML must not change the hash"
    );
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, "kitchen:\n  oven_count: 4\n"]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn merged_layers_produce_stable_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);

    let ovens = a
        .config_json
        .pointer("/kitchen/oven_count")
        .and_then(|v| v.as_u64())
        .unwrap();
    assert_eq!(ovens, 6, "overlay should override base kitchen.oven_count");

    let ambient = a
        .config_json
        .pointer("/kitchen/ambient_temperature")
        .and_then(|v| v.as_i64())
        .unwrap();
    assert_eq!(ambient, 20, "keys absent from the overlay survive");
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn invalid_yaml_is_an_error() {
    let err = load_layered_yaml_from_strings(&["kitchen: [unclosed"]).unwrap_err();
    assert!(err.to_string().contains("invalid yaml"));
}
