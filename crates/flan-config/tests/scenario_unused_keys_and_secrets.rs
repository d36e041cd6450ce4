//! Unused keys, secret literals and typed resolution.
//!
//! GREEN when:
//! - A misspelled key is reported under Warn and rejected under Fail.
//! - Secret-looking literals abort loading without echoing the value.
//! - The shipped base layer resolves cleanly to the default kitchen.
//! - Layer files on disk resolve the same as in-memory strings.

use std::io::Write;

use flan_config::{
    load_layered_yaml_from_strings, report_unused_keys, resolve_from_strings, resolve_paths,
    FlanConfig, UnusedKeyPolicy,
};

const BASE: &str = include_str!("../../../config/base.yaml");

#[test]
fn warn_mode_reports_typos_without_error() {
    let yaml = r#"
kitchen:
  oven_cout: 4
  oven_count: 2
extras:
  jukebox: true
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();

    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/extras/jukebox".to_string(), "/kitchen/oven_cout".to_string()]
    );
}

#[test]
fn fail_mode_rejects_typos() {
    let err = resolve_from_strings(&["cooking:\n  cooldwn_ms: 10\n"], UnusedKeyPolicy::Fail)
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_UNUSED_KEYS"));
    assert!(msg.contains("/cooking/cooldwn_ms"));
}

#[test]
fn secret_literal_is_refused_and_redacted() {
    let yaml = "kitchen:\n  note: \"sk_live_abcdefghijklmnop\"\n";
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_SECRET_DETECTED"));
    assert!(msg.contains("/kitchen/note"));
    assert!(!msg.contains("abcdefghijklmnop"));
}

#[test]
fn shipped_base_layer_is_clean_and_default() {
    let resolved = resolve_from_strings(&[BASE], UnusedKeyPolicy::Fail).unwrap();
    assert!(resolved.unused.is_clean());
    assert_eq!(resolved.config, FlanConfig::default());
}

#[test]
fn overlay_reaches_the_engine_config() {
    let overlay = "kitchen:\n  oven_count: 5\ncooking:\n  priority_high_percent: 50\n";
    let resolved = resolve_from_strings(&[BASE, overlay], UnusedKeyPolicy::Fail).unwrap();
    let engine = resolved.config.engine_config();
    assert_eq!(engine.kitchen.oven_count, 5);
    assert_eq!(engine.cooking.priority_high_percent, 50);
    assert_eq!(engine.cooking.priority_low_percent, 150);
}

#[test]
fn inconsistent_values_fail_validation() {
    let overlay = "cooking:\n  timeout_factor_percent: 90\n";
    let err = resolve_from_strings(&[BASE, overlay], UnusedKeyPolicy::Warn).unwrap_err();
    assert!(format!("{err:#}").contains("timeout_factor_percent"));
}

#[test]
fn files_on_disk_resolve_like_strings() {
    let dir = tempfile::tempdir().unwrap();
    let base_path = dir.path().join("base.yaml");
    let local_path = dir.path().join("local.yaml");
    std::fs::write(&base_path, BASE).unwrap();
    let mut f = std::fs::File::create(&local_path).unwrap();
    writeln!(f, "scheduler:\n  tick_ms: 25").unwrap();

    let paths = [base_path.to_str().unwrap(), local_path.to_str().unwrap()];
    let from_disk = resolve_paths(&paths, UnusedKeyPolicy::Fail).unwrap();
    let from_mem =
        resolve_from_strings(&[BASE, "scheduler:\n  tick_ms: 25\n"], UnusedKeyPolicy::Fail).unwrap();

    assert_eq!(from_disk.config.scheduler.tick_ms, 25);
    assert_eq!(from_disk.loaded.config_hash, from_mem.loaded.config_hash);
}

#[test]
fn missing_file_names_the_path() {
    let err = resolve_paths(&["/definitely/not/here.yaml"], UnusedKeyPolicy::Warn).unwrap_err();
    assert!(err.to_string().contains("/definitely/not/here.yaml"));
}
