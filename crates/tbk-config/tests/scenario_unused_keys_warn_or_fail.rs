//! Scenario: Unused config keys
//!
//! # Invariants under test
//!
//! 1. Unused keys are reported under `Warn` without an error.
//! 2. Unused keys fail the load under `Fail`.
//! 3. Every key `TbkConfig` reads is registered as consumed.
//! 4. Unused pointers come back sorted.

use tbk_config::{load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let yaml = r#"
replay:
  expired_trade_policy: sweep
  settle_date: "2024-01-31"

export:
  out_dir: "out"
"#;

    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();

    // GIVEN a typo'd key next to real ones
    // THEN only the typo is reported
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/replay/settle_date".to_string()]
    );
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let yaml = r#"
exports:
  out_dir: "out"
"#;

    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();

    assert!(err.to_string().contains("CONFIG_UNUSED_KEYS"));
    assert!(err.to_string().contains("/exports/out_dir"));
}

#[test]
fn full_schema_is_clean() {
    let yaml = r#"
replay:
  expired_trade_policy: skip_expired
  settle_at: "2024-01-31 23:59:59"
tradebook:
  default_expiry_time: "15:30:00"
export:
  out_dir: "exports"
  price_decimals: 2
"#;

    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
}

#[test]
fn deterministic_unused_pointer_ordering() {
    let yaml = r#"
zeta: 1
alpha:
  b: 2
  a: 1
"#;

    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();

    assert_eq!(
        report.unused_leaf_pointers,
        vec![
            "/alpha/a".to_string(),
            "/alpha/b".to_string(),
            "/zeta".to_string()
        ]
    );
}
