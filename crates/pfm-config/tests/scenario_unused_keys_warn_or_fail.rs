//! Unused-key guard.
//!
//! 1) Unused keys are reported in WARN mode without erroring.
//! 2) Unused keys fail in FAIL mode.
//! 3) Keys read by the mode are never flagged.
//! 4) Daemon-only keys are unused in CLI mode. The CLI always uses the
//!    persisted reset marker, so `/reset/marker` is daemon-only.
//! 5) Unused pointers come back sorted.

use pfm_config::{load_layered_yaml_from_strings, report_unused_keys, ConfigMode, UnusedKeyPolicy};

const FULL_YAML: &str = r#"
calendar:
  timezone: "UTC"
reconcile:
  epsilon: "0.01"
  adjustment_category: "Limit adjustment"
reset:
  tick_interval_secs: 3600
  per_user_timeout_secs: 30
  marker: "postgres"
normalizer:
  food_voucher_marker: "voucher"
  run_on_boot: true
daemon:
  bind_addr: "127.0.0.1:8899"
secrets_env:
  reset_trigger: "PFM_RESET_SECRET"
  database_url: "PFM_DATABASE_URL"
"#;

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let yaml = r#"
reconcile:
  epsilon: "0.01"
unused_section:
  foo: 123
  bar: 456
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("config load must succeed");

    let report = report_unused_keys(ConfigMode::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn)
        .expect("warn mode must not error");

    assert!(!report.is_clean());
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/unused_section/bar".to_string(), "/unused_section/foo".to_string()]
    );
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let yaml = r#"
reconcile:
  epsilon: "0.01"
  epsilno: "0.02"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("config load must succeed");

    let err = report_unused_keys(ConfigMode::Daemon, &loaded.config_json, UnusedKeyPolicy::Fail)
        .expect_err("fail policy must error when unused keys exist");
    let msg = format!("{err:?}");
    assert!(msg.contains("CONFIG_UNUSED_KEYS"));
    assert!(msg.contains("/reconcile/epsilno"));
}

#[test]
fn full_config_is_clean_for_daemon() {
    let loaded = load_layered_yaml_from_strings(&[FULL_YAML]).unwrap();
    let report =
        report_unused_keys(ConfigMode::Daemon, &loaded.config_json, UnusedKeyPolicy::Fail)
            .expect("every documented key is read by the daemon");
    assert!(report.is_clean());
}

#[test]
fn daemon_only_keys_are_unused_in_cli_mode() {
    let loaded = load_layered_yaml_from_strings(&[FULL_YAML]).unwrap();
    let report = report_unused_keys(ConfigMode::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)
        .unwrap();

    assert_eq!(
        report.unused_leaf_pointers,
        vec![
            "/daemon/bind_addr".to_string(),
            "/normalizer/run_on_boot".to_string(),
            "/reset/marker".to_string(),
            "/reset/tick_interval_secs".to_string(),
            "/secrets_env/reset_trigger".to_string(),
        ]
    );
}

#[test]
fn deterministic_unused_pointer_ordering() {
    let yaml = r#"
unused:
  b: 2
  a: 1
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report =
        report_unused_keys(ConfigMode::Cli, &loaded.config_json, UnusedKeyPolicy::Warn).unwrap();

    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/unused/a".to_string(), "/unused/b".to_string()]
    );
}
