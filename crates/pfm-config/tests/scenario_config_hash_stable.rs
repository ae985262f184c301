//! Config hash stability.
//!
//! - Same inputs give the same hash and canonical JSON.
//! - Key order in the YAML does not affect the hash.
//! - Different values give different hashes.
//! - Overlays merge deterministically and override the base.

use pfm_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
calendar:
  timezone: "America/Sao_Paulo"
reconcile:
  epsilon: "0.01"
  adjustment_category: "Limit adjustment"
reset:
  tick_interval_secs: 3600
  marker: "postgres"
secrets_env:
  database_url: "PFM_DATABASE_URL"
  reset_trigger: "PFM_RESET_SECRET"
"#;

const BASE_YAML_REORDERED: &str = r#"
secrets_env:
  reset_trigger: "PFM_RESET_SECRET"
  database_url: "PFM_DATABASE_URL"
reset:
  marker: "postgres"
  tick_interval_secs: 3600
reconcile:
  adjustment_category: "Limit adjustment"
  epsilon: "0.01"
calendar:
  timezone: "America/Sao_Paulo"
"#;

const OVERLAY_YAML: &str = r#"
reset:
  tick_interval_secs: 60
daemon:
  bind_addr: "127.0.0.1:9900"
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
    assert_eq!(original.canonical_json, reordered.canonical_json);
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, "reconcile:\n  epsilon: \"0.05\"\n"])
        .unwrap();

    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_overrides_base_and_keeps_siblings() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);

    let cfg = &a.config_json;
    assert_eq!(
        cfg.pointer("/reset/tick_interval_secs").and_then(|v| v.as_u64()),
        Some(60)
    );
    assert_eq!(
        cfg.pointer("/reset/marker").and_then(|v| v.as_str()),
        Some("postgres"),
        "sibling keys in the base must survive the merge"
    );
    assert_eq!(
        cfg.pointer("/daemon/bind_addr").and_then(|v| v.as_str()),
        Some("127.0.0.1:9900")
    );
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn empty_layers_hash_like_no_layers() {
    let none = load_layered_yaml_from_strings(&[]).unwrap();
    let empty_map = load_layered_yaml_from_strings(&["{}"]).unwrap();
    let empty_doc = load_layered_yaml_from_strings(&[""]).unwrap();

    assert_eq!(none.config_hash, empty_map.config_hash);
    assert_eq!(none.config_hash, empty_doc.config_hash);
}
