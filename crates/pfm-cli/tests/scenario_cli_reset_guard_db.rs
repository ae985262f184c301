//! `pfm reset run` holds the once-per-month guard across invocations.
//!
//! DB-backed test, skipped if PFM_DATABASE_URL is not set. `reset.marker:
//! memory` is set on purpose: the CLI ignores it and uses the persisted marker.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn second_run_same_month_is_skipped_even_with_memory_marker() {
    if std::env::var("PFM_DATABASE_URL").is_err() {
        eprintln!("SKIP: PFM_DATABASE_URL not set");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("cli.yaml");
    std::fs::write(&cfg, "reset:\n  marker: \"memory\"\n").unwrap();
    let cfg = cfg.to_string_lossy().into_owned();

    let day1 = "2091-03-01T12:00:00Z";

    Command::cargo_bin("pfm")
        .unwrap()
        .env_remove("PFM_CONFIG")
        .args(["--config", &cfg, "db", "migrate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("migrations_applied=true"));

    // May already be done by an earlier run against the same database.
    Command::cargo_bin("pfm")
        .unwrap()
        .env_remove("PFM_CONFIG")
        .args(["--config", &cfg, "reset", "run", "--at", day1])
        .assert()
        .success();

    Command::cargo_bin("pfm")
        .unwrap()
        .env_remove("PFM_CONFIG")
        .args(["--config", &cfg, "reset", "run", "--at", day1])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "skipped=true month=2091-03 reason=already_done",
        ));

    Command::cargo_bin("pfm")
        .unwrap()
        .env_remove("PFM_CONFIG")
        .args(["--config", &cfg, "reset", "run", "--at", day1, "--require"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SKIPPED_GUARD"));
}
