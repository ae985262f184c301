//! Failures that happen before any database work.

use assert_cmd::Command;
use predicates::prelude::*;

const UNSET_DB_VAR: &str = "PFM_TEST_DB_URL_NEVER_SET_7F3A";

fn config_without_db(dir: &tempfile::TempDir) -> String {
    let path = dir.path().join("cli.yaml");
    std::fs::write(
        &path,
        format!("secrets_env:\n  database_url: \"{UNSET_DB_VAR}\"\n"),
    )
    .unwrap();
    path.to_string_lossy().into_owned()
}

fn pfm(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pfm").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("PFM_CONFIG")
        .env_remove(UNSET_DB_VAR);
    cmd
}

#[test]
fn reset_run_without_database_url_names_the_var() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_without_db(&dir);

    pfm(&dir)
        .args(["--config", &cfg, "reset", "run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SECRETS_MISSING"))
        .stderr(predicate::str::contains(UNSET_DB_VAR));
}

#[test]
fn card_available_rejects_malformed_card_id() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_without_db(&dir);
    let user = uuid::Uuid::new_v4().to_string();

    pfm(&dir)
        .args([
            "--config",
            &cfg,
            "card",
            "available",
            "--card",
            "not-a-uuid",
            "--user",
            &user,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("INVALID_INPUT invalid card uuid"));
}

#[test]
fn card_reconcile_rejects_malformed_amount() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_without_db(&dir);
    let card = uuid::Uuid::new_v4().to_string();
    let user = uuid::Uuid::new_v4().to_string();

    pfm(&dir)
        .args([
            "--config",
            &cfg,
            "card",
            "reconcile",
            "--card",
            &card,
            "--user",
            &user,
            "--declared",
            "12,50",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("INVALID_INPUT declared amount"));
}
