//! Smoke tests -- verify the binary runs and the subcommands work end to end.

use assert_cmd::Command;
use predicates::str::contains;

fn cli(db: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("logwatch-incidents").unwrap();
    cmd.env_remove("LOGWATCH_CONFIG").arg("--db").arg(db);
    cmd
}

#[test]
fn test_cli_help() {
    Command::cargo_bin("logwatch-incidents")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Rule-driven incident checks"));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("logwatch-incidents")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains("logwatch-incidents"));
}

#[test]
fn test_check_on_empty_database() {
    let dir = tempfile::TempDir::new().unwrap();
    cli(&dir.path().join("empty.db"))
        .arg("check")
        .assert()
        .success()
        .stdout(contains("No incident descriptions configured"));
}

#[test]
fn test_import_ingest_check() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("logwatch.db");
    let rules = dir.path().join("rules.json");
    std::fs::write(
        &rules,
        r#"[
            {"name": "disk-full", "timerange": "300",
             "conditions": [{"type": 1, "subtype": 3, "value": "ERROR"}]},
            {"name": "broken", "timerange": "300"}
        ]"#,
    )
    .unwrap();

    cli(&db)
        .args(["import", "--file"])
        .arg(&rules)
        .assert()
        .success()
        .stdout(contains("Imported 2 document(s)"));

    cli(&db)
        .args(["ingest", "--host", "web01", "--level", "2", "--message", "disk /var is full"])
        .assert()
        .success();

    cli(&db)
        .args(["check", "--json"])
        .assert()
        .success()
        .stdout(contains("\"title\": \"disk-full\""))
        .stdout(contains("\"status\": \"incident\""));

    cli(&db)
        .arg("descriptions")
        .assert()
        .success()
        .stdout(contains("disk-full"))
        .stdout(contains("skipped: broken"));
}

#[test]
fn test_config_load_is_logged() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = dir.path().join("logwatch.toml");
    std::fs::write(&config, "[logging]\nlevel = \"info\"\n").unwrap();

    cli(&dir.path().join("logwatch.db"))
        .env("RUST_LOG", "info")
        .arg("--config")
        .arg(&config)
        .arg("descriptions")
        .assert()
        .success()
        .stderr(contains("loaded configuration"));
}

#[test]
fn test_ingest_rejects_out_of_range_level() {
    let dir = tempfile::TempDir::new().unwrap();
    cli(&dir.path().join("x.db"))
        .args(["ingest", "--host", "a", "--level", "9", "--message", "m"])
        .assert()
        .failure();
}
