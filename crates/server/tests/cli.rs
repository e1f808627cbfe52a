use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

#[test]
fn config_init_writes_example_file() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");

    let mut cmd = cargo_bin_cmd!("social-gateway");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .success();

    let content = fs::read_to_string(&config_path).expect("read config");
    assert!(content.contains("api_token_env"));
    assert!(content.contains("[pinterest]"));
    assert!(content.contains("enabled = false"));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "# existing\n").expect("write existing");

    let mut cmd = cargo_bin_cmd!("social-gateway");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn config_show_prints_effective_config() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "[server]\nlisten = \"127.0.0.1:9000\"\n").expect("write config");

    let mut cmd = cargo_bin_cmd!("social-gateway");
    cmd.args(["config", "show", "--config"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("127.0.0.1:9000"));
}

#[test]
fn doctor_json_reports_overall_status() {
    let dir = TempDir::new().expect("temp dir");

    let mut cmd = cargo_bin_cmd!("social-gateway");
    let output = cmd
        .current_dir(dir.path())
        .args(["doctor", "--json"])
        .output()
        .expect("run doctor");

    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert!(value.get("overall").is_some());
    assert_eq!(value["config"]["status"], "ok");
}

#[test]
fn doctor_fails_on_enabled_platform_without_credentials() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        "[pinterest]\nenabled = true\nclient_secret_env = \"SOCIAL_GATEWAY_TEST_UNSET\"\n",
    )
    .expect("write config");

    let mut cmd = cargo_bin_cmd!("social-gateway");
    cmd.args(["doctor", "--config"])
        .arg(&config_path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("missing credentials"));
}
