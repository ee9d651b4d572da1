//! CLI integration tests
//!
//! Tests the osctrld binary using assert_cmd.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENV_VARS: &[&str] = &[
    "OSCTRL_CONFIG",
    "OSCTRL_SECRET",
    "OSCTRL_ENV",
    "OSQUERY_SECRET",
    "OSQUERY_FLAGFILE",
    "OSQUERY_CERTIFICATE",
    "OSCTRL_URL",
    "OSQUERY_PATH",
    "OSCTRL_INSECURE",
    "OSCTRL_VERBOSE",
    "OSCTRL_FORCE",
    "RUST_LOG",
];

/// osctrld isolated from the caller's environment and config directory
fn osctrld(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("osctrld")
        .expect("Failed to locate osctrld binary - ensure it's built before running tests");
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.env("HOME", home).env("XDG_CONFIG_HOME", home.join(".config"));
    cmd
}

/// Command pointed at `server` with every osquery file inside `home`
fn against(server: &MockServer, home: &Path) -> Command {
    let mut cmd = osctrld(home);
    cmd.args(["--environment", "dev", "--secret", "abc"])
        .arg("--osctrl-url")
        .arg(server.uri())
        .arg("--osquery-path")
        .arg(home);
    cmd
}

#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    osctrld(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("osctrld"))
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("--osctrl-url"));
}

#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    osctrld(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("osctrld"));
}

#[test]
fn test_cli_unknown_command() {
    let home = TempDir::new().unwrap();
    osctrld(home.path())
        .arg("nonexistent-command")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_missing_environment_exits_2() {
    let home = TempDir::new().unwrap();
    osctrld(home.path())
        .args(["--osctrl-url", "http://localhost:9", "flags"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Environment for osctrl is required"));
}

#[test]
fn test_missing_base_url_exits_2() {
    let home = TempDir::new().unwrap();
    osctrld(home.path())
        .env("OSCTRL_ENV", "dev")
        .arg("verify")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Base URL for osctrl is required"));
}

#[test]
fn test_missing_config_file_exits_2() {
    let home = TempDir::new().unwrap();
    osctrld(home.path())
        .arg("--configuration")
        .arg(home.path().join("absent.toml"))
        .arg("cert")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error reading configuration file"));
}

#[test]
fn test_save_and_execute_conflict() {
    let home = TempDir::new().unwrap();
    osctrld(home.path())
        .args(["enroll", "--save", "--execute"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_flags_written_from_config_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dev/osctrld-flags"))
        .respond_with(ResponseTemplate::new(200).set_body_string("--x=1\n"))
        .expect(1)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let flag_file = home.path().join("custom.flags");
    let config = home.path().join("osctrld.toml");
    std::fs::write(
        &config,
        format!(
            "[osctrld]\nsecret = \"abc\"\nenvironment = \"dev\"\nbase_url = \"{}\"\nflag_file = \"{}\"\n",
            server.uri(),
            flag_file.display()
        ),
    )
    .unwrap();

    // Status lines stay off stdout
    osctrld(home.path())
        .env("OSCTRL_CONFIG", &config)
        .arg("flags")
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Flags created at"));

    assert_eq!(std::fs::read_to_string(&flag_file).unwrap(), "--x=1");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_flags_mismatch_needs_force() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dev/osctrld-flags"))
        .respond_with(ResponseTemplate::new(200).set_body_string("--x=1"))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let flag_file = home.path().join("osquery.flags");
    std::fs::write(&flag_file, "--x=2").unwrap();

    against(&server, home.path())
        .arg("flags")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("please use --force to overwrite"));
    assert_eq!(std::fs::read_to_string(&flag_file).unwrap(), "--x=2");

    against(&server, home.path())
        .args(["--force", "flags"])
        .assert()
        .success();
    assert_eq!(std::fs::read_to_string(&flag_file).unwrap(), "--x=1");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_enroll_prints_script() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!(
            "/dev/enroll/{}/osctrld-script",
            expected_platform()
        )))
        .respond_with(ResponseTemplate::new(200).set_body_string("#!/bin/sh\necho hi\n"))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    against(&server, home.path())
        .arg("enroll")
        .assert()
        .success()
        .stdout(predicate::str::contains("#!/bin/sh\necho hi"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_server_error_exits_1() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("invalid secret"))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    against(&server, home.path())
        .arg("cert")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("HTTP 403 - Response: invalid secret"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_verify_prints_report_and_honors_strict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dev/osctrld-verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "flags": "--x=1",
            "certificate": "",
            "osquery_version": "5.2.0",
        })))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("osquery.secret"), "abc\n").unwrap();
    std::fs::write(home.path().join("osquery.flags"), "--x=1\n").unwrap();

    // Flags match but the other checks cannot pass on a test machine
    against(&server, home.path())
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("secret"))
        .stdout(predicate::str::contains("installation"));

    against(&server, home.path())
        .args(["verify", "--strict"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("checks failed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_verify_abort_still_prints_secret_check() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dev/osctrld-verify"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("osquery.secret"), "abc").unwrap();

    against(&server, home.path())
        .arg("verify")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("secret"))
        .stdout(predicate::str::contains("pass"))
        .stderr(predicate::str::contains("Verification aborted"))
        .stderr(predicate::str::contains("HTTP 500 - Response: boom"));
}

fn expected_platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}
