//! Integration tests for the `roomtrack` CLI binary.
//!
//! Argument parsing, help output and completions run without a backend;
//! directory commands run against a wiremock server.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `roomtrack` binary with env isolation.
///
/// Clears all `ROOMTRACK_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn roomtrack_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("roomtrack");
    cmd.env("HOME", "/tmp/roomtrack-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/roomtrack-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("ROOMTRACK_PROFILE")
        .env_remove("ROOMTRACK_API_URL")
        .env_remove("ROOMTRACK_SOCKET_URL")
        .env_remove("ROOMTRACK_OUTPUT")
        .env_remove("ROOMTRACK_INSECURE")
        .env_remove("ROOMTRACK_TIMEOUT");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

async fn directory_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/rooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "_id": "r1", "name": "Living Room", "deviceID": "dev-1" },
            { "_id": "r2", "name": "Kitchen", "deviceID": "dev-2" }
        ])))
        .mount(&server)
        .await;
    server
}

/// Run the binary off the async runtime so the mock server keeps serving.
async fn run(args: Vec<String>) -> std::process::Output {
    tokio::task::spawn_blocking(move || roomtrack_cmd().args(args).output().unwrap())
        .await
        .unwrap()
}

fn api_args(server: &MockServer, rest: &[&str]) -> Vec<String> {
    let mut args = vec!["--api-url".to_owned(), format!("{}/api", server.uri())];
    args.extend(rest.iter().map(|s| (*s).to_owned()));
    args
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = roomtrack_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    roomtrack_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("rooms")
            .and(predicate::str::contains("presence"))
            .and(predicate::str::contains("overview")),
    );
}

#[test]
fn test_version_flag() {
    roomtrack_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("roomtrack"));
}

#[test]
fn test_completions_bash() {
    roomtrack_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_rooms_subcommands_exist() {
    roomtrack_cmd()
        .args(["rooms", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("list")
                .and(predicate::str::contains("add"))
                .and(predicate::str::contains("edit"))
                .and(predicate::str::contains("rm")),
        );
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = roomtrack_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_invalid_output_format() {
    roomtrack_cmd()
        .args(["--output", "xml", "rooms", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("possible values"));
}

#[test]
fn test_config_path_needs_no_backend() {
    roomtrack_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_unknown_profile() {
    roomtrack_cmd()
        .args(["--profile", "lab", "rooms", "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("lab"));
}

#[test]
fn test_rooms_list_backend_down() {
    roomtrack_cmd()
        .args(["--api-url", "http://127.0.0.1:9/api", "--timeout", "2"])
        .args(["rooms", "list"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("Failed to fetch rooms"));
}

// ── Directory commands ──────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_rooms_list_plain() {
    let server = directory_server().await;
    let output = run(api_args(&server, &["-o", "plain", "rooms", "list"])).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "r1\nr2\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rooms_list_json() {
    let server = directory_server().await;
    let output = run(api_args(&server, &["-o", "json-compact", "rooms", "list"])).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed[1]["name"], "Kitchen");
    assert_eq!(parsed[1]["device_id"], "dev-2");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rooms_get_unknown_id() {
    let server = directory_server().await;
    let output = run(api_args(&server, &["rooms", "get", "r9"])).await;

    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("r9"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rooms_add_blank_name_is_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let output = run(api_args(
        &server,
        &["rooms", "add", "--name", "  ", "--device-id", "dev-3"],
    ))
    .await;

    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Please fill in all fields"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rooms_rm_requires_yes_without_terminal() {
    let server = directory_server().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let output = run(api_args(&server, &["rooms", "rm", "r1"])).await;

    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--yes"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rooms_rm_with_yes() {
    let server = directory_server().await;
    Mock::given(method("DELETE"))
        .and(path("/api/rooms/r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let output = run(api_args(&server, &["--yes", "rooms", "rm", "r1"])).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("Room deleted successfully!"));
}
