//! Integration tests for the `devconsole` CLI binary.
//!
//! Argument parsing, completions and error exit codes run without a device;
//! the remaining tests drive the binary against an in-process backend.
#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;

use assert_cmd::cargo::cargo_bin_cmd;
use futures_util::{SinkExt, StreamExt};
use predicates::prelude::*;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as Frame;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `devconsole` binary with env isolation.
///
/// Clears all `DEVCONSOLE_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn devconsole_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("devconsole");
    cmd.env("HOME", "/tmp/devconsole-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/devconsole-cli-test-nonexistent")
        .env_remove("DEVCONSOLE_PROFILE")
        .env_remove("DEVCONSOLE_HOST")
        .env_remove("DEVCONSOLE_PORT")
        .env_remove("DEVCONSOLE_SECURE")
        .env_remove("DEVCONSOLE_USERNAME")
        .env_remove("DEVCONSOLE_PASSWORD")
        .env_remove("DEVCONSOLE_OUTPUT")
        .env_remove("DEVCONSOLE_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = devconsole_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    devconsole_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("debug console")
            .and(predicate::str::contains("components"))
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("streams")),
    );
}

#[test]
fn test_version_flag() {
    devconsole_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("devconsole"));
}

#[test]
fn test_completions_zsh() {
    devconsole_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_bash() {
    devconsole_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = devconsole_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success(), "Expected failure for invalid subcommand");
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_missing_credentials_exit_code() {
    let output = devconsole_cmd().arg("device").output().unwrap();
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("No credentials"));
}

#[test]
fn test_unknown_profile_exit_code() {
    let output = devconsole_cmd().args(["--profile", "nope", "device"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("nope"));
}

#[cfg(target_os = "linux")]
#[test]
fn test_config_profile_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = dir.path().join("devconsole");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        "[profiles.lab]\nhost = \"127.0.0.1\"\nport = 9\n",
    )
    .unwrap();

    // the profile resolves, so the failure is about credentials, not the profile
    let output = devconsole_cmd()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["--profile", "lab", "device"])
        .output()
        .unwrap();
    let text = combined_output(&output);
    assert_eq!(output.status.code(), Some(3), "{text}");
    assert!(text.contains("'lab'"), "{text}");
}

#[test]
fn test_unreachable_backend_exit_code() {
    let port = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };
    let output = devconsole_cmd()
        .env("DEVCONSOLE_PASSWORD", "secret")
        .args(["--host", "127.0.0.1", "--port", &port.to_string()])
        .args(["--username", "admin", "--timeout", "2", "device"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7), "{}", combined_output(&output));
}

// ── Against a fake backend ──────────────────────────────────────────

fn answer(request: &Value) -> Vec<Value> {
    let id = request["requestID"].clone();
    let reply = |payload: Value| json!({"messageType": 0, "requestID": id, "payload": payload});
    match request["request"]["call"].as_str().unwrap_or_default() {
        "init" if request["request"]["args"][1] == "secret" => vec![reply(Value::Null)],
        "init" => vec![reply(json!("Not authenticated"))],
        "getComponentList" => vec![reply(json!([
            {"name": "main", "version": "1.0.0", "status": "RUNNING", "canStop": true},
            {"name": "aws.greengrass.Nucleus", "version": "2.12.0", "status": "FINISHED"}
        ]))],
        "getComponent" => vec![reply(Value::Null)],
        _ => vec![reply(json!(true))],
    }
}

async fn spawn_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(frame)) = ws.next().await {
                    let Frame::Text(text) = frame else { continue };
                    let request: Value = serde_json::from_str(&text).unwrap();
                    for reply in answer(&request) {
                        if ws.send(Frame::text(reply.to_string())).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });
    addr
}

async fn run_against(addr: SocketAddr, password: &str, args: &[&str]) -> std::process::Output {
    let mut cmd = devconsole_cmd();
    cmd.env("DEVCONSOLE_PASSWORD", password)
        .args(["--host", "127.0.0.1", "--port", &addr.port().to_string()])
        .args(["--username", "admin", "--timeout", "2"])
        .args(args);
    tokio::task::spawn_blocking(move || cmd.output().unwrap()).await.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ping_against_backend() {
    let addr = spawn_backend().await;
    let output = run_against(addr, "secret", &["ping"]).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "pong");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_components_list_as_json() {
    let addr = spawn_backend().await;
    let output = run_against(addr, "secret", &["components", "list", "-o", "json"]).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let listed: Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["aws.greengrass.Nucleus", "main"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_component_exit_code() {
    let addr = spawn_backend().await;
    let output = run_against(addr, "secret", &["components", "get", "ghost"]).await;
    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("components list"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wrong_password_exit_code() {
    let addr = spawn_backend().await;
    let output = run_against(addr, "wrong", &["device"]).await;
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("Not authenticated"));
}
