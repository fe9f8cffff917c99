//! Integration tests for the `acsbridge` binary.
//!
//! Argument parsing, help, completions and error exits run without an ACS.
//! The read path is exercised against a mocked NBI.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEVICE: &str = "A0B1C2-HGW-0001";

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `acsbridge` binary with env isolation.
///
/// Clears all `ACSBRIDGE_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn acsbridge_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("acsbridge");
    cmd.env("HOME", "/tmp/acsbridge-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/acsbridge-cli-test-nonexistent")
        .env_remove("ACSBRIDGE_PROFILE")
        .env_remove("ACSBRIDGE_NBI_URL")
        .env_remove("ACSBRIDGE_USERNAME")
        .env_remove("ACSBRIDGE_PASSWORD")
        .env_remove("ACSBRIDGE_OUTPUT")
        .env_remove("ACSBRIDGE_INSECURE")
        .env_remove("ACSBRIDGE_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn tr181_device() -> serde_json::Value {
    let leaf = |v: serde_json::Value, t: &str| json!({ "_value": v, "_type": t, "_writable": true });
    json!([{
        "_id": DEVICE,
        "_deviceId": { "_Manufacturer": "Acme", "_ProductClass": "HGW", "_SerialNumber": "0001" },
        "Device": {
            "_object": true,
            "WiFi": {
                "SSID": {
                    "1": { "SSID": leaf(json!("Home"), "xsd:string"), "Enable": leaf(json!(true), "xsd:boolean") },
                    "2": { "SSID": leaf(json!("Home-5G"), "xsd:string") }
                },
                "Radio": { "1": { "Channel": leaf(json!(6), "xsd:unsignedInt") } }
            },
            "DeviceInfo": { "SoftwareVersion": leaf(json!("V1.2.0"), "xsd:string") }
        }
    }])
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = acsbridge_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_flag() {
    acsbridge_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("TR-069")
            .and(predicate::str::contains("values"))
            .and(predicate::str::contains("set"))
            .and(predicate::str::contains("catalog")),
    );
}

#[test]
fn test_version_flag() {
    acsbridge_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("acsbridge"));
}

#[test]
fn test_invalid_subcommand() {
    acsbridge_cmd().arg("reboot").assert().failure().code(2);
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_for_each_shell() {
    for shell in ["bash", "zsh", "fish"] {
        acsbridge_cmd()
            .args(["completions", shell])
            .assert()
            .success()
            .stdout(predicate::str::is_empty().not());
    }
}

// ── Offline commands ────────────────────────────────────────────────

#[test]
fn test_catalog_lists_builtin_keys() {
    acsbridge_cmd()
        .args(["catalog", "-o", "plain"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("wifi_5_ssid")
                .and(predicate::str::contains("lan_ip"))
                .and(predicate::str::contains("inform_interval")),
        );
}

#[test]
fn test_catalog_category_filter() {
    acsbridge_cmd()
        .args(["catalog", "--category", "management", "-o", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("acs_url").and(predicate::str::contains("wifi_5_ssid").not()));
}

#[test]
fn test_config_path_prints_location() {
    acsbridge_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_profiles_from_config_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let cfg_dir = dir.path().join("acsbridge");
    std::fs::create_dir_all(&cfg_dir).unwrap();
    std::fs::write(
        cfg_dir.join("config.toml"),
        "default_profile = \"lab\"\n\n[profiles.lab]\nnbi_url = \"http://10.0.0.5:7557\"\n",
    )
    .unwrap();

    acsbridge_cmd()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lab *").and(predicate::str::contains("http://10.0.0.5:7557")));
}

// ── Error exits ─────────────────────────────────────────────────────

#[test]
fn test_values_without_config_fails() {
    let output = acsbridge_cmd().args(["values", DEVICE]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("No ACS configured"));
}

#[test]
fn test_unknown_profile_is_not_found() {
    acsbridge_cmd()
        .args(["-p", "nope", "values", DEVICE])
        .assert()
        .failure()
        .code(4);
}

#[test]
fn test_set_requires_assignment() {
    acsbridge_cmd().args(["set", DEVICE]).assert().failure().code(2);
}

#[test]
fn test_set_unknown_key_fails_before_connecting() {
    // Nothing listens on port 9; the key check must fail first.
    acsbridge_cmd()
        .args(["-u", "http://127.0.0.1:9", "set", DEVICE, "no_such_key=1"])
        .assert()
        .failure()
        .code(4);
}

#[test]
fn test_set_bad_value_is_usage_error() {
    acsbridge_cmd()
        .args(["-u", "http://127.0.0.1:9", "set", DEVICE, "wifi_24_channel=eleven"])
        .assert()
        .failure()
        .code(2);
}

// ── Against a mocked NBI ────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_values_reads_logical_settings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devices/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tr181_device()))
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = tokio::task::spawn_blocking(move || {
        acsbridge_cmd()
            .args(["-u", &uri, "values", DEVICE, "-o", "json"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    let bindings: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let find = |key: &str| {
        bindings
            .as_array()
            .unwrap()
            .iter()
            .find(|b| b["key"] == key)
            .cloned()
    };
    assert_eq!(find("wifi_24_ssid").unwrap()["value"], "Home");
    assert_eq!(find("wifi_5_ssid").unwrap()["path"], "Device.WiFi.SSID.2.SSID");
    assert_eq!(find("wifi_24_channel").unwrap()["value"], 6);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_params_category_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devices/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tr181_device()))
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = tokio::task::spawn_blocking(move || {
        acsbridge_cmd()
            .args(["-u", &uri, "params", DEVICE, "--category", "wifi", "-o", "json"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    let params: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let paths: Vec<&str> = params
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths.len(), 4);
    assert!(paths.iter().all(|p| p.starts_with("Device.WiFi.")), "{paths:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_device_exits_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devices/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = tokio::task::spawn_blocking(move || {
        acsbridge_cmd().args(["-u", &uri, "values", DEVICE]).output().unwrap()
    })
    .await
    .unwrap();

    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
}
