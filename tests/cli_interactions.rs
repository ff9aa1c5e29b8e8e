//! CLI options interaction tests
//!
//! These tests run the compiled binary and check flag validation, the
//! auxiliary modes and a complete JSON run against a mock server.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const ENV_VARS: [&str; 14] = [
    "SPEED_SERVER",
    "DOWNLOAD_URL",
    "UPLOAD_URL",
    "CONCURRENT_STREAMS",
    "DOWNLOAD_BYTES_PER_STREAM",
    "UPLOAD_CHUNK_BYTES",
    "TICK_INTERVAL_MS",
    "UPLOAD_TICK_INTERVAL_MS",
    "MIN_UPLOAD_DURATION_MS",
    "MIN_UPLOAD_BYTES",
    "LATENCY_SAMPLE_COUNT",
    "LATENCY_DELAY_MS",
    "TIMEOUT_SECONDS",
    "ENABLE_COLOR",
];

/// Command running in an empty directory with no configuration in the environment
fn create_test_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("speedprobe").unwrap();
    cmd.current_dir(dir.path());
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_main_options() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--streams"))
        .stdout(predicate::str::contains("--list-servers"))
        .stdout(predicate::str::contains("--share-card"));
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_write_env_example() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("example.env");

    create_test_cmd(&dir)
        .arg("--write-env-example")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("example.env"));

    let content = fs::read_to_string(&target).unwrap();
    for var in ENV_VARS {
        assert!(content.contains(var), "missing {}", var);
    }
}

#[test]
fn test_color_flags_conflict() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--color", "--no-color"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--color and --no-color"));
}

#[test]
fn test_share_card_requires_probe_run() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--list-servers", "--share-card", "card.svg"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--share-card"));
}

#[test]
fn test_stream_count_out_of_range() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir).args(["--streams", "0"]).assert().failure().code(2);
    create_test_cmd(&dir).args(["--streams", "33"]).assert().failure().code(2);
}

#[test]
fn test_zero_timeout_rejected() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir).args(["--timeout", "0"]).assert().failure().code(2);
}

#[test]
fn test_invalid_download_url() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--download-url", "not a url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--download-url"));
}

#[test]
fn test_unknown_server_without_overrides() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--server", "nowhere", "--no-color"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("nowhere"));
}

#[test]
fn test_invalid_env_file_value() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".env"), "CONCURRENT_STREAMS=lots\n").unwrap();

    create_test_cmd(&dir)
        .arg("--no-color")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("CONCURRENT_STREAMS"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_json_run_against_mock_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/__down"))
        .and(query_param("bytes", "0"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/__down"))
        .and(query_param("bytes", "131072"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 131_072]))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/__up"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let card = dir.path().join("card.svg");
    let output = create_test_cmd(&dir)
        .arg("--download-url")
        .arg(format!("{}/__down", server.uri()))
        .arg("--upload-url")
        .arg(format!("{}/__up", server.uri()))
        .args([
            "--json",
            "--streams",
            "2",
            "--download-bytes",
            "131072",
            "--upload-chunk",
            "65536",
            "--samples",
            "3",
            "--latency-delay",
            "10",
            "--min-upload-duration",
            "200",
            "--min-upload-bytes",
            "131072",
        ])
        .arg("--share-card")
        .arg(&card)
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["latencySamples"].as_array().unwrap().len(), 3);
    assert_eq!(json["download"]["totalBytes"], 262_144);
    assert!(json["downloadMbps"].as_f64().unwrap() > 0.0);
    assert!(json["uploadMbps"].as_f64().unwrap() > 0.0);
    assert!(json["server"].is_null());
    assert!(json["quality"]["streaming"].is_string());

    let svg = fs::read_to_string(&card).unwrap();
    assert!(svg.contains("<svg"));
}
