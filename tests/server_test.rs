//! Integration tests for the ingestion HTTP server.
//!
//! The stand-in extraction collaborator is a shell script, so these tests
//! are unix-only.

#![cfg(unix)]

use sleepstage_agent::clock::Clock;
use sleepstage_agent::config::Config;
use sleepstage_agent::server::{run_with_state, ServerState};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir()
        .join("sleepstage-server-test")
        .join(uuid::Uuid::new_v4().to_string());
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Clock pinned to 2024-12-14, so the derived session id is "20241214".
struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2024, 12, 14, 3, 0, 0).unwrap()
    }
}

const SESSION_ID: &str = "20241214";

/// Stand-in extraction collaborator: writes `epochs` epochs of feature
/// series for the session id it is handed.
fn write_extractor_script(dir: &Path, epochs: usize) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("extractor.sh");
    let script = format!(
        "#!/bin/sh\n\
         id=\"$1\"\n\
         out=\"$2/features\"\n\
         mkdir -p \"$out\"\n\
         : > \"$out/${{id}}_cosine_feature.out\"\n\
         : > \"$out/${{id}}_count_feature.out\"\n\
         : > \"$out/${{id}}_hr_feature.out\"\n\
         : > \"$out/${{id}}_time_feature.out\"\n\
         i=0\n\
         while [ \"$i\" -lt {epochs} ]; do\n\
         echo 0.9 >> \"$out/${{id}}_cosine_feature.out\"\n\
         echo \"$i\" >> \"$out/${{id}}_count_feature.out\"\n\
         echo \"2.0 6$((i % 10)).0\" >> \"$out/${{id}}_hr_feature.out\"\n\
         echo \"$((i * 30))\" >> \"$out/${{id}}_time_feature.out\"\n\
         i=$((i + 1))\n\
         done\n"
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Classifier that predicts internal stage 4 for cosine above 0.5, else 1.
fn write_classifier(dir: &Path) -> PathBuf {
    let json = serde_json::json!({
        "classes": 5,
        "trees": [{
            "feature": [0, -1, -1],
            "threshold": [0.5, 0.0, 0.0],
            "left": [1, -1, -1],
            "right": [2, -1, -1],
            "value": [0, 1, 4]
        }]
    });
    let path = dir.join("classifier.json");
    std::fs::write(&path, json.to_string()).unwrap();
    path
}

async fn start_server(epochs: usize) -> (SocketAddr, tokio::sync::oneshot::Sender<()>, PathBuf) {
    let dir = scratch_dir();
    let config = Config {
        port: 0,
        data_dir: dir.clone(),
        model_path: write_classifier(&dir),
        extractor_command: Some(write_extractor_script(&dir, epochs)),
        ..Config::default()
    };

    let state =
        Arc::new(ServerState::with_clock(&config, Box::new(FixedClock)).expect("server state"));
    let (addr, shutdown_tx) = run_with_state(state, 0).await.expect("Failed to start server");

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    (addr, shutdown_tx, dir)
}

fn sample_batch() -> serde_json::Value {
    serde_json::json!({
        "x": [0.01, 0.02, 0.03],
        "y": [0.0, 0.01, 0.0],
        "z": [-0.98, -0.99, -0.97],
        "accel_timestamp": [0.0, 1.0, 2.0],
        "heartRate": [58.0, 57.0],
        "heartRate_timestamp": [0.5, 5.5],
        "absoluteStartTime": 1734140000.0
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let (addr, shutdown_tx, _dir) = start_server(30).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert!(body["version"].as_str().is_some());

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_ingest_returns_trailing_predictions() {
    let (addr, shutdown_tx, dir) = start_server(30).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{}/data", addr))
        .json(&sample_batch())
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");

    // 30 epochs -> 18 table rows, high cosine -> internal 4 -> external 5,
    // response holds the trailing 10
    let predictions = body["predictions"].as_array().expect("predictions array");
    assert_eq!(predictions.len(), 10);
    assert!(predictions.iter().all(|p| p.as_i64() == Some(5)));

    // Session files land under the clock-derived session id
    assert!(dir
        .join("motion")
        .join(format!("{SESSION_ID}_acceleration.txt"))
        .exists());
    let results =
        std::fs::read_to_string(dir.join("results").join(format!("{SESSION_ID}_model_results.txt")))
            .unwrap();
    assert_eq!(results.lines().count(), 18);

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_ingest_with_too_few_epochs() {
    let (addr, shutdown_tx, _dir) = start_server(19).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{}/data", addr))
        .json(&sample_batch())
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["message"], "not enough data to make prediction");

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_non_json_body_is_rejected() {
    let (addr, shutdown_tx, _dir) = start_server(30).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{}/data", addr))
        .header("Content-Type", "application/json")
        .body("this is not json")
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_mismatched_arrays_are_rejected_without_writes() {
    let (addr, shutdown_tx, dir) = start_server(30).await;

    let mut batch = sample_batch();
    batch["x"] = serde_json::json!([0.01]);

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{}/data", addr))
        .json(&batch)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(!dir
        .join("motion")
        .join(format!("{SESSION_ID}_acceleration.txt"))
        .exists());

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_sleep_data_endpoint() {
    let (addr, shutdown_tx, dir) = start_server(30).await;

    let intervals = serde_json::json!([
        {"stage": 2, "startDate": "2024-12-14T01:00:00Z", "endDate": "2024-12-14T01:30:00Z"},
        {"stage": 5, "startDate": "2024-12-14T01:30:00Z", "endDate": "2024-12-14T02:00:00Z"}
    ]);

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{}/sleep_data", addr))
        .json(&intervals)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["message"], "Sleep data saved successfully");

    let saved = std::fs::read_to_string(
        dir.join("sleep_logs")
            .join(format!("sleep_data_{SESSION_ID}.json")),
    )
    .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&saved).unwrap();
    assert_eq!(parsed, intervals);

    // Non-JSON body gets the documented message
    let response = client
        .post(format!("http://{}/sleep_data", addr))
        .header("Content-Type", "application/json")
        .body("nope")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["message"], "Request was not JSON");

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_explicit_session_id_overrides_clock() {
    let (addr, shutdown_tx, dir) = start_server(30).await;

    let mut batch = sample_batch();
    batch["sessionId"] = serde_json::json!("night-07");

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{}/data", addr))
        .json(&batch)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    assert!(dir.join("motion").join("night-07_acceleration.txt").exists());

    let _ = shutdown_tx.send(());
}
