use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn autonomy(dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_autonomy"));
    cmd.current_dir(dir)
        .env_remove("AUTONOMY_ENDPOINT")
        .env_remove("AUTONOMY_MODELS")
        .env_remove("AUTONOMY_TIMEOUT_SECS")
        .env_remove("AUTONOMY_PACKAGE_MANAGER")
        .env_remove("RUST_LOG")
        .env("AUTONOMY_MEMORY_PATH", dir.join("memory.json"));
    cmd
}

#[test]
fn test_cli_help() {
    let dir = tempdir().unwrap();
    autonomy(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scaffolds web projects"))
        .stdout(predicate::str::contains("resume"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_cli_version() {
    let dir = tempdir().unwrap();
    autonomy(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("autonomy 0.1.0"));
}

#[test]
fn test_resume_without_recorded_project_fails() {
    let dir = tempdir().unwrap();
    autonomy(dir.path())
        .arg("resume")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No project recorded"));
}

#[test]
fn test_missing_config_file_fails() {
    let dir = tempdir().unwrap();
    autonomy(dir.path())
        .args(["--config", "nope.yml", "new"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_invalid_timeout_env_fails() {
    let dir = tempdir().unwrap();
    autonomy(dir.path())
        .env("AUTONOMY_TIMEOUT_SECS", "soon")
        .arg("new")
        .assert()
        .failure()
        .stderr(predicate::str::contains("AUTONOMY_TIMEOUT_SECS"));
}

#[test]
fn test_unreachable_endpoint_is_fatal() {
    let dir = tempdir().unwrap();
    autonomy(dir.path())
        .args(["--endpoint", "http://127.0.0.1:9", "new"])
        .write_stdin("")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Inference endpoint unavailable"));
}

#[tokio::test]
async fn test_log_filter_from_dotenv_applies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"models": [{"name": "llama3:latest"}]})),
        )
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(".env"), "RUST_LOG=debug\n").unwrap();
    let endpoint = server.uri();

    let output = tokio::task::spawn_blocking(move || {
        autonomy(dir.path())
            .args(["--endpoint", &endpoint, "--model", "llama3", "new"])
            .env("AUTONOMY_PACKAGE_MANAGER", "definitely-not-a-package-manager")
            .write_stdin("")
            .timeout(std::time::Duration::from_secs(30))
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Installed models"), "stderr was: {}", stderr);
}
