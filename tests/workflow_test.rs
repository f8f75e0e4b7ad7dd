//! Workflow Integration Tests
//!
//! 設定ファイルの読み込みから CommandWorkflow の実行までの統合テスト

use std::fs;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use tempfile::TempDir;

use gcpkit::adapter::config::Config;
use gcpkit::driver::cli::{Args, Command};
use gcpkit::driver::workflow::CommandWorkflow;

/// テスト用のConfigファイルを作成
fn create_test_config(dir: &Path) -> String {
    let config_path = dir.join("gcpkit.json");
    let config_content = r#"{
  "project_id": "test-project",
  "credentials_path": "/tmp/test-key.json",
  "bigtable_instance": "test-instance",
  "list_timeout_secs": 15,
  "export": {
    "retries": 1,
    "delayMs": 250,
    "timeoutMs": 60000,
    "delimiter": "\t",
    "disableHeader": true,
    "labels": {"job": "nightly"}
  }
}"#;
    fs::write(&config_path, config_content).unwrap();
    config_path.to_string_lossy().to_string()
}

#[test]
fn test_config_file_with_cli_overrides() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_test_config(temp_dir.path());

    let args = Args::parse_from([
        "gcpkit",
        "--config",
        &config_path,
        "--project",
        "cli-project",
        "datasets",
    ]);
    let config = Config::load(&args.config)
        .unwrap()
        .with_overrides(args.project.clone(), args.credentials.clone());

    assert_eq!(config.project_id, "cli-project");
    assert_eq!(config.credentials_path.as_deref(), Some("/tmp/test-key.json"));
    assert_eq!(config.bigtable_instance.as_deref(), Some("test-instance"));

    let options = config.client_options();
    assert_eq!(options.list_timeout, Duration::from_secs(15));

    let export = config.export_config();
    assert_eq!(export.retries, 1);
    assert_eq!(export.delay, Duration::from_millis(250));
    assert_eq!(export.timeout, Some(Duration::from_secs(60)));
    assert_eq!(export.delimiter, "\t");
    assert!(export.disable_header);
    assert_eq!(export.labels["job"], "nightly");
}

#[test]
fn test_missing_config_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.json");

    let config = Config::load_or_default(missing.to_str().unwrap()).unwrap();
    assert_eq!(config, Config::default());
}

#[tokio::test]
async fn test_workflow_requires_project() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("gcpkit.json");
    fs::write(&config_path, r#"{"bigtable_instance": "inst"}"#).unwrap();

    let config = Config::load(config_path.to_str().unwrap()).unwrap();
    let workflow = CommandWorkflow::new(config);

    let err = workflow
        .execute(Command::Tables {
            dataset: "sales".into(),
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("project_id is not set"));
}

#[tokio::test]
async fn test_workflow_upload_reports_unreadable_input() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_test_config(temp_dir.path());
    let workflow = CommandWorkflow::new(Config::load(&config_path).unwrap());

    let missing = temp_dir.path().join("nothing.bin");
    let err = workflow
        .execute(Command::Upload {
            bucket: "bucket".into(),
            name: "nothing.bin".into(),
            input: missing.to_string_lossy().to_string(),
            content_type: "application/octet-stream".into(),
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Failed to read"));
}
