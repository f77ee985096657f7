use relink_core::{ConfigError, TransferConfig};
use std::path::PathBuf;

#[test]
fn load_reads_partial_file_over_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("relink.json");
    let log_dir = dir.path().join("logs");
    let json = serde_json::json!({
        "actor": "nightly-batch",
        "sync_index": false,
        "logging": { "level": "WARN", "log_dir": log_dir },
    });
    std::fs::write(&path, json.to_string()).unwrap();

    let config = TransferConfig::load(&path).unwrap();

    assert_eq!(config.actor, "nightly-batch");
    assert!(!config.sync_index);
    assert_eq!(config.report_file_name, TransferConfig::default().report_file_name);
    assert_eq!(config.logging.level, "WARN");
    assert_eq!(config.logging.log_dir, Some(log_dir));
}

#[test]
fn load_reports_missing_file_with_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("absent.json");

    let err = TransferConfig::load(&path).unwrap_err();

    match err {
        ConfigError::Io { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn load_rejects_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ actor: ").unwrap();

    let err = TransferConfig::load(&path).unwrap_err();

    assert!(matches!(err, ConfigError::Parse(_)));
}
