use block_ai_validator::cli;
use block_ai_validator::validator::network::LayerSpec;
use block_ai_validator::validator::{DecisionThresholds, ValidatorConfig};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

const FULL_TOML: &str = r#"
[features]
history_window = 50
target_block_time_secs = 12.0

[model]
model_path = "artifacts/model.json"
accept_threshold = 0.9
reject_threshold = 0.4
seed = 7
hidden_layers = [
    { units = 32, dropout = 0.1 },
    { units = 8, dropout = 0.0 },
]

[training]
epochs = 20
batch_size = 64

[server]
host = "127.0.0.1"
port = 8088
cors_origins = ["http://localhost:3000"]

[simulator]
enabled = false
interval_secs = 2

[journal]
log_dir = "logs"
"#;

#[test]
fn test_load_full_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("validator.toml");
    std::fs::write(&path, FULL_TOML).unwrap();

    let config = ValidatorConfig::from_file(&path).unwrap();
    assert_eq!(config.features.history_window, 50);
    assert_eq!(config.model.model_path, PathBuf::from("artifacts/model.json"));
    assert_eq!(
        config.model.thresholds(),
        DecisionThresholds { accept: 0.9, reject: 0.4 }
    );
    assert_eq!(
        config.model.hidden_layers,
        vec![
            LayerSpec { units: 32, dropout: 0.1 },
            LayerSpec { units: 8, dropout: 0.0 },
        ]
    );
    assert_eq!(config.training.epochs, 20);
    assert_eq!(config.training.batch_size, 64);
    // untouched keys keep their defaults
    assert_eq!(config.training.cv_folds, 5);
    assert_eq!(config.server.bind_addr(), "127.0.0.1:8088");
    assert_eq!(config.server.cors_origins, vec!["http://localhost:3000".to_string()]);
    assert!(!config.simulator.enabled);
    assert_eq!(config.simulator.interval(), Duration::from_secs(2));
    assert_eq!(config.journal.path(), PathBuf::from("logs/block_validations.jsonl"));
}

#[test]
fn test_invalid_thresholds_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[model]\naccept_threshold = 0.3\nreject_threshold = 0.6\n").unwrap();

    assert!(ValidatorConfig::from_file(&path).is_err());
}

#[test]
fn test_load_config_without_file_is_default() {
    let config = cli::load_config(None).unwrap();
    assert_eq!(config.model.model_path, PathBuf::from("models/block_validator.json"));
    assert_eq!(config.training.synthetic_samples, 10_000);
}

#[test]
fn test_load_config_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.toml");
    assert!(cli::load_config(Some(&missing)).is_err());
}
