//! Train, persist, reload and serve a model end to end

use block_ai_validator::cli::{self, GenerateArgs, TrainArgs};
use block_ai_validator::service::ValidationService;
use block_ai_validator::validator::network::LayerSpec;
use block_ai_validator::validator::{
    AiValidator, BlockData, BlockFeatureEngine, Decision, ModelArtifact, ModelTrainer,
    ValidatorConfig,
};
use tempfile::TempDir;

/// Small network and short runs so the suite stays fast
fn quick_config(dir: &TempDir) -> ValidatorConfig {
    let mut config = ValidatorConfig::default();
    config.model.model_path = dir.path().join("models").join("block_validator.json");
    config.model.hidden_layers = vec![
        LayerSpec { units: 16, dropout: 0.1 },
        LayerSpec { units: 8, dropout: 0.0 },
    ];
    config.training.epochs = 5;
    config.training.cv_epochs = 2;
    config.training.synthetic_samples = 400;
    config.journal.enabled = false;
    config
}

#[test]
fn test_train_command_writes_loadable_artifact() {
    let dir = TempDir::new().unwrap();
    let config = quick_config(&dir);

    let outcome = cli::run_train(&config, &TrainArgs::default()).unwrap();
    assert_eq!(outcome.output, config.model.model_path);
    assert_eq!(outcome.dataset.samples_generated, 400);
    assert_eq!(outcome.metrics.test_samples, 80);
    assert_eq!(outcome.metrics.training_history.len(), 5);
    assert!(outcome.cross_validation.is_none());

    let artifact = ModelArtifact::load(&config.model.model_path).unwrap();
    assert!(artifact.trained_at.is_some());
    assert!(artifact.scaler.is_some());

    let validator = AiValidator::load(&config.model.model_path, config.model.thresholds()).unwrap();
    assert!(validator.is_trained());
    assert_eq!(validator.model_label(), "dense_mlp");
}

#[test]
fn test_train_command_with_cross_validation_and_epochs() {
    let dir = TempDir::new().unwrap();
    let config = quick_config(&dir);
    let args = TrainArgs {
        samples: Some(120),
        epochs: Some(2),
        output: Some(dir.path().join("custom.json")),
        cross_validate: Some(3),
        ..TrainArgs::default()
    };

    let outcome = cli::run_train(&config, &args).unwrap();
    assert_eq!(outcome.dataset.samples_generated, 120);
    assert_eq!(outcome.metrics.training_history.len(), 2);
    let cv = outcome.cross_validation.unwrap();
    assert_eq!(cv.fold_scores.len(), 3);
    assert!((0.0..=1.0).contains(&cv.mean_accuracy));
    assert!(dir.path().join("custom.json").exists());
    assert!(!config.model.model_path.exists());
}

#[test]
fn test_generate_then_train_from_file() {
    let dir = TempDir::new().unwrap();
    let config = quick_config(&dir);
    let data_path = dir.path().join("data").join("training_data.json");

    let summary = cli::run_generate(
        &config,
        &GenerateArgs {
            samples: 150,
            output: data_path.clone(),
        },
    )
    .unwrap();
    assert_eq!(summary.samples_generated, 150);
    assert_eq!(summary.data_shape, [150, 15]);

    let (x, y) = ModelTrainer::load_training_data(&data_path).unwrap();
    assert_eq!(x.nrows(), 150);
    assert_eq!(y.len(), 150);

    let args = TrainArgs {
        data: Some(data_path),
        ..TrainArgs::default()
    };
    let outcome = cli::run_train(&config, &args).unwrap();
    assert_eq!(outcome.dataset.samples_generated, 150);
    assert_eq!(outcome.metrics.train_samples + outcome.metrics.test_samples, 150);
}

#[test]
fn test_missing_data_file_fails() {
    let dir = TempDir::new().unwrap();
    let config = quick_config(&dir);
    let args = TrainArgs {
        data: Some(dir.path().join("missing.json")),
        ..TrainArgs::default()
    };
    assert!(cli::run_train(&config, &args).is_err());
}

#[test]
fn test_service_uses_trained_artifact() {
    let dir = TempDir::new().unwrap();
    let config = quick_config(&dir);
    cli::run_train(&config, &TrainArgs::default()).unwrap();

    let mut service = ValidationService::from_config(&config);
    assert!(service.validator().is_trained());

    let report = service.validate_block(BlockData::default()).unwrap();
    assert_eq!(report.model, "dense_mlp");
    assert_ne!(report.decision, Decision::Unknown);
    assert!((0.0..=1.0).contains(&report.score));
    assert_eq!(service.history_len(), 1);
}

#[test]
fn test_service_falls_back_without_artifact() {
    let dir = TempDir::new().unwrap();
    let config = quick_config(&dir);

    let mut service = ValidationService::from_config(&config);
    assert!(service.validator().is_loaded());
    assert!(!service.validator().is_trained());

    let report = service.validate_block(BlockData::default()).unwrap();
    assert_eq!(report.model, "dense_mlp_untrained");
}

#[test]
fn test_replace_validator_swaps_model() {
    let dir = TempDir::new().unwrap();
    let config = quick_config(&dir);
    cli::run_train(&config, &TrainArgs::default()).unwrap();

    let mut service = ValidationService::new(
        AiValidator::new(config.model.thresholds()),
        BlockFeatureEngine::new(),
    );
    assert!(!service.stats().model_loaded);
    assert!(service.model_info().is_err());

    let trained = AiValidator::load(&config.model.model_path, config.model.thresholds()).unwrap();
    service.replace_validator(trained);
    let info = service.model_info().unwrap();
    assert!(info.model_trained);
    assert_eq!(info.layers, 3);
    assert_eq!(info.input_shape, [None, Some(15)]);
}
