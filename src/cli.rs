use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::validator::training::TrainingDataset;
use crate::validator::{
    CrossValidationReport, DatasetSummary, ModelTrainer, TrainingMetrics, ValidatorConfig,
};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "VALIDATOR_CONFIG";

/// Block AI validator (library-facing definitions)
#[derive(Debug, Parser)]
#[command(name = "block_validator", about = "Block anomaly scoring service", version)]
pub struct Cli {
    /// Configuration file (TOML or JSON); falls back to $VALIDATOR_CONFIG
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the validation API (default)
    Serve(ServeArgs),
    /// Train the classifier and write the model artifact
    Train(TrainArgs),
    /// Write a synthetic training data file
    Generate(GenerateArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    /// Do not start the background block simulator
    #[arg(long)]
    pub no_simulator: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct TrainArgs {
    /// Synthetic samples to generate when no data file is given
    #[arg(long)]
    pub samples: Option<usize>,
    /// JSON training data file
    #[arg(long)]
    pub data: Option<PathBuf>,
    #[arg(long)]
    pub epochs: Option<usize>,
    /// Model artifact path (defaults to the configured model path)
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Also run K-fold cross-validation with this many folds
    #[arg(long = "cross-validate", value_name = "FOLDS")]
    pub cross_validate: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct GenerateArgs {
    #[arg(long, default_value_t = 1000)]
    pub samples: usize,
    #[arg(long, default_value = "data/training_data.json")]
    pub output: PathBuf,
}

impl Cli {
    /// `--config`, then `$VALIDATOR_CONFIG`
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
    }
}

/// File (if any) overlaid with environment overrides
pub fn load_config(path: Option<&Path>) -> Result<ValidatorConfig> {
    let mut config = match path {
        Some(path) => ValidatorConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ValidatorConfig::default(),
    };
    config.apply_env().context("invalid environment override")?;
    Ok(config)
}

impl ServeArgs {
    pub fn apply(&self, config: &mut ValidatorConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.no_simulator {
            config.simulator.enabled = false;
        }
    }
}

/// Everything a training run produced
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub output: PathBuf,
    pub dataset: DatasetSummary,
    pub metrics: TrainingMetrics,
    pub cross_validation: Option<CrossValidationReport>,
}

pub fn run_train(config: &ValidatorConfig, args: &TrainArgs) -> Result<TrainOutcome> {
    let mut training = config.training.clone();
    if let Some(epochs) = args.epochs {
        training.epochs = epochs;
    }
    let test_size = training.test_size;
    let mut trainer = ModelTrainer::new(training, config.model.architecture());

    let (x, y) = match &args.data {
        Some(path) => ModelTrainer::load_training_data(path)?,
        None => {
            info!("Generating synthetic training data...");
            let samples = args.samples.unwrap_or(trainer.config().synthetic_samples);
            trainer.generate_synthetic_data(samples)?
        }
    };
    let dataset = DatasetSummary::from_arrays(x.view(), y.view());

    let metrics = trainer.train_model(x.view(), y.view(), test_size)?;
    let cross_validation = match args.cross_validate {
        Some(folds) => Some(trainer.cross_validate(x.view(), y.view(), folds)?),
        None => None,
    };

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.model.model_path.clone());
    trainer.save_training_artifacts(&output)?;

    Ok(TrainOutcome {
        output,
        dataset,
        metrics,
        cross_validation,
    })
}

pub fn run_generate(config: &ValidatorConfig, args: &GenerateArgs) -> Result<DatasetSummary> {
    let trainer = ModelTrainer::new(config.training.clone(), config.model.architecture());
    let (x, y) = trainer.generate_synthetic_data(args.samples)?;
    TrainingDataset::from_arrays(x.view(), y.view())
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!("Training data written to {}", args.output.display());
    Ok(DatasetSummary::from_arrays(x.view(), y.view()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::try_parse_from([
            "block_validator",
            "serve",
            "--port",
            "6000",
            "--no-simulator",
        ])
        .unwrap();
        let Some(Commands::Serve(args)) = cli.command else {
            panic!("expected serve");
        };

        let mut config = ValidatorConfig::default();
        args.apply(&mut config);
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(!config.simulator.enabled);
    }

    #[test]
    fn test_parse_train_flags() {
        let cli = Cli::try_parse_from([
            "block_validator",
            "--config",
            "validator.toml",
            "train",
            "--samples",
            "500",
            "--cross-validate",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("validator.toml")));
        match cli.command {
            Some(Commands::Train(args)) => {
                assert_eq!(args.samples, Some(500));
                assert_eq!(args.cross_validate, Some(3));
                assert!(args.data.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_generate_defaults() {
        let cli = Cli::try_parse_from(["block_validator", "generate"]).unwrap();
        match cli.command {
            Some(Commands::Generate(args)) => {
                assert_eq!(args.samples, 1000);
                assert_eq!(args.output, PathBuf::from("data/training_data.json"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["block_validator"]).unwrap();
        assert!(cli.command.is_none());
    }
}
