//! Model training
//!
//! Synthetic data generation, dataset loading, the train/evaluate loop and
//! K-fold cross-validation for the block classifier.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution, Exp, Normal, Poisson};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use super::config::TrainingConfig;
use super::errors::{Result, ValidatorError};
use super::features::{FeatureExtractor, FeatureMap, FeatureVector, FEATURE_NAMES};
use super::model::ModelArtifact;
use super::network::{BlockValidatorModel, EvaluationMetrics, ModelArchitecture};
use super::scaler::StandardScaler;

/// One labeled example on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub features: Vec<f64>,
    pub label: f64,
}

/// Training data file: `{ "samples": [ { "features": [...], "label": 0|1 } ] }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingDataset {
    pub samples: Vec<TrainingSample>,
}

impl TrainingDataset {
    pub fn from_arrays(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Self {
        let samples = x
            .outer_iter()
            .zip(y.iter())
            .map(|(row, label)| TrainingSample {
                features: row.to_vec(),
                label: *label,
            })
            .collect();
        Self { samples }
    }

    /// Feature matrix and label vector; every row must be full width
    pub fn to_arrays(&self) -> Result<(Array2<f64>, Array1<f64>)> {
        if self.samples.is_empty() {
            return Err(ValidatorError::Dataset("dataset has no samples".to_string()));
        }
        let width = FeatureVector::dimension();
        let mut flat = Vec::with_capacity(self.samples.len() * width);
        let mut labels = Vec::with_capacity(self.samples.len());

        for (i, sample) in self.samples.iter().enumerate() {
            if sample.features.len() != width {
                return Err(ValidatorError::Dataset(format!(
                    "sample {} has {} features, expected {}",
                    i,
                    sample.features.len(),
                    width
                )));
            }
            if sample.label != 0.0 && sample.label != 1.0 {
                return Err(ValidatorError::Dataset(format!(
                    "sample {} has label {}, expected 0 or 1",
                    i, sample.label
                )));
            }
            flat.extend_from_slice(&sample.features);
            labels.push(sample.label);
        }

        let x = Array2::from_shape_vec((self.samples.len(), width), flat)
            .map_err(|e| ValidatorError::Dataset(e.to_string()))?;
        Ok((x, Array1::from(labels)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }
}

/// Shape and class balance of a labeled dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub samples_generated: usize,
    pub positive_samples: usize,
    pub negative_samples: usize,
    pub data_shape: [usize; 2],
}

impl DatasetSummary {
    pub fn from_arrays(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Self {
        let positives = y.iter().filter(|v| **v > 0.5).count();
        Self {
            samples_generated: x.nrows(),
            positive_samples: positives,
            negative_samples: y.len() - positives,
            data_shape: [x.nrows(), x.ncols()],
        }
    }
}

/// Per-epoch training curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: Option<f64>,
    pub val_accuracy: Option<f64>,
}

/// Held-out results of `train_model`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub test_loss: f64,
    pub test_accuracy: f64,
    pub test_precision: f64,
    pub test_recall: f64,
    pub train_samples: usize,
    pub test_samples: usize,
    pub training_history: Vec<EpochRecord>,
}

impl TrainingMetrics {
    pub fn evaluation(&self) -> EvaluationMetrics {
        EvaluationMetrics {
            loss: self.test_loss,
            accuracy: self.test_accuracy,
            precision: self.test_precision,
            recall: self.test_recall,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoldScore {
    pub fold: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub loss: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationReport {
    pub mean_accuracy: f64,
    pub std_accuracy: f64,
    pub mean_precision: f64,
    pub mean_recall: f64,
    pub fold_scores: Vec<FoldScore>,
}

/// Sampling distributions for synthetic blocks
struct SyntheticDistributions {
    tx_count: Poisson<f64>,
    total_fee: Exp<f64>,
    block_size: Normal<f64>,
    timestamp_drift: Exp<f64>,
    miner_reputation: Beta<f64>,
    validator_consensus: Beta<f64>,
    gas_used_ratio: Beta<f64>,
    uncle_count: Poisson<f64>,
    difficulty_change: Normal<f64>,
    network_hashrate_change: Normal<f64>,
    stake_distribution: Beta<f64>,
    voting_participation: Beta<f64>,
    ai_confidence_prev: Beta<f64>,
    anomaly_score_tx: Beta<f64>,
    memory_pool_size: Poisson<f64>,
}

impl SyntheticDistributions {
    fn new() -> Result<Self> {
        let err = |e: &dyn std::fmt::Display| ValidatorError::Training(format!("distribution: {}", e));
        Ok(Self {
            tx_count: Poisson::new(150.0).map_err(|e| err(&e))?,
            // exponential with mean 1000
            total_fee: Exp::new(1.0 / 1000.0).map_err(|e| err(&e))?,
            block_size: Normal::new(80_000.0, 20_000.0).map_err(|e| err(&e))?,
            timestamp_drift: Exp::new(1.0 / 2.0).map_err(|e| err(&e))?,
            miner_reputation: Beta::new(2.0, 2.0).map_err(|e| err(&e))?,
            validator_consensus: Beta::new(8.0, 2.0).map_err(|e| err(&e))?,
            gas_used_ratio: Beta::new(5.0, 5.0).map_err(|e| err(&e))?,
            uncle_count: Poisson::new(0.1).map_err(|e| err(&e))?,
            difficulty_change: Normal::new(0.0, 0.1).map_err(|e| err(&e))?,
            network_hashrate_change: Normal::new(0.0, 0.05).map_err(|e| err(&e))?,
            stake_distribution: Beta::new(2.0, 5.0).map_err(|e| err(&e))?,
            voting_participation: Beta::new(7.0, 3.0).map_err(|e| err(&e))?,
            ai_confidence_prev: Beta::new(8.0, 2.0).map_err(|e| err(&e))?,
            anomaly_score_tx: Beta::new(1.0, 10.0).map_err(|e| err(&e))?,
            memory_pool_size: Poisson::new(5000.0).map_err(|e| err(&e))?,
        })
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> FeatureMap {
        let mut raw = FeatureMap::new();
        raw.insert("tx_count".into(), self.tx_count.sample(rng));
        raw.insert("total_fee".into(), self.total_fee.sample(rng));
        raw.insert("block_size".into(), self.block_size.sample(rng));
        raw.insert("timestamp_drift".into(), self.timestamp_drift.sample(rng));
        raw.insert("miner_reputation".into(), self.miner_reputation.sample(rng));
        raw.insert("validator_consensus".into(), self.validator_consensus.sample(rng));
        raw.insert("gas_used_ratio".into(), self.gas_used_ratio.sample(rng));
        raw.insert("uncle_count".into(), self.uncle_count.sample(rng));
        raw.insert("difficulty_change".into(), self.difficulty_change.sample(rng));
        raw.insert(
            "network_hashrate_change".into(),
            self.network_hashrate_change.sample(rng),
        );
        raw.insert("stake_distribution".into(), self.stake_distribution.sample(rng));
        raw.insert("voting_participation".into(), self.voting_participation.sample(rng));
        raw.insert("ai_confidence_prev".into(), self.ai_confidence_prev.sample(rng));
        raw.insert("anomaly_score_tx".into(), self.anomaly_score_tx.sample(rng));
        raw.insert("memory_pool_size".into(), self.memory_pool_size.sample(rng));
        raw
    }
}

/// Valid iff low drift, strong consensus, few outlier transactions and a
/// reputable miner, with 10% of those still flipped to invalid
fn synthetic_label<R: Rng>(raw: &FeatureMap, rng: &mut R) -> f64 {
    let get = |name: &str| raw.get(name).copied().unwrap_or(0.0);
    let valid = get("timestamp_drift") < 10.0
        && get("validator_consensus") > 0.6
        && get("anomaly_score_tx") < 0.3
        && get("miner_reputation") > 0.3
        && rng.gen::<f64>() > 0.1;
    if valid {
        1.0
    } else {
        0.0
    }
}

/// Trains the classifier and keeps the resulting network and scaler
pub struct ModelTrainer {
    config: TrainingConfig,
    architecture: ModelArchitecture,
    model: BlockValidatorModel,
    scaler: Option<StandardScaler>,
    metrics: Option<EvaluationMetrics>,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig, architecture: ModelArchitecture) -> Self {
        let model = BlockValidatorModel::new(&architecture, config.seed);
        Self {
            config,
            architecture,
            model,
            scaler: None,
            metrics: None,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn model(&self) -> &BlockValidatorModel {
        &self.model
    }

    pub fn scaler(&self) -> Option<&StandardScaler> {
        self.scaler.as_ref()
    }

    /// Seeded synthetic dataset, normalized with the feature ranges
    pub fn generate_synthetic_data(&self, num_samples: usize) -> Result<(Array2<f64>, Array1<f64>)> {
        info!("Generating {} synthetic training samples", num_samples);

        let distributions = SyntheticDistributions::new()?;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let width = FEATURE_NAMES.len();
        let mut x = Array2::zeros((num_samples, width));
        let mut y = Array1::zeros(num_samples);

        for i in 0..num_samples {
            let raw = distributions.sample(&mut rng);
            let normalized = FeatureExtractor::normalize_features(&raw);
            for (j, name) in FEATURE_NAMES.iter().enumerate() {
                x[[i, j]] = normalized.get(*name).copied().unwrap_or(0.0);
            }
            y[i] = synthetic_label(&raw, &mut rng);
        }

        Ok((x, y))
    }

    /// Read a JSON training file
    pub fn load_training_data(path: &Path) -> Result<(Array2<f64>, Array1<f64>)> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ValidatorError::Dataset(format!("{}: {}", path.display(), e)))?;
        let dataset: TrainingDataset = serde_json::from_str(&content)
            .map_err(|e| ValidatorError::Dataset(format!("{}: {}", path.display(), e)))?;
        let arrays = dataset.to_arrays()?;
        info!("Loaded {} training samples", arrays.0.nrows());
        Ok(arrays)
    }

    /// Shuffled split, scaler fit on the training part, full training run,
    /// evaluation on the held-out part
    pub fn train_model(
        &mut self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        test_size: f64,
    ) -> Result<TrainingMetrics> {
        check_xy(x, y)?;
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(ValidatorError::Training(format!(
                "test size {} must be between 0 and 1",
                test_size
            )));
        }

        let n = x.nrows();
        let n_test = (n as f64 * test_size).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(ValidatorError::Training(format!(
                "{} samples cannot be split with test size {}",
                n, test_size
            )));
        }

        info!("Starting model training on {} samples", n);

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);
        let (test_idx, train_idx) = order.split_at(n_test);

        let x_train = x.select(Axis(0), train_idx);
        let y_train = y.select(Axis(0), train_idx);
        let x_test = x.select(Axis(0), test_idx);
        let y_test = y.select(Axis(0), test_idx);

        let (scaler, x_train_scaled) = StandardScaler::fit_transform(x_train.view())?;
        let x_test_scaled = scaler.transform(x_test.view())?;

        let mut model = BlockValidatorModel::new(&self.architecture, self.config.seed);
        let history = self.fit(
            &mut model,
            x_train_scaled.view(),
            y_train.view(),
            self.config.epochs,
            Some((x_test_scaled.view(), y_test.view())),
            &mut rng,
        )?;

        let test = model.evaluate(x_test_scaled.view(), y_test.view())?;
        info!("Training completed. Test accuracy: {:.4}", test.accuracy);

        self.model = model;
        self.scaler = Some(scaler);
        self.metrics = Some(test);

        Ok(TrainingMetrics {
            test_loss: test.loss,
            test_accuracy: test.accuracy,
            test_precision: test.precision,
            test_recall: test.recall,
            train_samples: train_idx.len(),
            test_samples: test_idx.len(),
            training_history: history,
        })
    }

    /// Shuffled K-fold with a fresh network and scaler per fold
    pub fn cross_validate(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        folds: usize,
    ) -> Result<CrossValidationReport> {
        check_xy(x, y)?;
        let n = x.nrows();
        if folds < 2 || folds > n {
            return Err(ValidatorError::Training(format!(
                "cannot run {} folds over {} samples",
                folds, n
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);

        let mut fold_scores = Vec::with_capacity(folds);
        let mut start = 0;

        for fold in 0..folds {
            // first n % folds folds take one extra sample
            let size = n / folds + usize::from(fold < n % folds);
            let val_idx = &order[start..start + size];
            let train_idx: Vec<usize> = order[..start]
                .iter()
                .chain(order[start + size..].iter())
                .copied()
                .collect();
            start += size;

            info!("Training fold {}/{}", fold + 1, folds);

            let x_train = x.select(Axis(0), &train_idx);
            let y_train = y.select(Axis(0), &train_idx);
            let x_val = x.select(Axis(0), val_idx);
            let y_val = y.select(Axis(0), val_idx);

            let (scaler, x_train_scaled) = StandardScaler::fit_transform(x_train.view())?;
            let x_val_scaled = scaler.transform(x_val.view())?;

            let seed = self.config.seed.wrapping_add(fold as u64 + 1);
            let mut model = BlockValidatorModel::new(&self.architecture, seed);
            self.fit(
                &mut model,
                x_train_scaled.view(),
                y_train.view(),
                self.config.cv_epochs,
                None,
                &mut rng,
            )?;

            let scores = model.evaluate(x_val_scaled.view(), y_val.view())?;
            fold_scores.push(FoldScore {
                fold: fold + 1,
                accuracy: scores.accuracy,
                precision: scores.precision,
                recall: scores.recall,
                loss: scores.loss,
            });
        }

        let accuracies: Vec<f64> = fold_scores.iter().map(|s| s.accuracy).collect();
        let precisions: Vec<f64> = fold_scores.iter().map(|s| s.precision).collect();
        let recalls: Vec<f64> = fold_scores.iter().map(|s| s.recall).collect();

        let report = CrossValidationReport {
            mean_accuracy: super::stats::mean(&accuracies),
            std_accuracy: super::stats::std_dev(&accuracies),
            mean_precision: super::stats::mean(&precisions),
            mean_recall: super::stats::mean(&recalls),
            fold_scores,
        };
        info!(
            "Cross-validation completed. Mean accuracy: {:.4}",
            report.mean_accuracy
        );
        Ok(report)
    }

    /// Current network and scaler as a persistable artifact
    pub fn artifact(&self) -> ModelArtifact {
        let artifact = ModelArtifact::new(self.model.clone(), self.scaler.clone());
        match self.metrics {
            Some(metrics) => artifact.with_metrics(metrics),
            // nothing has been fit yet
            None => ModelArtifact {
                trained_at: None,
                ..artifact
            },
        }
    }

    pub fn save_training_artifacts(&self, path: &Path) -> Result<()> {
        self.artifact().save(path)?;
        info!("Training artifacts saved: {}", path.display());
        Ok(())
    }

    fn fit(
        &self,
        model: &mut BlockValidatorModel,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        epochs: usize,
        validation: Option<(ArrayView2<f64>, ArrayView1<f64>)>,
        rng: &mut StdRng,
    ) -> Result<Vec<EpochRecord>> {
        let adam = self.config.adam();
        let batch_size = self.config.batch_size.max(1);
        let mut order: Vec<usize> = (0..x.nrows()).collect();
        let mut history = Vec::with_capacity(epochs);

        for epoch in 1..=epochs {
            order.shuffle(rng);
            let mut loss_sum = 0.0;
            let mut batches = 0usize;

            for batch in order.chunks(batch_size) {
                let xb = x.select(Axis(0), batch);
                let yb = y.select(Axis(0), batch);
                loss_sum += model.train_batch(xb.view(), yb.view(), &adam, rng)?;
                batches += 1;
            }

            let train = model.evaluate(x, y)?;
            let val = match validation {
                Some((xv, yv)) => Some(model.evaluate(xv, yv)?),
                None => None,
            };

            let record = EpochRecord {
                epoch,
                loss: loss_sum / batches.max(1) as f64,
                accuracy: train.accuracy,
                val_loss: val.map(|v| v.loss),
                val_accuracy: val.map(|v| v.accuracy),
            };
            debug!(
                "epoch {}/{} loss={:.4} accuracy={:.4}",
                epoch, epochs, record.loss, record.accuracy
            );
            history.push(record);
        }

        Ok(history)
    }
}

fn check_xy(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(ValidatorError::Training("no training samples".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(ValidatorError::Training(format!(
            "{} rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::network::LayerSpec;
    use tempfile::TempDir;

    fn quick_trainer(epochs: usize) -> ModelTrainer {
        let config = TrainingConfig {
            epochs,
            cv_epochs: epochs,
            ..TrainingConfig::default()
        };
        let architecture = ModelArchitecture::new(
            FEATURE_NAMES.len(),
            vec![LayerSpec { units: 8, dropout: 0.1 }, LayerSpec { units: 4, dropout: 0.0 }],
        );
        ModelTrainer::new(config, architecture)
    }

    #[test]
    fn test_synthetic_data_is_seeded_and_normalized() {
        let trainer = quick_trainer(1);
        let (x1, y1) = trainer.generate_synthetic_data(300).unwrap();
        let (x2, y2) = trainer.generate_synthetic_data(300).unwrap();

        assert_eq!(x1.dim(), (300, 15));
        assert_eq!(x1, x2);
        assert_eq!(y1, y2);
        assert!(x1.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(y1.iter().all(|v| *v == 0.0 || *v == 1.0));

        // most synthetic blocks are valid, but not all
        let summary = DatasetSummary::from_arrays(x1.view(), y1.view());
        assert!(summary.positive_samples > summary.negative_samples);
        assert!(summary.negative_samples > 0);
        assert_eq!(summary.data_shape, [300, 15]);
    }

    #[test]
    fn test_train_model_records_history() {
        let mut trainer = quick_trainer(3);
        let (x, y) = trainer.generate_synthetic_data(200).unwrap();
        let metrics = trainer.train_model(x.view(), y.view(), 0.2).unwrap();

        assert_eq!(metrics.test_samples, 40);
        assert_eq!(metrics.train_samples, 160);
        assert_eq!(metrics.training_history.len(), 3);
        assert!(metrics.training_history.iter().all(|r| r.val_loss.is_some()));
        assert!((0.0..=1.0).contains(&metrics.test_accuracy));
        assert!(trainer.scaler().is_some());
    }

    #[test]
    fn test_train_model_rejects_bad_split() {
        let mut trainer = quick_trainer(1);
        let x = Array2::zeros((1, 15));
        let y = Array1::zeros(1);
        assert!(trainer.train_model(x.view(), y.view(), 0.2).is_err());

        let (x, y) = trainer.generate_synthetic_data(20).unwrap();
        assert!(trainer.train_model(x.view(), y.view(), 1.5).is_err());
    }

    #[test]
    fn test_cross_validate_fold_count() {
        let trainer = quick_trainer(1);
        let (x, y) = trainer.generate_synthetic_data(50).unwrap();

        let report = trainer.cross_validate(x.view(), y.view(), 3).unwrap();
        assert_eq!(report.fold_scores.len(), 3);
        assert_eq!(report.fold_scores[2].fold, 3);
        assert!((0.0..=1.0).contains(&report.mean_accuracy));

        assert!(trainer.cross_validate(x.view(), y.view(), 1).is_err());
        assert!(trainer.cross_validate(x.view(), y.view(), 51).is_err());
    }

    #[test]
    fn test_dataset_file_roundtrip_and_validation() {
        let dir = TempDir::new().unwrap();
        let trainer = quick_trainer(1);
        let (x, y) = trainer.generate_synthetic_data(10).unwrap();

        let path = dir.path().join("data").join("train.json");
        TrainingDataset::from_arrays(x.view(), y.view()).save(&path).unwrap();
        let (lx, ly) = ModelTrainer::load_training_data(&path).unwrap();
        assert_eq!(lx, x);
        assert_eq!(ly, y);

        let narrow = dir.path().join("narrow.json");
        std::fs::write(&narrow, r#"{"samples":[{"features":[0.1,0.2],"label":1}]}"#).unwrap();
        assert!(matches!(
            ModelTrainer::load_training_data(&narrow),
            Err(ValidatorError::Dataset(_))
        ));

        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, r#"{"samples":[]}"#).unwrap();
        assert!(ModelTrainer::load_training_data(&empty).is_err());
    }

    #[test]
    fn test_saved_artifact_carries_scaler() {
        let dir = TempDir::new().unwrap();
        let mut trainer = quick_trainer(1);
        let (x, y) = trainer.generate_synthetic_data(60).unwrap();
        trainer.train_model(x.view(), y.view(), 0.25).unwrap();

        let path = dir.path().join("model.json");
        trainer.save_training_artifacts(&path).unwrap();
        let artifact = ModelArtifact::load(&path).unwrap();
        assert!(artifact.scaler.is_some());
        assert!(artifact.metrics.is_some());
        assert_eq!(artifact.feature_names.len(), 15);
    }
}
