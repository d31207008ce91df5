//! Dense feed-forward classifier
//!
//! A small multilayer perceptron (ReLU hidden layers, sigmoid output) trained
//! with binary cross-entropy and Adam. Inference disables dropout.

use ndarray::{Array, Array1, Array2, ArrayView1, ArrayView2, Axis, Dimension, Zip};
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::errors::{Result, ValidatorError};

/// Probabilities are clipped to [EPS, 1 - EPS] before taking logs
const LOSS_EPSILON: f64 = 1e-7;

/// Activation applied after a dense layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Sigmoid,
}

impl Activation {
    fn apply(self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Relu => z.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv(sigmoid),
        }
    }

    fn derivative(self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Relu => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Sigmoid => z.mapv(|v| {
                let s = sigmoid(v);
                s * (1.0 - s)
            }),
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// One hidden layer of the architecture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub units: usize,
    /// Dropout rate applied to the layer output during training
    pub dropout: f64,
}

/// Network shape: input width, hidden layers, single sigmoid output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArchitecture {
    pub input_dim: usize,
    pub hidden: Vec<LayerSpec>,
}

impl ModelArchitecture {
    pub fn new(input_dim: usize, hidden: Vec<LayerSpec>) -> Self {
        Self { input_dim, hidden }
    }

    /// 64 -> 32 -> 16 ReLU with 0.2 dropout after the first two layers
    pub fn default_hidden() -> Vec<LayerSpec> {
        vec![
            LayerSpec { units: 64, dropout: 0.2 },
            LayerSpec { units: 32, dropout: 0.2 },
            LayerSpec { units: 16, dropout: 0.0 },
        ]
    }
}

/// Adam hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }
}

/// Loss and classification scores at the 0.5 cut
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub loss: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
}

/// Shape summary of one dense layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSummary {
    pub name: String,
    pub inputs: usize,
    pub units: usize,
    pub activation: Activation,
    pub dropout: f64,
    pub params: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DenseLayer {
    /// (inputs, units)
    weights: Array2<f64>,
    bias: Array1<f64>,
    activation: Activation,
    dropout: f64,
}

impl DenseLayer {
    /// Glorot-uniform weights, zero bias
    fn new(inputs: usize, units: usize, activation: Activation, dropout: f64, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (inputs + units) as f64).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);
        Self {
            weights: Array2::from_shape_fn((inputs, units), |_| rng.sample(dist)),
            bias: Array1::zeros(units),
            activation,
            dropout,
        }
    }

    fn params(&self) -> usize {
        self.weights.len() + self.bias.len()
    }
}

struct LayerCache {
    input: Array2<f64>,
    pre_activation: Array2<f64>,
    mask: Option<Array2<f64>>,
}

#[derive(Debug, Clone)]
struct AdamState {
    t: i32,
    m_w: Vec<Array2<f64>>,
    v_w: Vec<Array2<f64>>,
    m_b: Vec<Array1<f64>>,
    v_b: Vec<Array1<f64>>,
}

impl AdamState {
    fn for_layers(layers: &[DenseLayer]) -> Self {
        Self {
            t: 0,
            m_w: layers.iter().map(|l| Array2::zeros(l.weights.raw_dim())).collect(),
            v_w: layers.iter().map(|l| Array2::zeros(l.weights.raw_dim())).collect(),
            m_b: layers.iter().map(|l| Array1::zeros(l.bias.raw_dim())).collect(),
            v_b: layers.iter().map(|l| Array1::zeros(l.bias.raw_dim())).collect(),
        }
    }
}

/// Dense binary classifier producing a validity probability per block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockValidatorModel {
    layers: Vec<DenseLayer>,
    #[serde(skip)]
    optimizer: Option<AdamState>,
}

impl BlockValidatorModel {
    /// Build a freshly initialized network
    pub fn new(architecture: &ModelArchitecture, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut layers = Vec::with_capacity(architecture.hidden.len() + 1);
        let mut inputs = architecture.input_dim;

        for spec in &architecture.hidden {
            layers.push(DenseLayer::new(inputs, spec.units, Activation::Relu, spec.dropout, &mut rng));
            inputs = spec.units;
        }
        layers.push(DenseLayer::new(inputs, 1, Activation::Sigmoid, 0.0, &mut rng));

        Self { layers, optimizer: None }
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map(|l| l.weights.nrows()).unwrap_or(0)
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map(|l| l.weights.ncols()).unwrap_or(0)
    }

    /// Number of dense layers (dropout is folded into the layer it follows)
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(DenseLayer::params).sum()
    }

    /// Check that deserialized layers chain into a single probability output
    pub fn validate_shapes(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(ValidatorError::Serialization("network has no layers".to_string()));
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.bias.len() != layer.weights.ncols() {
                return Err(ValidatorError::Serialization(format!(
                    "dense_{} has {} units but {} biases",
                    i,
                    layer.weights.ncols(),
                    layer.bias.len()
                )));
            }
            if !(0.0..1.0).contains(&layer.dropout) {
                return Err(ValidatorError::Serialization(format!(
                    "dense_{} dropout {} outside [0, 1)",
                    i, layer.dropout
                )));
            }
        }
        for (i, pair) in self.layers.windows(2).enumerate() {
            let (produced, consumed) = (pair[0].weights.ncols(), pair[1].weights.nrows());
            if produced != consumed {
                return Err(ValidatorError::Serialization(format!(
                    "dense_{} outputs {} values but dense_{} expects {}",
                    i,
                    produced,
                    i + 1,
                    consumed
                )));
            }
        }
        let output = self.output_dim();
        if output != 1 {
            return Err(ValidatorError::Serialization(format!(
                "network outputs {} values, expected 1",
                output
            )));
        }
        Ok(())
    }

    pub fn summary(&self) -> Vec<LayerSummary> {
        self.layers
            .iter()
            .enumerate()
            .map(|(i, l)| LayerSummary {
                name: format!("dense_{}", i),
                inputs: l.weights.nrows(),
                units: l.weights.ncols(),
                activation: l.activation,
                dropout: l.dropout,
                params: l.params(),
            })
            .collect()
    }

    /// Validity probability per row of a (samples, features) matrix
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.check_width(x.ncols())?;
        let mut current = x.to_owned();
        for layer in &self.layers {
            let z = current.dot(&layer.weights) + &layer.bias;
            current = layer.activation.apply(&z);
        }
        Ok(current.column(0).to_owned())
    }

    /// Validity probability for a single feature row
    pub fn predict_one(&self, row: ArrayView1<f64>) -> Result<f64> {
        let batch = row.insert_axis(Axis(0));
        let scores = self.predict_proba(batch)?;
        scores
            .get(0)
            .copied()
            .ok_or_else(|| ValidatorError::ModelInference("empty prediction".to_string()))
    }

    /// One Adam step on a mini-batch; returns the batch loss before the update
    pub fn train_batch(
        &mut self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        adam: &AdamConfig,
        rng: &mut StdRng,
    ) -> Result<f64> {
        self.check_width(x.ncols())?;
        if x.nrows() != y.len() || x.nrows() == 0 {
            return Err(ValidatorError::Training(format!(
                "batch has {} rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }

        let (caches, output) = self.forward_train(x, rng);
        let probabilities = output.column(0).to_owned();
        let loss = binary_cross_entropy(probabilities.view(), y);

        let (grads_w, grads_b) = self.backward(&caches, &output, y);
        self.apply_adam(&grads_w, &grads_b, adam);

        Ok(loss)
    }

    /// Loss, accuracy, precision and recall on labeled data
    pub fn evaluate(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<EvaluationMetrics> {
        if x.nrows() != y.len() {
            return Err(ValidatorError::InvalidInput(format!(
                "{} rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        let probabilities = self.predict_proba(x)?;
        Ok(classification_metrics(probabilities.view(), y))
    }

    fn check_width(&self, actual: usize) -> Result<()> {
        let expected = self.input_dim();
        if actual != expected {
            return Err(ValidatorError::DimensionMismatch { expected, actual });
        }
        Ok(())
    }

    fn forward_train(&self, x: ArrayView2<f64>, rng: &mut StdRng) -> (Vec<LayerCache>, Array2<f64>) {
        let mut caches = Vec::with_capacity(self.layers.len());
        let mut current = x.to_owned();

        for layer in &self.layers {
            let z = current.dot(&layer.weights) + &layer.bias;
            let mut activated = layer.activation.apply(&z);

            let mask = if layer.dropout > 0.0 {
                let keep = 1.0 - layer.dropout;
                let mask = Array2::from_shape_fn(activated.raw_dim(), |_| {
                    if rng.gen::<f64>() < keep {
                        1.0 / keep
                    } else {
                        0.0
                    }
                });
                activated = activated * &mask;
                Some(mask)
            } else {
                None
            };

            caches.push(LayerCache {
                input: current,
                pre_activation: z,
                mask,
            });
            current = activated;
        }

        (caches, current)
    }

    fn backward(
        &self,
        caches: &[LayerCache],
        output: &Array2<f64>,
        y: ArrayView1<f64>,
    ) -> (Vec<Array2<f64>>, Vec<Array1<f64>>) {
        let n = y.len() as f64;
        let last = self.layers.len() - 1;
        let labels = y.to_owned().insert_axis(Axis(1));

        let mut grads_w = vec![Array2::zeros((0, 0)); self.layers.len()];
        let mut grads_b = vec![Array1::zeros(0); self.layers.len()];

        // sigmoid + cross-entropy collapses to (p - y) / n at the output
        let mut delta = (output - &labels) / n;

        for idx in (0..self.layers.len()).rev() {
            let layer = &self.layers[idx];
            let cache = &caches[idx];

            if idx != last {
                if let Some(mask) = &cache.mask {
                    delta = delta * mask;
                }
                delta = delta * &layer.activation.derivative(&cache.pre_activation);
            }

            grads_w[idx] = cache.input.t().dot(&delta);
            grads_b[idx] = delta.sum_axis(Axis(0));

            if idx > 0 {
                delta = delta.dot(&layer.weights.t());
            }
        }

        (grads_w, grads_b)
    }

    fn apply_adam(&mut self, grads_w: &[Array2<f64>], grads_b: &[Array1<f64>], adam: &AdamConfig) {
        let layers = &mut self.layers;
        let state = self
            .optimizer
            .get_or_insert_with(|| AdamState::for_layers(layers));

        state.t += 1;
        let lr_t = adam.learning_rate * (1.0 - adam.beta2.powi(state.t)).sqrt()
            / (1.0 - adam.beta1.powi(state.t));

        for (i, layer) in layers.iter_mut().enumerate() {
            adam_update(&mut layer.weights, &grads_w[i], &mut state.m_w[i], &mut state.v_w[i], adam, lr_t);
            adam_update(&mut layer.bias, &grads_b[i], &mut state.m_b[i], &mut state.v_b[i], adam, lr_t);
        }
    }
}

fn adam_update<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    adam: &AdamConfig,
    lr_t: f64,
) {
    Zip::from(param).and(grad).and(m).and(v).for_each(|p, &g, m, v| {
        *m = adam.beta1 * *m + (1.0 - adam.beta1) * g;
        *v = adam.beta2 * *v + (1.0 - adam.beta2) * g * g;
        *p -= lr_t * *m / (v.sqrt() + adam.epsilon);
    });
}

/// Mean binary cross-entropy
pub fn binary_cross_entropy(probabilities: ArrayView1<f64>, labels: ArrayView1<f64>) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let total: f64 = probabilities
        .iter()
        .zip(labels.iter())
        .map(|(p, y)| {
            let p = p.clamp(LOSS_EPSILON, 1.0 - LOSS_EPSILON);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / labels.len() as f64
}

/// Loss plus accuracy/precision/recall with a 0.5 decision cut
pub fn classification_metrics(probabilities: ArrayView1<f64>, labels: ArrayView1<f64>) -> EvaluationMetrics {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut tn = 0usize;
    let mut fn_ = 0usize;

    for (p, y) in probabilities.iter().zip(labels.iter()) {
        match (*p > 0.5, *y > 0.5) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, false) => tn += 1,
            (false, true) => fn_ += 1,
        }
    }

    let total = tp + fp + tn + fn_;
    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

    EvaluationMetrics {
        loss: binary_cross_entropy(probabilities, labels),
        accuracy: ratio(tp + tn, total),
        precision: ratio(tp, tp + fp),
        recall: ratio(tp, tp + fn_),
    }
}
