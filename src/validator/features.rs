//! Block feature extractor
//!
//! Turns a submitted block into the fixed, normalized feature vector the
//! classifier consumes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::block::BlockData;
use super::stats;

/// Named descriptors computed for a block
pub type FeatureMap = BTreeMap<String, f64>;

/// Classifier input order
pub const FEATURE_NAMES: [&str; 15] = [
    "tx_count",
    "total_fee",
    "block_size",
    "timestamp_drift",
    "miner_reputation",
    "validator_consensus",
    "gas_used_ratio",
    "uncle_count",
    "difficulty_change",
    "network_hashrate_change",
    "stake_distribution",
    "voting_participation",
    "ai_confidence_prev",
    "anomaly_score_tx",
    "memory_pool_size",
];

/// Normalization range per classifier feature
pub const FEATURE_RANGES: [(&str, f64, f64); 15] = [
    ("tx_count", 0.0, 10_000.0),
    ("total_fee", 0.0, 1_000_000.0),
    ("block_size", 0.0, 8_000_000.0),
    ("timestamp_drift", 0.0, 300.0),
    ("miner_reputation", 0.0, 1.0),
    ("validator_consensus", 0.0, 1.0),
    ("gas_used_ratio", 0.0, 1.0),
    ("uncle_count", 0.0, 10.0),
    ("difficulty_change", -0.5, 0.5),
    ("network_hashrate_change", -0.5, 0.5),
    ("stake_distribution", 0.0, 1.0),
    ("voting_participation", 0.0, 1.0),
    ("ai_confidence_prev", 0.0, 1.0),
    ("anomaly_score_tx", 0.0, 1.0),
    ("memory_pool_size", 0.0, 10_000.0),
];

/// Z-score beyond which a transaction amount counts as an outlier
pub const TX_OUTLIER_Z: f64 = 2.0;

/// Normalized classifier input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub tx_count: f64,
    pub total_fee: f64,
    pub block_size: f64,
    pub timestamp_drift: f64,
    pub miner_reputation: f64,
    pub validator_consensus: f64,
    pub gas_used_ratio: f64,
    pub uncle_count: f64,
    pub difficulty_change: f64,
    pub network_hashrate_change: f64,
    pub stake_distribution: f64,
    pub voting_participation: f64,
    pub ai_confidence_prev: f64,
    pub anomaly_score_tx: f64,
    pub memory_pool_size: f64,
}

impl FeatureVector {
    /// Values in `FEATURE_NAMES` order
    pub fn to_vector(&self) -> Vec<f64> {
        vec![
            self.tx_count,
            self.total_fee,
            self.block_size,
            self.timestamp_drift,
            self.miner_reputation,
            self.validator_consensus,
            self.gas_used_ratio,
            self.uncle_count,
            self.difficulty_change,
            self.network_hashrate_change,
            self.stake_distribution,
            self.voting_participation,
            self.ai_confidence_prev,
            self.anomaly_score_tx,
            self.memory_pool_size,
        ]
    }

    /// Build from a slice in `FEATURE_NAMES` order
    pub fn from_vector(vec: &[f64]) -> Option<Self> {
        if vec.len() < Self::dimension() {
            return None;
        }

        Some(Self {
            tx_count: vec[0],
            total_fee: vec[1],
            block_size: vec[2],
            timestamp_drift: vec[3],
            miner_reputation: vec[4],
            validator_consensus: vec[5],
            gas_used_ratio: vec[6],
            uncle_count: vec[7],
            difficulty_change: vec[8],
            network_hashrate_change: vec[9],
            stake_distribution: vec[10],
            voting_participation: vec[11],
            ai_confidence_prev: vec[12],
            anomaly_score_tx: vec[13],
            memory_pool_size: vec[14],
        })
    }

    /// Pick the classifier features out of a descriptor map; absent names read as 0.0
    pub fn from_map(map: &FeatureMap) -> Self {
        let values: Vec<f64> = FEATURE_NAMES
            .iter()
            .map(|name| map.get(*name).copied().unwrap_or(0.0))
            .collect();
        // FEATURE_NAMES always yields a full-width vector
        Self::from_vector(&values).unwrap_or_default()
    }

    /// As a descriptor map keyed by feature name
    pub fn to_map(&self) -> FeatureMap {
        FEATURE_NAMES
            .iter()
            .zip(self.to_vector())
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    pub fn dimension() -> usize {
        FEATURE_NAMES.len()
    }
}

/// Stateless extractor for the classifier features
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Raw (un-normalized) classifier descriptors for a block
    pub fn raw_block_features(block: &BlockData) -> FeatureMap {
        let mut features = FeatureMap::new();

        // transactions
        features.insert("tx_count".into(), block.transactions.len() as f64);
        features.insert("total_fee".into(), block.total_fees());

        // block structure
        features.insert("block_size".into(), block.size);
        features.insert(
            "timestamp_drift".into(),
            (block.timestamp - block.expected_timestamp).abs(),
        );

        // miner / validators
        features.insert("miner_reputation".into(), block.miner_reputation);
        features.insert(
            "validator_consensus".into(),
            block.validator_votes.len() as f64 / (block.total_validators.max(1) as f64),
        );

        // network
        features.insert("gas_used_ratio".into(), block.gas_used / block.gas_limit.max(1.0));
        features.insert("uncle_count".into(), block.uncles.len() as f64);
        features.insert("difficulty_change".into(), block.difficulty_change);
        features.insert("network_hashrate_change".into(), block.hashrate_change);

        // staking
        features.insert("stake_distribution".into(), block.stake_distribution_gini);
        features.insert("voting_participation".into(), block.voting_participation);

        // history
        features.insert("ai_confidence_prev".into(), block.prev_ai_confidence);
        features.insert(
            "anomaly_score_tx".into(),
            Self::calculate_tx_anomaly_score(block),
        );
        features.insert("memory_pool_size".into(), block.mempool_size);

        features
    }

    /// Normalized classifier descriptors for a block
    pub fn extract_block_features(&self, block: &BlockData) -> FeatureMap {
        Self::normalize_features(&Self::raw_block_features(block))
    }

    /// Normalized classifier input for a block
    pub fn extract_vector(&self, block: &BlockData) -> FeatureVector {
        FeatureVector::from_map(&self.extract_block_features(block))
    }

    /// Share of transactions whose amount is a z-score outlier
    pub fn calculate_tx_anomaly_score(block: &BlockData) -> f64 {
        stats::outlier_fraction(&block.amounts(), TX_OUTLIER_Z)
    }

    /// Scale known features into [0, 1]; unknown names pass through
    pub fn normalize_features(features: &FeatureMap) -> FeatureMap {
        features
            .iter()
            .map(|(name, value)| {
                let scaled = match Self::range_for(name) {
                    Some((min, max)) => stats::min_max_scale(*value, min, max),
                    None => *value,
                };
                (name.clone(), scaled)
            })
            .collect()
    }

    /// Normalization range for a classifier feature
    pub fn range_for(name: &str) -> Option<(f64, f64)> {
        FEATURE_RANGES
            .iter()
            .find(|(n, _, _)| *n == name)
            .map(|(_, min, max)| (*min, *max))
    }
}
