//! Advanced block features over a rolling history window
//!
//! Derives temporal, network-health, economic and security descriptors for the
//! current block by comparing it to the most recent validated blocks.

use std::collections::HashSet;

use super::block::BlockData;
use super::features::FeatureMap;
use super::stats::{gini, mean, std_dev};

/// Default number of previous blocks kept for comparison
pub const DEFAULT_HISTORY_WINDOW: usize = 100;

/// Default target block time in seconds
pub const DEFAULT_TARGET_BLOCK_TIME: f64 = 6.0;

/// Blocks sampled for block-time statistics
const BLOCK_TIME_SAMPLE: usize = 10;
/// Blocks sampled for the difficulty trend
const DIFFICULTY_SAMPLE: usize = 10;
/// Blocks sampled for the uncle rate
const UNCLE_SAMPLE: usize = 50;
/// Blocks sampled for the orphan rate
const ORPHAN_SAMPLE: usize = 100;
/// Blocks sampled for fee statistics
const FEE_SAMPLE: usize = 20;
/// Blocks sampled for activity and stake trends
const ACTIVITY_SAMPLE: usize = 10;
/// Blocks scanned for re-included transactions
const DOUBLE_SPEND_SAMPLE: usize = 5;

/// Feature engine holding the recent block history (newest first)
#[derive(Debug, Clone)]
pub struct BlockFeatureEngine {
    history: Vec<BlockData>,
    history_window: usize,
    target_block_time: f64,
}

impl BlockFeatureEngine {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_HISTORY_WINDOW, DEFAULT_TARGET_BLOCK_TIME)
    }

    pub fn with_window(history_window: usize, target_block_time: f64) -> Self {
        Self {
            history: Vec::with_capacity(history_window),
            history_window,
            target_block_time,
        }
    }

    /// Descriptors for `current` against the engine's own history
    pub fn compute(&self, current: &BlockData) -> FeatureMap {
        self.compute_advanced_features(current, &self.history)
    }

    /// Descriptors for `current` against an explicit history slice (newest first)
    pub fn compute_advanced_features(&self, current: &BlockData, previous: &[BlockData]) -> FeatureMap {
        let mut features = FeatureMap::new();
        features.extend(basic_block_features(current));
        features.extend(self.temporal_features(current, previous));
        features.extend(network_features(previous));
        features.extend(economic_features(current, previous));
        features.extend(security_features(current, previous));
        features
    }

    /// Record a validated block as the newest history entry
    pub fn push_block(&mut self, block: BlockData) {
        self.history.insert(0, block);
        self.history.truncate(self.history_window);
    }

    pub fn history(&self) -> &[BlockData] {
        &self.history
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_window(&self) -> usize {
        self.history_window
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn temporal_features(&self, current: &BlockData, previous: &[BlockData]) -> FeatureMap {
        let zeros = named(&[
            ("block_time_variance", 0.0),
            ("timestamp_anomaly", 0.0),
            ("mining_rate_change", 0.0),
        ]);
        let Some(latest) = previous.first() else {
            return zeros;
        };

        let sample = &previous[..previous.len().min(BLOCK_TIME_SAMPLE)];
        let block_times: Vec<f64> = sample
            .windows(2)
            .map(|pair| (pair[0].timestamp - pair[1].timestamp).abs())
            .collect();
        if block_times.is_empty() {
            return zeros;
        }

        let current_gap = (current.timestamp - latest.timestamp).abs();
        let avg = mean(&block_times);
        let spread = std_dev(&block_times);
        let denom = avg.max(1.0);

        named(&[
            ("block_time_variance", spread / denom),
            ("timestamp_anomaly", (current_gap - avg).abs() / denom),
            (
                "mining_rate_change",
                (avg - self.target_block_time) / self.target_block_time,
            ),
        ])
    }
}

impl Default for BlockFeatureEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn named(pairs: &[(&str, f64)]) -> FeatureMap {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn head(previous: &[BlockData], n: usize) -> &[BlockData] {
    &previous[..previous.len().min(n)]
}

fn basic_block_features(block: &BlockData) -> FeatureMap {
    named(&[
        ("block_size", block.size),
        ("tx_count", block.transactions.len() as f64),
        ("gas_used", block.gas_used),
        ("gas_limit", block.gas_limit),
        ("difficulty", block.difficulty),
        ("total_difficulty", block.total_difficulty),
    ])
}

fn network_features(previous: &[BlockData]) -> FeatureMap {
    if previous.len() < 2 {
        return named(&[("hashrate_trend", 0.0), ("uncle_rate", 0.0), ("orphan_rate", 0.0)]);
    }

    let difficulties: Vec<f64> = head(previous, DIFFICULTY_SAMPLE)
        .iter()
        .map(|b| b.difficulty)
        .collect();
    let baseline = mean(&difficulties[1..]);
    let hashrate_trend = (difficulties[0] - baseline) / baseline.max(1.0);

    let uncle_counts: Vec<f64> = head(previous, UNCLE_SAMPLE)
        .iter()
        .map(|b| b.uncle_count as f64)
        .collect();

    let orphan_window = head(previous, ORPHAN_SAMPLE);
    let orphans = orphan_window.iter().filter(|b| b.is_orphan).count();

    named(&[
        ("hashrate_trend", hashrate_trend),
        ("uncle_rate", mean(&uncle_counts)),
        ("orphan_rate", orphans as f64 / orphan_window.len() as f64),
    ])
}

fn economic_features(current: &BlockData, previous: &[BlockData]) -> FeatureMap {
    // cold start reports no concentration and has no fee baseline to compare against
    if previous.is_empty() {
        return named(&[
            ("fee_volatility", 0.0),
            ("value_concentration", 0.0),
            ("economic_activity", 0.0),
        ]);
    }

    let mut features = FeatureMap::new();
    features.insert("value_concentration".into(), gini(&current.amounts()));

    let recent_fees: Vec<f64> = head(previous, FEE_SAMPLE).iter().map(|b| b.total_fees()).collect();
    let current_fees = current.total_fees();
    let avg_fee = mean(&recent_fees);
    let fee_spread = std_dev(&recent_fees);

    let fee_anomaly = if avg_fee > 0.0 {
        (current_fees - avg_fee).abs() / avg_fee.max(1.0)
    } else {
        0.0
    };

    let recent_tx_counts: Vec<f64> = head(previous, ACTIVITY_SAMPLE)
        .iter()
        .map(|b| b.transactions.len() as f64)
        .collect();
    let economic_activity = current.transactions.len() as f64 / mean(&recent_tx_counts).max(1.0);

    features.extend(named(&[
        ("fee_volatility", fee_spread / avg_fee.max(1.0)),
        ("fee_anomaly", fee_anomaly),
        ("economic_activity", economic_activity),
    ]));
    features
}

fn security_features(current: &BlockData, previous: &[BlockData]) -> FeatureMap {
    let votes = current.validator_votes.len() as f64;
    let validator_participation = votes / (current.total_validators.max(1) as f64);
    let consensus_quality = current.approvals() as f64 / votes.max(1.0);

    let staking_trend = if previous.is_empty() {
        0.0
    } else {
        let stakes: Vec<f64> = head(previous, ACTIVITY_SAMPLE)
            .iter()
            .map(|b| b.total_stake)
            .collect();
        let avg = mean(&stakes);
        (stakes[0] - avg) / avg.max(1.0)
    };

    named(&[
        ("validator_participation", validator_participation),
        ("consensus_quality", consensus_quality),
        ("staking_trend", staking_trend),
        ("double_spend_risk", double_spend_risk(current, previous)),
    ])
}

/// Share of the current block's transaction hashes already seen in recent blocks, capped at 1.0
fn double_spend_risk(current: &BlockData, previous: &[BlockData]) -> f64 {
    let current_hashes: HashSet<&str> = current
        .transactions
        .iter()
        .map(|tx| tx.hash.as_str())
        .filter(|h| !h.is_empty())
        .collect();
    if current_hashes.is_empty() {
        return 0.0;
    }

    let duplicates = head(previous, DOUBLE_SPEND_SAMPLE)
        .iter()
        .flat_map(|b| b.transactions.iter())
        .filter(|tx| current_hashes.contains(tx.hash.as_str()))
        .count();

    (duplicates as f64 / current_hashes.len() as f64).min(1.0)
}
