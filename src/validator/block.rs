//! Block input types
//!
//! Wire shape of the blocks submitted for validation. Every field is optional;
//! missing fields fall back to neutral defaults so partially populated blocks
//! from node clients can still be scored.

use serde::{Deserialize, Serialize};

/// A block submitted for scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockData {
    pub height: u64,
    pub hash: String,
    /// Unix seconds
    pub timestamp: f64,
    /// Timestamp the consensus schedule expected for this height
    pub expected_timestamp: f64,
    /// Declared transaction count (informational; features count `transactions`)
    pub tx_count: u64,
    pub miner: String,
    /// Block size in bytes
    pub size: f64,
    pub gas_used: f64,
    pub gas_limit: f64,
    pub difficulty: f64,
    pub total_difficulty: f64,
    pub difficulty_change: f64,
    pub hashrate_change: f64,
    pub uncles: Vec<serde_json::Value>,
    pub uncle_count: u64,
    pub is_orphan: bool,
    pub total_stake: f64,
    pub miner_reputation: f64,
    pub stake_distribution_gini: f64,
    pub voting_participation: f64,
    pub prev_ai_confidence: f64,
    pub mempool_size: f64,
    pub total_validators: u64,
    pub validator_votes: Vec<ValidatorVote>,
    pub transactions: Vec<TransactionData>,
}

/// A transaction inside a block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionData {
    pub hash: String,
    pub amount: f64,
    pub fee: f64,
}

/// A validator's vote on a block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorVote {
    pub validator: String,
    pub vote: String,
}

impl ValidatorVote {
    pub fn is_approval(&self) -> bool {
        self.vote == "approve"
    }
}

impl Default for BlockData {
    fn default() -> Self {
        Self {
            height: 0,
            hash: String::new(),
            timestamp: 0.0,
            expected_timestamp: 0.0,
            tx_count: 0,
            miner: String::new(),
            size: 0.0,
            gas_used: 0.0,
            gas_limit: 0.0,
            difficulty: 0.0,
            total_difficulty: 0.0,
            difficulty_change: 0.0,
            hashrate_change: 0.0,
            uncles: Vec::new(),
            uncle_count: 0,
            is_orphan: false,
            total_stake: 0.0,
            // reputation-like ratios default to neutral
            miner_reputation: 0.5,
            stake_distribution_gini: 0.5,
            voting_participation: 0.0,
            prev_ai_confidence: 0.5,
            mempool_size: 0.0,
            total_validators: 0,
            validator_votes: Vec::new(),
            transactions: Vec::new(),
        }
    }
}

impl BlockData {
    /// Sum of transaction fees
    pub fn total_fees(&self) -> f64 {
        self.transactions.iter().map(|tx| tx.fee).sum()
    }

    /// Transaction amounts in block order
    pub fn amounts(&self) -> Vec<f64> {
        self.transactions.iter().map(|tx| tx.amount).collect()
    }

    /// Number of votes marked as approval
    pub fn approvals(&self) -> usize {
        self.validator_votes.iter().filter(|v| v.is_approval()).count()
    }
}
