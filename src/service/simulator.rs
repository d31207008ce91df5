//! Background block simulator
//!
//! Generates a random block on a fixed interval and runs it through the
//! shared validation service, keeping the counters and history warm when no
//! node is submitting blocks.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::SharedValidationService;
use crate::validator::{BlockData, TransactionData};

pub struct BlockSimulator {
    service: SharedValidationService,
    interval: Duration,
    next_height: u64,
    rng: StdRng,
}

impl BlockSimulator {
    pub fn new(service: SharedValidationService, interval: Duration) -> Self {
        Self {
            service,
            interval,
            next_height: 1,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic block stream
    pub fn with_seed(service: SharedValidationService, interval: Duration, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new(service, interval)
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Next random block; heights count up from 1
    pub fn generate_block(&mut self) -> BlockData {
        let height = self.next_height;
        self.next_height += 1;

        let tx_total = self.rng.gen_range(5..50);
        let mut seen = HashSet::with_capacity(tx_total);
        let mut transactions = Vec::with_capacity(tx_total);
        while transactions.len() < tx_total {
            let hash = self.random_hash();
            if !seen.insert(hash.clone()) {
                continue;
            }
            transactions.push(TransactionData {
                hash,
                amount: self.rng.gen_range(1..1000) as f64,
                fee: self.rng.gen_range(1..10) as f64,
            });
        }

        BlockData {
            height,
            hash: self.random_hash(),
            timestamp: chrono::Utc::now().timestamp() as f64,
            tx_count: self.rng.gen_range(10..200),
            miner: format!("miner_{}", self.rng.gen_range(1..5)),
            size: self.rng.gen_range(50_000..1_000_000) as f64,
            transactions,
            ..BlockData::default()
        }
    }

    fn random_hash(&mut self) -> String {
        let mut bytes = [0u8; 16];
        self.rng.fill_bytes(&mut bytes);
        format!("0x{}", hex::encode(bytes))
    }

    /// Validate one generated block through the shared service
    pub async fn step(&mut self) {
        let block = self.generate_block();
        let height = block.height;
        let result = self.service.lock().await.validate_block(block);
        match result {
            Ok(report) => debug!(
                "Simulated block #{} scored {:.3} ({})",
                height, report.score, report.decision
            ),
            Err(e) => error!("Simulated block #{} failed validation: {}", height, e),
        }
    }

    /// Run until `shutdown` flips to true or its sender is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting block validation simulator (every {}s)",
            self.interval.as_secs_f64()
        );

        let mut ticker = tokio::time::interval(self.interval);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.step().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Block validation simulator stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ValidationService;
    use crate::validator::{AiValidator, BlockFeatureEngine, DecisionThresholds};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn shared_service() -> SharedValidationService {
        Arc::new(Mutex::new(ValidationService::new(
            AiValidator::new(DecisionThresholds::default()),
            BlockFeatureEngine::new(),
        )))
    }

    #[test]
    fn test_generated_blocks_are_well_formed() {
        let mut simulator = BlockSimulator::with_seed(shared_service(), Duration::from_secs(8), 7);

        for expected_height in 1..=20u64 {
            let block = simulator.generate_block();
            assert_eq!(block.height, expected_height);
            assert!(block.hash.starts_with("0x") && block.hash.len() == 34);
            assert!((10..200).contains(&block.tx_count));
            assert!((5..50).contains(&block.transactions.len()));
            assert!(["miner_1", "miner_2", "miner_3", "miner_4"].contains(&block.miner.as_str()));
            assert!((50_000.0..1_000_000.0).contains(&block.size));

            let hashes: HashSet<&str> = block.transactions.iter().map(|t| t.hash.as_str()).collect();
            assert_eq!(hashes.len(), block.transactions.len());
            assert!(block
                .transactions
                .iter()
                .all(|t| (1.0..1000.0).contains(&t.amount) && (1.0..10.0).contains(&t.fee)));
        }
    }

    #[tokio::test]
    async fn test_step_feeds_service() {
        let service = shared_service();
        let mut simulator = BlockSimulator::with_seed(service.clone(), Duration::from_secs(8), 1);
        simulator.step().await;
        simulator.step().await;

        let stats = service.lock().await.stats();
        assert_eq!(stats.blocks_processed, 2);
        assert_eq!(stats.history_len, 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let service = shared_service();
        let (tx, rx) = watch::channel(false);
        let handle = BlockSimulator::new(service, Duration::from_millis(10)).spawn(rx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("simulator did not stop")
            .unwrap();
    }
}
