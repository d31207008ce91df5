pub mod journal;
pub mod simulator;
pub mod validation;

use std::sync::Arc;
use tokio::sync::Mutex;

pub use journal::{JournalEntry, ValidationJournal};
pub use simulator::BlockSimulator;
pub use validation::{ModelInfo, ServiceStats, ValidationReport, ValidationService};

/// Validation service shared between request handlers and the simulator
pub type SharedValidationService = Arc<Mutex<ValidationService>>;
