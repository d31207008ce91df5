pub mod health;
pub mod training;
pub mod validation;

pub use health::{health_check, metrics, stats};
pub use training::generate_training_data;
pub use validation::{model_info, validate_block};
