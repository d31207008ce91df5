// src/api/mod.rs

pub mod errors;
pub mod handlers;
pub mod server;
pub mod server_config; // Server constants
pub mod types;

pub use server::{AppState, ValidatorServer};
