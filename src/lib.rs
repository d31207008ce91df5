#![allow(clippy::needless_range_loop)]
// src/lib.rs

pub mod api;
pub mod cli;

// Monitoring module
pub mod monitoring;
pub mod service;
pub mod validator;
