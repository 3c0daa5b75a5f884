//! Core library for the flip-detector project.
//!
//! ```text
//! Scheduler → upstream::PriceClient → arbitrage → Publisher ──HTTP──▶ broadcast server ──WS──▶ subscribers
//! ```

pub mod arbitrage;
pub mod broadcast;
pub mod cli;
pub mod config;
pub mod errors;
pub mod models;
pub mod publisher;
pub mod scheduler;
pub mod subscriber;
pub mod upstream;
pub mod utils;
