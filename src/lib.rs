// Core modules
pub mod advisor;
pub mod api;
pub mod backtest;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod notify;
pub mod persistence;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub use config::Settings;
pub use engine::{Command, CommandOutcome, Engine, PassReport};
pub use models::*;
