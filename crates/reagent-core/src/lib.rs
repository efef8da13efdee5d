//! Shared building blocks for Reagent: message types, configuration and the
//! JSONL session log.

pub mod config;
pub mod session;
pub mod types;
pub mod utils;
