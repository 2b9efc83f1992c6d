//! Jito Bundle Relay
//!
//! Client for getting a set of signed Solana transactions included in one
//! block through the Jito Block Engine: tip calibration, tip account rotation,
//! atomic bundle submission, dry-run simulation and landing confirmation.

pub mod config;
pub mod jito;

pub use config::EngineConfig;
pub use jito::*;
