//! Error types for Block Engine interaction

use serde_json::Value;
use thiserror::Error;

/// Maximum transactions the Block Engine accepts in a single bundle
pub const MAX_BUNDLE_TRANSACTIONS: usize = 5;

/// Failures talking to the Block Engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Network failure, timeout or connection reset
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response without a JSON-RPC error body
    #[error("Block engine returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// JSON-RPC `error` object returned by the engine
    #[error("{message}")]
    Rpc { code: i64, message: String },

    /// Body could not be decoded into the expected shape
    #[error("Malformed block engine response: {0}")]
    Decode(String),
}

/// Local bundle validation and encoding failures
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("No transactions provided")]
    Empty,

    #[error("Bundle can have max 5 transactions")]
    TooManyTransactions(usize),

    #[error("Failed to serialize transaction {index}: {source}")]
    Serialize {
        index: usize,
        #[source]
        source: bincode::Error,
    },
}

/// Tip instruction construction failures
#[derive(Debug, Error)]
pub enum TipError {
    #[error("Invalid tip account '{account}': {reason}")]
    InvalidTipAccount { account: String, reason: String },
}

/// Render an engine-side `err` payload: strings as-is, anything else as JSON
pub(crate) fn describe_engine_err(err: &Value) -> String {
    match err {
        Value::String(message) => message.clone(),
        other => other.to_string(),
    }
}
