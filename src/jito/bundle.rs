//! Atomic bundle encoding, submission and simulation

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;
use serde_json::{json, Value};
use solana_sdk::transaction::VersionedTransaction;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::client::{EngineClient, SEND_BUNDLE_TIMEOUT, SIMULATE_BUNDLE_TIMEOUT};
use super::error::{describe_engine_err, BundleError, EngineError, MAX_BUNDLE_TRANSACTIONS};

/// Transport alphabet for serialized transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxEncoding {
    #[default]
    Base58,
    Base64,
}

impl TxEncoding {
    pub fn encode(&self, bytes: &[u8]) -> String {
        match self {
            TxEncoding::Base58 => bs58::encode(bytes).into_string(),
            TxEncoding::Base64 => BASE64.encode(bytes),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxEncoding::Base58 => "base58",
            TxEncoding::Base64 => "base64",
        }
    }
}

impl fmt::Display for TxEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base58" => Ok(TxEncoding::Base58),
            "base64" => Ok(TxEncoding::Base64),
            other => Err(format!("unknown encoding '{}', expected base58|base64", other)),
        }
    }
}

/// A validated, encoded bundle of 1 to 5 signed transactions.
///
/// Order is preserved: the engine executes the transactions as given and
/// lands all of them in one slot or none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    encoded: Vec<String>,
    encoding: TxEncoding,
}

impl Bundle {
    /// Validate and encode signed transactions. Legacy transactions convert
    /// with `VersionedTransaction::from` and keep their wire bytes.
    pub fn encode(
        transactions: &[VersionedTransaction],
        encoding: TxEncoding,
    ) -> Result<Self, BundleError> {
        if transactions.is_empty() {
            return Err(BundleError::Empty);
        }
        if transactions.len() > MAX_BUNDLE_TRANSACTIONS {
            return Err(BundleError::TooManyTransactions(transactions.len()));
        }

        let encoded = transactions
            .iter()
            .enumerate()
            .map(|(index, tx)| {
                bincode::serialize(tx)
                    .map(|bytes| encoding.encode(&bytes))
                    .map_err(|source| BundleError::Serialize { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { encoded, encoding })
    }

    pub fn encoded_transactions(&self) -> &[String] {
        &self.encoded
    }

    pub fn encoding(&self) -> TxEncoding {
        self.encoding
    }

    pub fn len(&self) -> usize {
        self.encoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }
}

/// Per-call submission options
#[derive(Debug, Clone, Copy, Default)]
pub struct SendBundleOptions {
    /// Overrides the submitter's configured encoding
    pub encoding: Option<TxEncoding>,
}

/// Bundle submission result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleSubmissionResult {
    pub success: bool,
    pub bundle_id: Option<String>,
    pub error: Option<String>,
    pub explorer_url: Option<String>,
}

impl BundleSubmissionResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            bundle_id: None,
            error: Some(error.into()),
            explorer_url: None,
        }
    }
}

/// Dry-run result; `logs` is the main diagnostic payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationResult {
    pub success: bool,
    pub error: Option<String>,
    pub logs: Vec<String>,
}

impl SimulationResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            logs: Vec::new(),
        }
    }
}

const GENERIC_SUBMISSION_FAILURE: &str = "Bundle submission failed";

/// Submits bundles to the Block Engine. One attempt per call, no retries.
pub struct BundleSubmitter {
    engine: Arc<EngineClient>,
    explorer_url: String,
    encoding: TxEncoding,
}

impl BundleSubmitter {
    pub fn new(engine: Arc<EngineClient>, explorer_url: String, encoding: TxEncoding) -> Self {
        Self {
            engine,
            explorer_url,
            encoding,
        }
    }

    /// Submit signed transactions as one atomic bundle.
    ///
    /// Invalid input (0 or more than 5 transactions) fails without touching
    /// the network. Transport and protocol failures come back in the same
    /// result shape.
    pub async fn send_bundle(
        &self,
        transactions: &[VersionedTransaction],
        options: SendBundleOptions,
    ) -> BundleSubmissionResult {
        let encoding = options.encoding.unwrap_or(self.encoding);
        let bundle = match Bundle::encode(transactions, encoding) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("Rejected bundle: {}", e);
                return BundleSubmissionResult::failed(e.to_string());
            }
        };

        info!("Sending bundle with {} transactions", bundle.len());

        match self.submit(&bundle).await {
            Ok(bundle_id) => {
                info!("✅ Bundle submitted: {}", bundle_id);
                BundleSubmissionResult {
                    success: true,
                    explorer_url: Some(self.explorer_link(&bundle_id)),
                    bundle_id: Some(bundle_id),
                    error: None,
                }
            }
            Err(EngineError::Rpc { code, message }) => {
                error!(code, "Bundle error: {}", message);
                if message.is_empty() {
                    BundleSubmissionResult::failed(GENERIC_SUBMISSION_FAILURE)
                } else {
                    BundleSubmissionResult::failed(message)
                }
            }
            Err(e) => {
                error!("Send bundle error: {}", e);
                BundleSubmissionResult::failed(e.to_string())
            }
        }
    }

    async fn submit(&self, bundle: &Bundle) -> Result<String, EngineError> {
        let params = match bundle.encoding() {
            TxEncoding::Base58 => json!([bundle.encoded_transactions()]),
            encoding => json!([
                bundle.encoded_transactions(),
                { "encoding": encoding.as_str() }
            ]),
        };

        let bundle_id: Option<String> = self
            .engine
            .call("sendBundle", params, SEND_BUNDLE_TIMEOUT)
            .await?;

        bundle_id.ok_or_else(|| EngineError::Rpc {
            code: 0,
            message: GENERIC_SUBMISSION_FAILURE.to_string(),
        })
    }

    fn explorer_link(&self, bundle_id: &str) -> String {
        format!("{}/{}", self.explorer_url.trim_end_matches('/'), bundle_id)
    }
}

/// Dry-runs bundles against the Block Engine without committing anything
pub struct BundleSimulator {
    engine: Arc<EngineClient>,
}

impl BundleSimulator {
    pub fn new(engine: Arc<EngineClient>) -> Self {
        Self { engine }
    }

    /// Simulate signed transactions as one bundle.
    ///
    /// A successful call whose result carries `value.err` is a simulated
    /// failure and returns the execution logs alongside the error.
    pub async fn simulate_bundle(&self, transactions: &[VersionedTransaction]) -> SimulationResult {
        let bundle = match Bundle::encode(transactions, TxEncoding::Base58) {
            Ok(bundle) => bundle,
            Err(e) => return SimulationResult::failed(e.to_string()),
        };

        debug!("Simulating bundle with {} transactions", bundle.len());

        let params = json!([{ "encodedTransactions": bundle.encoded_transactions() }]);
        let result: Result<Option<Value>, EngineError> = self
            .engine
            .call("simulateBundle", params, SIMULATE_BUNDLE_TIMEOUT)
            .await;

        match result {
            Ok(result) => {
                let outcome = interpret_simulation(result.as_ref());
                if let Some(err) = &outcome.error {
                    warn!("Bundle simulation failed: {} ({} log lines)", err, outcome.logs.len());
                }
                outcome
            }
            Err(e) => {
                warn!("Simulate bundle error: {}", e);
                SimulationResult::failed(e.to_string())
            }
        }
    }
}

fn interpret_simulation(result: Option<&Value>) -> SimulationResult {
    let value = result.and_then(|r| r.get("value"));
    let logs = value.map(collect_logs).unwrap_or_default();

    match value.and_then(|v| v.get("err")).filter(|err| !err.is_null()) {
        Some(err) => SimulationResult {
            success: false,
            error: Some(describe_engine_err(err)),
            logs,
        },
        None => SimulationResult {
            success: true,
            error: None,
            logs,
        },
    }
}

/// `value.logs`, or per-transaction logs concatenated in bundle order
fn collect_logs(value: &Value) -> Vec<String> {
    fn strings(lines: &[Value]) -> impl Iterator<Item = String> + '_ {
        lines.iter().filter_map(|line| line.as_str().map(str::to_string))
    }

    if let Some(logs) = value.get("logs").and_then(Value::as_array) {
        return strings(logs).collect();
    }

    value
        .get("transactionResults")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|tx| tx.get("logs").and_then(Value::as_array))
                .flat_map(|logs| strings(logs))
                .collect()
        })
        .unwrap_or_default()
}
