//! Jito Block Engine client (JSON-RPC transport and tip floor endpoint)

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::error::EngineError;
use super::tip_floor::TipFloorSnapshot;
use crate::config::EngineConfig;

/// Per-method timeouts imposed by the Block Engine protocol
pub const TIP_ACCOUNTS_TIMEOUT: Duration = Duration::from_secs(10);
pub const SEND_BUNDLE_TIMEOUT: Duration = Duration::from_secs(30);
pub const SIMULATE_BUNDLE_TIMEOUT: Duration = Duration::from_secs(30);
pub const BUNDLE_STATUS_TIMEOUT: Duration = Duration::from_secs(10);
pub const TIP_FLOOR_TIMEOUT: Duration = Duration::from_secs(5);

const AUTH_HEADER: &str = "x-jito-auth";

/// Jito Block Engine client
pub struct EngineClient {
    /// Shared HTTP client
    http_client: Client,
    /// JSON-RPC endpoint (`{engine}/api/v1/bundles`)
    bundles_url: String,
    /// Tip floor statistics endpoint
    tip_floor_url: String,
    /// Optional searcher UUID
    auth_uuid: Option<String>,
}

impl EngineClient {
    /// Create a new Block Engine client
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let http_client = Client::builder().timeout(SEND_BUNDLE_TIMEOUT).build()?;

        Ok(Self {
            http_client,
            bundles_url: config.bundles_url(),
            tip_floor_url: config.tip_floor_url.clone(),
            auth_uuid: config.auth_uuid.clone(),
        })
    }

    pub fn bundles_url(&self) -> &str {
        &self.bundles_url
    }

    /// Issue one JSON-RPC call against the bundles endpoint.
    ///
    /// Returns `Ok(None)` when the engine answered without a `result`.
    /// A JSON-RPC `error` object is always reported as [`EngineError::Rpc`],
    /// whatever the HTTP status.
    pub async fn call<P, R>(
        &self,
        method: &str,
        params: P,
        timeout: Duration,
    ) -> Result<Option<R>, EngineError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        debug!(method, url = %self.bundles_url, "Block engine request");

        let mut builder = self
            .http_client
            .post(&self.bundles_url)
            .json(&request)
            .timeout(timeout);
        if let Some(uuid) = &self.auth_uuid {
            builder = builder.header(AUTH_HEADER, uuid);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<JsonRpcResponse<R>>(&body) {
            Ok(JsonRpcResponse { error: Some(error), .. }) => {
                warn!(method, code = error.code, "Block engine error: {}", error.message);
                Err(EngineError::Rpc {
                    code: error.code,
                    message: error.message,
                })
            }
            _ if !status.is_success() => Err(EngineError::Http {
                status: status.as_u16(),
                body,
            }),
            Ok(envelope) => Ok(envelope.result),
            Err(e) => Err(EngineError::Decode(format!("{}: {}", method, e))),
        }
    }

    /// Fetch recently landed tip percentiles
    pub async fn get_tip_floor(&self) -> Result<Vec<TipFloorSnapshot>, EngineError> {
        let response = self
            .http_client
            .get(&self.tip_floor_url)
            .timeout(TIP_FLOOR_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(EngineError::Http {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| EngineError::Decode(format!("tip_floor: {}", e)))
    }
}

// JSON-RPC envelope types

#[derive(Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct JsonRpcResponse<R> {
    result: Option<R>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Deserialize, Debug)]
struct JsonRpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}
