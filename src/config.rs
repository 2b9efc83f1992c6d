//! Configuration for the bundle relay client

use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

use crate::jito::{PollStrategy, TxEncoding};

/// Mainnet Block Engine
pub const DEFAULT_BLOCK_ENGINE_URL: &str = "https://mainnet.block-engine.jito.wtf";
/// Landed tip percentiles
pub const DEFAULT_TIP_FLOOR_URL: &str = "https://bundles.jito.wtf/api/v1/bundles/tip_floor";
/// Public bundle explorer
pub const DEFAULT_EXPLORER_URL: &str = "https://explorer.jito.wtf/bundle";

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Block Engine base URL (JSON-RPC lives under `/api/v1/bundles`)
    pub block_engine_url: String,
    /// Tip floor statistics endpoint (plain GET)
    pub tip_floor_url: String,
    /// Explorer prefix used to build links for submitted bundles
    pub explorer_url: String,
    /// Optional searcher UUID sent as `x-jito-auth`
    pub auth_uuid: Option<String>,

    /// How long a fetched tip account list stays fresh
    pub tip_accounts_ttl: Duration,

    /// Default deadline for `wait_for_bundle_landing`
    pub landing_timeout: Duration,
    /// Default delay between two status polls
    pub poll_interval: Duration,
    /// Fixed interval unless explicitly configured otherwise
    pub poll_strategy: PollStrategy,

    /// Transport alphabet for serialized transactions
    pub encoding: TxEncoding,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_engine_url: DEFAULT_BLOCK_ENGINE_URL.to_string(),
            tip_floor_url: DEFAULT_TIP_FLOOR_URL.to_string(),
            explorer_url: DEFAULT_EXPLORER_URL.to_string(),
            auth_uuid: None,
            tip_accounts_ttl: Duration::from_secs(60),
            landing_timeout: Duration::from_millis(60_000),
            poll_interval: Duration::from_millis(2_000),
            poll_strategy: PollStrategy::Fixed,
            encoding: TxEncoding::Base58,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables (and `.env` if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup, falling back to
    /// production defaults for unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let poll_interval = Duration::from_millis(parse_or(
            &lookup,
            "BUNDLE_POLL_INTERVAL_MS",
            defaults.poll_interval.as_millis() as u64,
        )?);

        let poll_strategy = match lookup("BUNDLE_POLL_BACKOFF")
            .as_deref()
            .map(str::trim)
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            None | Some("") | Some("fixed") => PollStrategy::Fixed,
            Some("exponential") => PollStrategy::Exponential {
                multiplier: backoff_multiplier(&lookup)?,
                max_interval: Duration::from_millis(parse_or(
                    &lookup,
                    "BUNDLE_POLL_MAX_INTERVAL_MS",
                    10_000,
                )?),
            },
            Some(other) => anyhow::bail!(
                "Invalid BUNDLE_POLL_BACKOFF '{}'. Expected 'fixed' or 'exponential'.",
                other
            ),
        };

        let encoding = match lookup("BUNDLE_ENCODING") {
            Some(value) => value
                .parse::<TxEncoding>()
                .map_err(anyhow::Error::msg)
                .context("Invalid BUNDLE_ENCODING")?,
            None => defaults.encoding,
        };

        Ok(Self {
            block_engine_url: lookup("JITO_BLOCK_ENGINE_URL")
                .unwrap_or(defaults.block_engine_url),
            tip_floor_url: lookup("JITO_TIP_FLOOR_URL").unwrap_or(defaults.tip_floor_url),
            explorer_url: lookup("JITO_EXPLORER_URL").unwrap_or(defaults.explorer_url),
            auth_uuid: lookup("JITO_AUTH_UUID").filter(|uuid| !uuid.trim().is_empty()),
            tip_accounts_ttl: Duration::from_millis(parse_or(
                &lookup,
                "TIP_ACCOUNTS_TTL_MS",
                defaults.tip_accounts_ttl.as_millis() as u64,
            )?),
            landing_timeout: Duration::from_millis(parse_or(
                &lookup,
                "BUNDLE_LANDING_TIMEOUT_MS",
                defaults.landing_timeout.as_millis() as u64,
            )?),
            poll_interval,
            poll_strategy,
            encoding,
        })
    }

    /// JSON-RPC endpoint for bundle methods
    pub fn bundles_url(&self) -> String {
        format!("{}/api/v1/bundles", self.block_engine_url.trim_end_matches('/'))
    }
}

/// Growth factor between polls; below 1.0 the delays would shrink toward zero
fn backoff_multiplier<F>(lookup: &F) -> Result<f64>
where
    F: Fn(&str) -> Option<String>,
{
    let multiplier: f64 = parse_or(lookup, "BUNDLE_POLL_BACKOFF_MULTIPLIER", 1.5)?;
    if !multiplier.is_finite() || multiplier < 1.0 {
        anyhow::bail!(
            "Invalid BUNDLE_POLL_BACKOFF_MULTIPLIER '{}'. Expected a finite number >= 1.0.",
            multiplier
        );
    }
    Ok(multiplier)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: '{}'", key, raw)),
        None => Ok(default),
    }
}
