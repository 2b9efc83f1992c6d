//! Jito Bundle Relay CLI
//!
//! Operator tool over the bundle relay library: inspect tip accounts and tip
//! floors, submit or simulate pre-signed bundles, and follow them to landing.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::{Parser, Subcommand};
use solana_sdk::transaction::VersionedTransaction;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jito_bundle_relay::{BundleService, EngineConfig, LandingOutcome, SendBundleOptions, TipPriority};

#[derive(Parser)]
#[command(name = "jito-bundle-relay", version, about = "Atomic bundle submission via the Jito Block Engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the current tip account set
    TipAccounts,
    /// Print the recommended tip for a priority tier
    Tip {
        #[arg(long, default_value_t = TipPriority::Medium)]
        priority: TipPriority,
    },
    /// Submit signed, serialized transactions as one bundle
    Send {
        /// Serialized signed transactions, in execution order
        #[arg(required = true)]
        transactions: Vec<String>,
        /// Inputs are base64 instead of base58
        #[arg(long)]
        base64: bool,
        /// Wait for the bundle to land after submission
        #[arg(long)]
        wait: bool,
    },
    /// Dry-run signed, serialized transactions as one bundle
    Simulate {
        #[arg(required = true)]
        transactions: Vec<String>,
        #[arg(long)]
        base64: bool,
    },
    /// Poll a bundle's status once
    Status { bundle_id: String },
    /// Wait until a bundle lands, fails, or the timeout elapses
    Wait {
        bundle_id: String,
        #[arg(long)]
        timeout_ms: Option<u64>,
        #[arg(long)]
        poll_interval_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = EngineConfig::from_env()?;
    let service = BundleService::new(&config).context("Failed to create block engine client")?;

    match cli.command {
        Command::TipAccounts => {
            for account in service.get_tip_accounts().await {
                println!("{}", account);
            }
        }
        Command::Tip { priority } => {
            let lamports = service.get_recommended_tip(priority).await;
            println!("{}", lamports);
        }
        Command::Send {
            transactions,
            base64,
            wait,
        } => {
            let transactions = decode_transactions(&transactions, base64)?;
            let result = service
                .send_bundle(&transactions, SendBundleOptions::default())
                .await;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if !result.success {
                anyhow::bail!("Bundle submission failed: {}", result.error.unwrap_or_default());
            }
            if let (true, Some(bundle_id)) = (wait, result.bundle_id.as_deref()) {
                report_landing(bundle_id, service.wait_for_bundle_landing(bundle_id).await)?;
            }
        }
        Command::Simulate {
            transactions,
            base64,
        } => {
            let transactions = decode_transactions(&transactions, base64)?;
            let result = service.simulate_bundle(&transactions).await;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if !result.success {
                anyhow::bail!("Simulation failed: {}", result.error.unwrap_or_default());
            }
        }
        Command::Status { bundle_id } => {
            let status = service.get_bundle_status(&bundle_id).await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Wait {
            bundle_id,
            timeout_ms,
            poll_interval_ms,
        } => {
            let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(config.landing_timeout);
            let poll_interval = poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(config.poll_interval);
            let outcome = service
                .wait_for_bundle_landing_with(&bundle_id, timeout, poll_interval)
                .await;
            report_landing(&bundle_id, outcome)?;
        }
    }

    Ok(())
}

/// Decode wire-format transactions passed on the command line
fn decode_transactions(raw: &[String], base64: bool) -> Result<Vec<VersionedTransaction>> {
    raw.iter()
        .enumerate()
        .map(|(index, encoded)| {
            let bytes = if base64 {
                BASE64
                    .decode(encoded.trim())
                    .with_context(|| format!("Transaction {} is not valid base64", index))?
            } else {
                bs58::decode(encoded.trim())
                    .into_vec()
                    .with_context(|| format!("Transaction {} is not valid base58", index))?
            };
            bincode::deserialize(&bytes)
                .with_context(|| format!("Transaction {} is not a serialized transaction", index))
        })
        .collect()
}

fn report_landing(bundle_id: &str, outcome: LandingOutcome) -> Result<()> {
    match outcome {
        LandingOutcome::Landed { slot } => {
            info!("Bundle {} landed", bundle_id);
            match slot {
                Some(slot) => println!("landed in slot {}", slot),
                None => println!("landed"),
            }
            Ok(())
        }
        other => anyhow::bail!(
            "Bundle {} did not land: {}",
            bundle_id,
            other.error().unwrap_or("unknown")
        ),
    }
}

/// Initialize the logging system
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,jito_bundle_relay=debug"));

    let json_logging = std::env::var("LOG_JSON")
        .map(|v| v == "true")
        .unwrap_or(false);

    if json_logging {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true))
            .init();
    }
}
