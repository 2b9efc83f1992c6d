//! Jito tip account management

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use serde_json::json;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey, system_instruction};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::client::{EngineClient, TIP_ACCOUNTS_TIMEOUT};
use super::error::TipError;

/// Known mainnet tip accounts, served when the live list cannot be fetched.
/// Must stay byte-identical to the live fee routing set.
pub const FALLBACK_TIP_ACCOUNTS: [&str; 8] = [
    "Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY",
    "DttWaMuVvTiduZRnguLF7jNxTgiMBZ1hyAumKUiL2KRL",
    "96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5",
    "3AVi9Tg9Uo68tJfuvoKvqKNWKkC5wPdSSdeBnizKZ6jT",
    "HFqU5x63VTqvQss8hp11i4bVFgvSoNx6QKPMZ6mxJFN",
    "ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49",
    "ADuUkR4vqLUMWXxW9gh6D6L8pMSawimctcNZ5pGwDcEt",
    "DfXygSm4jCyNCybVYYK6DwvWqjKee8pbDmJGcLWNDXjh",
];

/// The fallback list as owned strings
pub fn fallback_tip_accounts() -> Vec<String> {
    FALLBACK_TIP_ACCOUNTS.iter().map(|s| s.to_string()).collect()
}

struct CachedAccounts {
    accounts: Vec<String>,
    fetched_at: Instant,
}

/// Current set of tip accounts, refreshed from the Block Engine on a TTL
pub struct TipAccountDirectory {
    engine: Arc<EngineClient>,
    ttl: Duration,
    cache: RwLock<Option<CachedAccounts>>,
}

impl TipAccountDirectory {
    pub fn new(engine: Arc<EngineClient>, ttl: Duration) -> Self {
        Self {
            engine,
            ttl,
            cache: RwLock::new(None),
        }
    }

    /// Tip accounts, never empty.
    ///
    /// Served from cache while younger than the TTL. A failed refresh yields
    /// [`FALLBACK_TIP_ACCOUNTS`] without marking anything fresh, so the next
    /// call tries the engine again.
    pub async fn get_tip_accounts(&self) -> Vec<String> {
        if let Some(accounts) = self.fresh_cached() {
            return accounts;
        }

        // Concurrent callers may both refresh here; last write wins.
        match self.fetch().await {
            Ok(accounts) => {
                info!("Fetched {} tip accounts", accounts.len());
                *self.cache.write() = Some(CachedAccounts {
                    accounts: accounts.clone(),
                    fetched_at: Instant::now(),
                });
                accounts
            }
            Err(reason) => {
                warn!("Failed to fetch tip accounts, using fallback set: {}", reason);
                fallback_tip_accounts()
            }
        }
    }

    fn fresh_cached(&self) -> Option<Vec<String>> {
        self.cache
            .read()
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.accounts.clone())
    }

    async fn fetch(&self) -> Result<Vec<String>, String> {
        let accounts: Option<Vec<String>> = self
            .engine
            .call("getTipAccounts", json!([]), TIP_ACCOUNTS_TIMEOUT)
            .await
            .map_err(|e| e.to_string())?;

        match accounts {
            Some(accounts) if !accounts.is_empty() => Ok(accounts),
            _ => Err("engine returned no tip accounts".to_string()),
        }
    }
}

/// Builds tip transfers to a randomly rotated tip account
pub struct TipInstructionFactory {
    directory: Arc<TipAccountDirectory>,
}

impl TipInstructionFactory {
    pub fn new(directory: Arc<TipAccountDirectory>) -> Self {
        Self { directory }
    }

    /// System transfer of `tip_lamports` from `payer` to a random tip account
    pub async fn create_tip_instruction(
        &self,
        payer: &Pubkey,
        tip_lamports: u64,
    ) -> Result<Instruction, TipError> {
        let accounts = self.directory.get_tip_accounts().await;
        let tip_account = pick_tip_account(&accounts)?;

        debug!("Tip instruction: {} lamports to {}", tip_lamports, tip_account);

        Ok(system_instruction::transfer(payer, &tip_account, tip_lamports))
    }
}

/// Uniform random pick over a directory snapshot
fn pick_tip_account(accounts: &[String]) -> Result<Pubkey, TipError> {
    let account = accounts
        .choose(&mut rand::thread_rng())
        .map(String::as_str)
        .unwrap_or(FALLBACK_TIP_ACCOUNTS[0]);

    Pubkey::from_str(account).map_err(|e| TipError::InvalidTipAccount {
        account: account.to_string(),
        reason: e.to_string(),
    })
}
