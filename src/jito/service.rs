//! Process-wide facade over the bundle relay components

use solana_sdk::{instruction::Instruction, pubkey::Pubkey, transaction::VersionedTransaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::bundle::{
    BundleSimulator, BundleSubmissionResult, BundleSubmitter, SendBundleOptions, SimulationResult,
};
use super::client::EngineClient;
use super::error::{EngineError, TipError};
use super::status::{BundleStatus, BundleStatusTracker, LandingOutcome};
use super::tip::{TipAccountDirectory, TipInstructionFactory};
use super::tip_floor::{TipFloorOracle, TipPriority};
use crate::config::EngineConfig;

/// One instance per process, shared behind an `Arc`.
///
/// Owns the single tip account directory so every caller sees the same cache.
pub struct BundleService {
    directory: Arc<TipAccountDirectory>,
    oracle: TipFloorOracle,
    tips: TipInstructionFactory,
    submitter: BundleSubmitter,
    simulator: BundleSimulator,
    tracker: BundleStatusTracker,
    landing_timeout: Duration,
    poll_interval: Duration,
}

impl BundleService {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let engine = Arc::new(EngineClient::new(config)?);
        let directory = Arc::new(TipAccountDirectory::new(
            engine.clone(),
            config.tip_accounts_ttl,
        ));

        info!("Bundle relay using block engine {}", engine.bundles_url());

        Ok(Self {
            oracle: TipFloorOracle::new(engine.clone()),
            tips: TipInstructionFactory::new(directory.clone()),
            submitter: BundleSubmitter::new(
                engine.clone(),
                config.explorer_url.clone(),
                config.encoding,
            ),
            simulator: BundleSimulator::new(engine.clone()),
            tracker: BundleStatusTracker::new(engine, config.poll_strategy),
            directory,
            landing_timeout: config.landing_timeout,
            poll_interval: config.poll_interval,
        })
    }

    pub async fn get_tip_accounts(&self) -> Vec<String> {
        self.directory.get_tip_accounts().await
    }

    pub async fn get_recommended_tip(&self, priority: TipPriority) -> u64 {
        self.oracle.get_recommended_tip(priority).await
    }

    pub async fn create_tip_instruction(
        &self,
        payer: &Pubkey,
        tip_lamports: u64,
    ) -> Result<Instruction, TipError> {
        self.tips.create_tip_instruction(payer, tip_lamports).await
    }

    pub async fn send_bundle(
        &self,
        transactions: &[VersionedTransaction],
        options: SendBundleOptions,
    ) -> BundleSubmissionResult {
        self.submitter.send_bundle(transactions, options).await
    }

    pub async fn simulate_bundle(&self, transactions: &[VersionedTransaction]) -> SimulationResult {
        self.simulator.simulate_bundle(transactions).await
    }

    pub async fn get_bundle_status(&self, bundle_id: &str) -> BundleStatus {
        self.tracker.get_bundle_status(bundle_id).await
    }

    /// Wait with the configured timeout and poll interval
    pub async fn wait_for_bundle_landing(&self, bundle_id: &str) -> LandingOutcome {
        self.wait_for_bundle_landing_with(bundle_id, self.landing_timeout, self.poll_interval)
            .await
    }

    pub async fn wait_for_bundle_landing_with(
        &self,
        bundle_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> LandingOutcome {
        self.tracker
            .wait_for_bundle_landing(bundle_id, timeout, poll_interval)
            .await
    }
}
