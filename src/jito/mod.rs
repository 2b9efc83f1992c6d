//! Jito bundle submission module

pub mod bundle;
pub mod client;
pub mod error;
pub mod service;
pub mod status;
pub mod tip;
pub mod tip_floor;

pub use bundle::*;
pub use client::*;
pub use error::*;
pub use service::*;
pub use status::*;
pub use tip::*;
pub use tip_floor::*;

#[cfg(test)]
pub(crate) mod test_support {
    use solana_sdk::{
        hash::Hash,
        pubkey::Pubkey,
        signature::{Keypair, Signer},
        system_instruction,
        transaction::{Transaction, VersionedTransaction},
    };

    use crate::config::EngineConfig;

    /// Config pointing every endpoint at a mock server
    pub fn test_config(server_url: &str) -> EngineConfig {
        EngineConfig {
            block_engine_url: server_url.to_string(),
            tip_floor_url: format!("{}/api/v1/bundles/tip_floor", server_url),
            ..EngineConfig::default()
        }
    }

    /// A distinct signed transfer per call
    pub fn signed_tx(lamports: u64) -> VersionedTransaction {
        let payer = Keypair::new();
        let ix = system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), lamports);
        let tx = Transaction::new_signed_with_payer(
            &[ix],
            Some(&payer.pubkey()),
            &[&payer],
            Hash::default(),
        );
        VersionedTransaction::from(tx)
    }
}
