//! Configuration management.
//!
//! Everything is read from the environment (optionally seeded from a .env
//! file) once at startup and immutable afterwards. The only fatal
//! configuration problem is a missing signing credential; every other
//! knob has the defaults the hosted deployment runs with.

use crate::fees::SubmissionCosts;
use crate::retry::RetryPolicy;
use anyhow::{anyhow, Context, Result};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;

/// Public RPC endpoint used when none is configured.
const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";

/// Deployed settlement program.
const DEFAULT_PROGRAM_ID: &str = "EzHNPN4VCbZZzBTk8S24vbzhtxFkMHEvSNmJCD8GqEcy";

#[derive(Clone)]
pub struct KeeperConfig {
    // Network
    pub rpc_url: String,
    pub program_id: Pubkey,

    // Signing credential: JSON byte array or keypair file path. Ignored
    // when a delegated signer endpoint is configured.
    pub keeper_credential: String,
    pub signer_endpoint: Option<String>,
    pub signer_address: Option<Pubkey>,

    // Economics
    pub priority_fee_microlamports: u64,
    pub base_fee_lamports: u64,
    pub min_profit_lamports: u64,
    pub compute_unit_limit: u32,

    // Loop pacing
    pub poll_interval_ms: u64,
    pub max_submit_retries: u32,
}

impl KeeperConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn submission_costs(&self) -> SubmissionCosts {
        SubmissionCosts {
            base_fee_lamports: self.base_fee_lamports,
            priority_fee_microlamports: self.priority_fee_microlamports,
            compute_unit_limit: self.compute_unit_limit,
            min_profit_lamports: self.min_profit_lamports,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_submit_retries,
            ..RetryPolicy::default()
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8899".to_string(),
            program_id: Pubkey::new_from_array([11u8; 32]),
            keeper_credential: String::new(),
            signer_endpoint: None,
            signer_address: None,
            priority_fee_microlamports: 0,
            base_fee_lamports: 5_000,
            min_profit_lamports: 1_000,
            compute_unit_limit: 300_000,
            poll_interval_ms: 50,
            max_submit_retries: 3,
        }
    }
}

/// Load configuration from the process environment, seeding it from the
/// default `.env` file when present.
pub fn load_config() -> Result<KeeperConfig> {
    dotenv::dotenv().ok();
    read_env()
}

/// Load configuration seeded from a specific env file (e.g. `.env.devnet`).
pub fn load_config_from_file(env_file: &str) -> Result<KeeperConfig> {
    dotenv::from_filename(env_file)
        .with_context(|| format!("failed to load env file {env_file}"))?;
    read_env()
}

fn read_env() -> Result<KeeperConfig> {
    let program_id_raw =
        std::env::var("PROGRAM_ID").unwrap_or_else(|_| DEFAULT_PROGRAM_ID.to_string());
    let program_id = Pubkey::from_str(program_id_raw.trim())
        .map_err(|e| anyhow!("invalid PROGRAM_ID '{program_id_raw}': {e}"))?;

    let signer_endpoint = std::env::var("SIGNER_ENDPOINT").ok();
    let signer_address = match (&signer_endpoint, std::env::var("SIGNER_ADDRESS").ok()) {
        (Some(_), Some(raw)) => Some(
            Pubkey::from_str(raw.trim())
                .map_err(|e| anyhow!("invalid SIGNER_ADDRESS '{raw}': {e}"))?,
        ),
        (Some(_), None) => {
            return Err(anyhow!(
                "SIGNER_ENDPOINT is set but SIGNER_ADDRESS is missing"
            ))
        }
        (None, _) => None,
    };

    // A keeper that cannot sign must not start: the local credential is
    // required unless signing is delegated.
    let keeper_credential = match std::env::var("KEEPER_PRIVATE_KEY") {
        Ok(raw) => raw,
        Err(_) if signer_endpoint.is_some() => String::new(),
        Err(_) => {
            return Err(anyhow!(
                "KEEPER_PRIVATE_KEY not set (JSON byte array or keypair file path)"
            ))
        }
    };

    Ok(KeeperConfig {
        rpc_url: std::env::var("RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string()),
        program_id,
        keeper_credential,
        signer_endpoint,
        signer_address,
        priority_fee_microlamports: env_parsed("PRIORITY_FEE_MICROLAMPORTS", 5_000)?,
        base_fee_lamports: env_parsed("BASE_FEE_LAMPORTS", 5_000)?,
        min_profit_lamports: env_parsed("MIN_PROFIT_LAMPORTS", 1_000)?,
        compute_unit_limit: env_parsed("COMPUTE_UNIT_LIMIT", 300_000)?,
        poll_interval_ms: env_parsed("POLL_INTERVAL_MS", 1_000)?,
        max_submit_retries: env_parsed("MAX_SUBMIT_RETRIES", 3)?,
    })
}

fn env_parsed<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("invalid {key} '{raw}': {e}")),
        Err(_) => Ok(default),
    }
}
