//! Abstract ledger interface and its RPC implementation.
//!
//! The monitor and executor only ever talk to `ChainClient`, so tests can
//! substitute an in-memory ledger and the whole pipeline stays exercisable
//! without a validator. The concrete implementation wraps the nonblocking
//! RPC client; every error is classified into `ChainError` at this
//! boundary so callers never see raw client errors.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{
    RpcAccountInfoConfig, RpcProgramAccountsConfig, RpcSendTransactionConfig,
};
use solana_client::rpc_filter::RpcFilterType;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

use crate::error::ChainError;

/// Where a submitted signature currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureState {
    /// Not yet visible at the configured commitment.
    Pending,
    /// Landed and satisfied the commitment.
    Confirmed,
    /// Landed but the transaction itself failed.
    Failed(ChainError),
}

/// The slice of ledger functionality the keeper consumes.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The ledger's monotonic progress counter.
    async fn current_slot(&self) -> Result<u64, ChainError>;

    /// Native balance of an address, in lamports.
    async fn balance(&self, address: &Pubkey) -> Result<u64, ChainError>;

    /// Raw account bytes, or `None` when the account does not exist.
    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ChainError>;

    /// All accounts owned by `program_id` whose data is exactly `data_len`
    /// bytes. The size filter is deliberately loose; callers decode and
    /// skip mismatches.
    async fn program_accounts(
        &self,
        program_id: &Pubkey,
        data_len: usize,
    ) -> Result<Vec<(Pubkey, Vec<u8>)>, ChainError>;

    /// A fresh short-lived validity anchor for transaction submission.
    async fn latest_blockhash(&self) -> Result<Hash, ChainError>;

    /// Submit a signed transaction. The node retries forwarding up to
    /// `max_retries` times; confirmation is polled separately.
    async fn submit_transaction(
        &self,
        transaction: &Transaction,
        max_retries: u32,
    ) -> Result<Signature, ChainError>;

    /// Current state of a submitted signature.
    async fn signature_state(&self, signature: &Signature) -> Result<SignatureState, ChainError>;
}

/// `ChainClient` backed by a JSON-RPC node.
pub struct RpcChainClient {
    rpc: RpcClient,
    commitment: CommitmentConfig,
}

impl RpcChainClient {
    pub fn new(rpc_url: &str, commitment: CommitmentConfig) -> Self {
        Self {
            rpc: RpcClient::new_with_commitment(rpc_url.to_string(), commitment),
            commitment,
        }
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn current_slot(&self) -> Result<u64, ChainError> {
        self.rpc
            .get_slot()
            .await
            .map_err(ChainError::from_client_error)
    }

    async fn balance(&self, address: &Pubkey) -> Result<u64, ChainError> {
        self.rpc
            .get_balance(address)
            .await
            .map_err(ChainError::from_client_error)
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ChainError> {
        let response = self
            .rpc
            .get_account_with_commitment(address, self.commitment)
            .await
            .map_err(ChainError::from_client_error)?;
        Ok(response.value.map(|account| account.data))
    }

    async fn program_accounts(
        &self,
        program_id: &Pubkey,
        data_len: usize,
    ) -> Result<Vec<(Pubkey, Vec<u8>)>, ChainError> {
        let config = RpcProgramAccountsConfig {
            filters: Some(vec![RpcFilterType::DataSize(data_len as u64)]),
            account_config: RpcAccountInfoConfig {
                commitment: Some(self.commitment),
                ..RpcAccountInfoConfig::default()
            },
            ..RpcProgramAccountsConfig::default()
        };
        let accounts = self
            .rpc
            .get_program_accounts_with_config(program_id, config)
            .await
            .map_err(ChainError::from_client_error)?;
        Ok(accounts
            .into_iter()
            .map(|(address, account)| (address, account.data))
            .collect())
    }

    async fn latest_blockhash(&self) -> Result<Hash, ChainError> {
        self.rpc
            .get_latest_blockhash()
            .await
            .map_err(ChainError::from_client_error)
    }

    async fn submit_transaction(
        &self,
        transaction: &Transaction,
        max_retries: u32,
    ) -> Result<Signature, ChainError> {
        let config = RpcSendTransactionConfig {
            preflight_commitment: Some(self.commitment.commitment),
            max_retries: Some(max_retries as usize),
            ..RpcSendTransactionConfig::default()
        };
        self.rpc
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(ChainError::from_client_error)
    }

    async fn signature_state(&self, signature: &Signature) -> Result<SignatureState, ChainError> {
        let response = self
            .rpc
            .get_signature_statuses(&[*signature])
            .await
            .map_err(ChainError::from_client_error)?;

        let status = match response.value.into_iter().next().flatten() {
            Some(status) => status,
            None => return Ok(SignatureState::Pending),
        };

        if let Some(err) = status.err.as_ref() {
            return Ok(SignatureState::Failed(ChainError::from_transaction_error(
                err,
            )));
        }
        if status.satisfies_commitment(self.commitment) {
            Ok(SignatureState::Confirmed)
        } else {
            Ok(SignatureState::Pending)
        }
    }
}
