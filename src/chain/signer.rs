//! Signing capability.
//!
//! A settlement transaction needs exactly one signature: the keeper's, as
//! fee payer. The capability is a small interface with two concrete
//! variants: a local keypair, and delegation to an external signing
//! service that never exposes the key to this process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;
use std::str::FromStr;
use tracing::debug;

use crate::error::ChainError;

/// Capability to sign settlement transactions as a fixed identity.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// The signing identity; also the transaction fee payer.
    fn address(&self) -> Pubkey;

    /// Attach `blockhash` and produce the fee-payer signature in place.
    async fn sign(&self, transaction: &mut Transaction, blockhash: Hash)
        -> Result<(), ChainError>;
}

/// Signs with a keypair held in process memory.
pub struct LocalSigner {
    keypair: Keypair,
}

impl LocalSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Load from the configured credential: either a JSON byte array
    /// (the wallet export format) or a path to a keypair file.
    pub fn from_secret(secret: &str) -> anyhow::Result<Self> {
        let trimmed = secret.trim();
        let keypair = if trimmed.starts_with('[') {
            let bytes: Vec<u8> = serde_json::from_str(trimmed)
                .map_err(|e| anyhow::anyhow!("keeper credential is not a JSON byte array: {e}"))?;
            Keypair::from_bytes(&bytes)
                .map_err(|e| anyhow::anyhow!("keeper credential bytes are not a keypair: {e}"))?
        } else {
            read_keypair_file(trimmed)
                .map_err(|e| anyhow::anyhow!("failed to read keypair file {trimmed}: {e}"))?
        };
        Ok(Self::new(keypair))
    }
}

#[async_trait]
impl TransactionSigner for LocalSigner {
    fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign(
        &self,
        transaction: &mut Transaction,
        blockhash: Hash,
    ) -> Result<(), ChainError> {
        transaction
            .try_sign(&[&self.keypair], blockhash)
            .map_err(|e| ChainError::Unclassified(format!("local signing failed: {e}")))
    }
}

#[derive(Serialize)]
struct SignRequest {
    signer: String,
    /// Hex-encoded message bytes to sign.
    message: String,
}

#[derive(Deserialize)]
struct SignResponse {
    /// Base58 signature over the message bytes.
    signature: String,
}

/// Delegates signing to an external HTTP service holding the key.
pub struct RemoteSigner {
    address: Pubkey,
    endpoint: String,
    http: reqwest::Client,
}

impl RemoteSigner {
    pub fn new(endpoint: &str, address: Pubkey) -> Self {
        Self {
            address,
            endpoint: endpoint.to_string(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TransactionSigner for RemoteSigner {
    fn address(&self) -> Pubkey {
        self.address
    }

    async fn sign(
        &self,
        transaction: &mut Transaction,
        blockhash: Hash,
    ) -> Result<(), ChainError> {
        transaction.message.recent_blockhash = blockhash;
        let request = SignRequest {
            signer: self.address.to_string(),
            message: hex::encode(transaction.message_data()),
        };

        debug!("requesting signature from delegated signer");
        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::Transient(format!("signing service unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(ChainError::Unclassified(format!(
                "signing service rejected request: HTTP {}",
                response.status()
            )));
        }

        let body: SignResponse = response
            .json()
            .await
            .map_err(|e| ChainError::Unclassified(format!("malformed signing response: {e}")))?;
        let signature = Signature::from_str(&body.signature)
            .map_err(|e| ChainError::Unclassified(format!("malformed signature returned: {e}")))?;

        // Fee payer signature is always slot zero in the signature list.
        if transaction.signatures.is_empty() {
            transaction.signatures.push(signature);
        } else {
            transaction.signatures[0] = signature;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::message::Message;
    use solana_sdk::system_instruction;

    #[tokio::test]
    async fn local_signer_signs_as_fee_payer() {
        let signer = LocalSigner::new(Keypair::new());
        let payer = signer.address();
        let ix = system_instruction::transfer(&payer, &Pubkey::new_unique(), 1);
        let mut tx = Transaction::new_unsigned(Message::new(&[ix], Some(&payer)));

        let blockhash = Hash::new_unique();
        signer.sign(&mut tx, blockhash).await.unwrap();
        assert_eq!(tx.message.recent_blockhash, blockhash);
        assert!(tx.is_signed());
    }

    #[test]
    fn from_secret_parses_json_byte_array() {
        let keypair = Keypair::new();
        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();
        let signer = LocalSigner::from_secret(&json).unwrap();
        assert_eq!(signer.address(), keypair.pubkey());
    }

    #[test]
    fn from_secret_rejects_garbage() {
        assert!(LocalSigner::from_secret("[1,2,3]").is_err());
    }
}
