//! Settlement transaction assembly and submission.
//!
//! Builds the fixed three-instruction sequence (priority fee directive,
//! compute budget directive, settlement directive), signs it through the
//! signer capability, submits with bounded retries, and awaits
//! confirmation. The settlement directive carries a bare 8-byte type tag:
//! every parameter is implicit in the account list, whose exact order,
//! mutability and signer flags must match what the ledger program expects.
//! Any mismatch rejects the whole transaction atomically.

use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::system_program;
use solana_sdk::transaction::Transaction;
use spl_associated_token_account::get_associated_token_address;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::chain::{ChainClient, SignatureState, TransactionSigner};
use crate::config::KeeperConfig;
use crate::error::ChainError;
use crate::fees::SubmissionCosts;
use crate::pda;
use crate::retry::RetryPolicy;
use crate::types::{KeeperStats, ProtocolConfig, ScheduledTransfer};

/// Type tag of the settlement directive. No further encoded arguments.
pub const SETTLE_TRANSFER_TAG: [u8; 8] = [0x54, 0x97, 0x2a, 0x0e, 0x8c, 0x5d, 0x3a, 0x1f];

/// Type tag of the one-time keeper registration directive.
pub const REGISTER_KEEPER_TAG: [u8; 8] = [175, 126, 140, 213, 21, 174, 234, 239];

/// Confirmation polling cadence and bound. A transaction that has not
/// confirmed within the bound is treated as transient; if it never lands,
/// the record is still unsettled next tick and gets retried naturally.
const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(500);
const CONFIRM_POLL_LIMIT: u32 = 60;

/// Assembles, signs and submits settlement transactions.
pub struct SettlementExecutor<C: ChainClient> {
    client: Arc<C>,
    signer: Arc<dyn TransactionSigner>,
    program_id: Pubkey,
    costs: SubmissionCosts,
    retry: RetryPolicy,
}

impl<C: ChainClient> SettlementExecutor<C> {
    pub fn new(client: Arc<C>, signer: Arc<dyn TransactionSigner>, config: &KeeperConfig) -> Self {
        Self {
            client,
            signer,
            program_id: config.program_id,
            costs: config.submission_costs(),
            retry: config.retry_policy(),
        }
    }

    /// The keeper identity this executor submits as.
    pub fn keeper(&self) -> Pubkey {
        self.signer.address()
    }

    /// Settle one matured transfer. Returns the transaction signature on
    /// success; failures come back classified (`RaceLoss` when a competing
    /// keeper won, `Premature`, `Transient`, or `Unclassified`).
    pub async fn settle(
        &self,
        record_address: &Pubkey,
        transfer: &ScheduledTransfer,
        protocol: &ProtocolConfig,
    ) -> Result<Signature, ChainError> {
        let instructions = self.settlement_instructions(record_address, transfer, protocol);

        let mut transaction =
            Transaction::new_with_payer(&instructions, Some(&self.signer.address()));
        let blockhash = self.client.latest_blockhash().await?;
        self.signer.sign(&mut transaction, blockhash).await?;

        let signature = self
            .client
            .submit_transaction(&transaction, self.retry.max_attempts)
            .await?;
        debug!(%signature, "settlement submitted, awaiting confirmation");

        self.await_confirmation(&signature).await?;
        Ok(signature)
    }

    /// Build the ordered instruction sequence for one settlement.
    fn settlement_instructions(
        &self,
        record_address: &Pubkey,
        transfer: &ScheduledTransfer,
        protocol: &ProtocolConfig,
    ) -> Vec<Instruction> {
        let keeper = self.signer.address();

        let (config_address, _) = pda::derive_protocol_config(&self.program_id);
        let (payment_address, _) =
            pda::derive_payment(&self.program_id, &transfer.owner, transfer.id);
        let (escrow_address, _) = pda::derive_escrow(&self.program_id, &payment_address);
        let (stats_address, _) = pda::derive_keeper_stats(&self.program_id, &keeper);

        // Discovery and derivation must agree; the ledger would reject the
        // transaction on a mismatch anyway, but catching drift here makes
        // the failure diagnosable.
        if payment_address != *record_address {
            warn!(
                discovered = %record_address,
                derived = %payment_address,
                "derived record address disagrees with discovery"
            );
        }

        let recipient_token = get_associated_token_address(&transfer.recipient, &transfer.asset);
        let keeper_token = get_associated_token_address(&keeper, &transfer.asset);
        let treasury_token = get_associated_token_address(&protocol.treasury, &transfer.asset);

        let settle = Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(config_address, false),
                AccountMeta::new(payment_address, false),
                AccountMeta::new(escrow_address, false),
                AccountMeta::new(keeper, true),
                AccountMeta::new(stats_address, false),
                AccountMeta::new(recipient_token, false),
                AccountMeta::new(keeper_token, false),
                AccountMeta::new(treasury_token, false),
                AccountMeta::new_readonly(spl_token::id(), false),
            ],
            data: SETTLE_TRANSFER_TAG.to_vec(),
        };

        vec![
            ComputeBudgetInstruction::set_compute_unit_price(self.costs.priority_fee_microlamports),
            ComputeBudgetInstruction::set_compute_unit_limit(self.costs.compute_unit_limit),
            settle,
        ]
    }

    /// Poll the signature until it confirms, fails, or the poll budget is
    /// exhausted (transient; the next tick retries if still unsettled).
    async fn await_confirmation(&self, signature: &Signature) -> Result<(), ChainError> {
        for _ in 0..CONFIRM_POLL_LIMIT {
            match self.client.signature_state(signature).await? {
                SignatureState::Confirmed => return Ok(()),
                SignatureState::Failed(err) => return Err(err),
                SignatureState::Pending => tokio::time::sleep(CONFIRM_POLL_INTERVAL).await,
            }
        }
        Err(ChainError::Transient(format!(
            "confirmation of {signature} not reached within poll budget"
        )))
    }

    /// Make sure this keeper's statistics account exists, registering it
    /// when missing. Settlement requires the account; registration is a
    /// one-time transaction paid by the keeper.
    ///
    /// Returns the existing stats when already registered, `None` when a
    /// registration was just submitted.
    pub async fn ensure_registered(&self) -> Result<Option<KeeperStats>, ChainError> {
        let keeper = self.signer.address();
        let (stats_address, _) = pda::derive_keeper_stats(&self.program_id, &keeper);

        if let Some(data) = self.client.account_data(&stats_address).await? {
            let stats = KeeperStats::decode(&data).map_err(|e| {
                ChainError::Unclassified(format!("keeper stats account is malformed: {e}"))
            })?;
            return Ok(Some(stats));
        }

        info!(%keeper, "no keeper registration found, registering");
        let (config_address, _) = pda::derive_protocol_config(&self.program_id);
        let register = Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new_readonly(config_address, false),
                AccountMeta::new(stats_address, false),
                AccountMeta::new(keeper, true),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data: REGISTER_KEEPER_TAG.to_vec(),
        };

        let mut transaction = Transaction::new_with_payer(&[register], Some(&keeper));
        let blockhash = self.client.latest_blockhash().await?;
        self.signer.sign(&mut transaction, blockhash).await?;
        let signature = self
            .client
            .submit_transaction(&transaction, self.retry.max_attempts)
            .await?;
        self.await_confirmation(&signature).await?;
        info!(%signature, "keeper registered");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::LocalSigner;
    use crate::config::KeeperConfig;
    use async_trait::async_trait;
    use solana_sdk::hash::Hash;
    use solana_sdk::signature::Keypair;
    use solana_sdk::signer::Signer as _;

    struct StaticChain;

    #[async_trait]
    impl ChainClient for StaticChain {
        async fn current_slot(&self) -> Result<u64, ChainError> {
            Ok(1_000)
        }
        async fn balance(&self, _address: &Pubkey) -> Result<u64, ChainError> {
            Ok(0)
        }
        async fn account_data(&self, _address: &Pubkey) -> Result<Option<Vec<u8>>, ChainError> {
            Ok(None)
        }
        async fn program_accounts(
            &self,
            _program_id: &Pubkey,
            _data_len: usize,
        ) -> Result<Vec<(Pubkey, Vec<u8>)>, ChainError> {
            Ok(vec![])
        }
        async fn latest_blockhash(&self) -> Result<Hash, ChainError> {
            Ok(Hash::new_unique())
        }
        async fn submit_transaction(
            &self,
            _transaction: &Transaction,
            _max_retries: u32,
        ) -> Result<Signature, ChainError> {
            Ok(Signature::default())
        }
        async fn signature_state(
            &self,
            _signature: &Signature,
        ) -> Result<SignatureState, ChainError> {
            Ok(SignatureState::Confirmed)
        }
    }

    fn executor() -> (SettlementExecutor<StaticChain>, Pubkey) {
        let keypair = Keypair::new();
        let keeper = keypair.pubkey();
        let config = KeeperConfig::for_tests();
        let executor = SettlementExecutor::new(
            Arc::new(StaticChain),
            Arc::new(LocalSigner::new(keypair)),
            &config,
        );
        (executor, keeper)
    }

    fn transfer() -> ScheduledTransfer {
        ScheduledTransfer {
            id: 3,
            owner: Pubkey::new_unique(),
            recipient: Pubkey::new_unique(),
            asset: Pubkey::new_unique(),
            escrow: Pubkey::new_unique(),
            amount: 100_000_000,
            fee_amount: 500_000,
            execute_at_slot: 999,
            created_at_slot: 1,
            executed: false,
            cancelled: false,
            executor: Pubkey::default(),
            executed_at_slot: 0,
            nonce: 252,
        }
    }

    fn protocol() -> ProtocolConfig {
        ProtocolConfig {
            authority: Pubkey::new_unique(),
            treasury: Pubkey::new_unique(),
            protocol_fee_bps: 50,
            keeper_fee_bps: 30,
            total_transfers_created: 0,
            total_transfers_executed: 0,
            total_fees_collected: 0,
            paused: false,
            nonce: 255,
        }
    }

    #[test]
    fn settlement_instruction_sequence_and_account_order() {
        let (executor, keeper) = executor();
        let t = transfer();
        let p = protocol();
        let (record_address, _) = pda::derive_payment(&executor.program_id, &t.owner, t.id);

        let ixs = executor.settlement_instructions(&record_address, &t, &p);
        assert_eq!(ixs.len(), 3);

        // Directives first, settlement last.
        assert_eq!(ixs[0].program_id, solana_sdk::compute_budget::id());
        assert_eq!(ixs[1].program_id, solana_sdk::compute_budget::id());

        let settle = &ixs[2];
        assert_eq!(settle.program_id, executor.program_id);
        assert_eq!(settle.data, SETTLE_TRANSFER_TAG.to_vec());
        assert_eq!(settle.accounts.len(), 9);

        // The keeper is the only signer, at position 3.
        for (index, meta) in settle.accounts.iter().enumerate() {
            assert_eq!(meta.is_signer, index == 3, "signer flag at {index}");
        }
        assert_eq!(settle.accounts[3].pubkey, keeper);

        // Everything writable except the trailing token program.
        for meta in &settle.accounts[..8] {
            assert!(meta.is_writable);
        }
        assert!(!settle.accounts[8].is_writable);
        assert_eq!(settle.accounts[8].pubkey, spl_token::id());

        // Derived dependent addresses in their fixed positions.
        assert_eq!(settle.accounts[1].pubkey, record_address);
        let (escrow, _) = pda::derive_escrow(&executor.program_id, &record_address);
        assert_eq!(settle.accounts[2].pubkey, escrow);
        let (stats, _) = pda::derive_keeper_stats(&executor.program_id, &keeper);
        assert_eq!(settle.accounts[4].pubkey, stats);
    }

    #[tokio::test]
    async fn settle_returns_signature_on_confirmation() {
        let (executor, _) = executor();
        let t = transfer();
        let (record_address, _) = pda::derive_payment(&executor.program_id, &t.owner, t.id);
        let signature = executor
            .settle(&record_address, &t, &protocol())
            .await
            .unwrap();
        assert_eq!(signature, Signature::default());
    }

    #[tokio::test]
    async fn ensure_registered_submits_when_stats_missing() {
        let (executor, _) = executor();
        // StaticChain has no stats account, so this path registers.
        assert!(executor.ensure_registered().await.unwrap().is_none());
    }
}
