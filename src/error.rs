//! Error taxonomy for the keeper.
//!
//! Two layers: `DecodeError` is a per-record skip outcome (never fatal,
//! never aborts a batch), `ChainError` classifies everything the ledger
//! or the network can throw back at a submission. Startup configuration
//! problems are the only fatal class and stay on `anyhow` at the binary
//! rim.

use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_request::RpcError;
use solana_sdk::instruction::InstructionError;
use solana_sdk::transaction::TransactionError;
use thiserror::Error;

/// Settlement program custom error codes surfaced through
/// `TransactionError::InstructionError(_, Custom(code))`.
pub const CODE_ALREADY_EXECUTED: u32 = 6003;
pub const CODE_ALREADY_CANCELLED: u32 = 6004;
pub const CODE_TOO_EARLY: u32 = 6005;

/// Why a raw account buffer was skipped instead of decoded.
///
/// Loosely filtered listing calls can return accounts of unrelated shapes,
/// so a skip is an expected outcome, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{record}: buffer is {actual} bytes, schema is {expected}")]
    Length {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{record}: leading type tag does not match")]
    Tag { record: &'static str },

    #[error("{record}: flag byte `{field}` holds {value}, expected 0 or 1")]
    Flag {
        record: &'static str,
        field: &'static str,
        value: u8,
    },

    /// Reader and schema disagree on field order. Indicates a bug in a
    /// typed decoder, not bad input.
    #[error("{record}: schema mismatch at field `{field}`")]
    Schema {
        record: &'static str,
        field: &'static str,
    },
}

/// Classified outcome of talking to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// A competing keeper settled (or the owner cancelled) first. Benign:
    /// exactly one submitter wins by construction.
    #[error("record already settled or cancelled by another party")]
    RaceLoss,

    /// The ledger's own slot reading says the record has not matured yet.
    /// Retried naturally on the next poll tick.
    #[error("ledger reports record not yet matured")]
    Premature,

    /// Transport-level trouble: timeouts, dropped connections, expired
    /// validity anchor. Retried after backoff.
    #[error("transient network failure: {0}")]
    Transient(String),

    /// Anything else the ledger rejected. Logged in full, counted failed,
    /// never aborts the loop.
    #[error("unclassified ledger rejection: {0}")]
    Unclassified(String),
}

impl ChainError {
    /// True when the failure is expected to clear on its own.
    pub fn is_benign(&self) -> bool {
        matches!(self, ChainError::RaceLoss | ChainError::Premature)
    }

    /// Classify a typed transaction error reported by the ledger.
    pub fn from_transaction_error(err: &TransactionError) -> Self {
        match err {
            TransactionError::InstructionError(_, InstructionError::Custom(code)) => {
                match *code {
                    CODE_ALREADY_EXECUTED | CODE_ALREADY_CANCELLED => ChainError::RaceLoss,
                    CODE_TOO_EARLY => ChainError::Premature,
                    other => {
                        ChainError::Unclassified(format!("settlement program error code {other}"))
                    }
                }
            }
            // The validity anchor aged out before the transaction landed.
            TransactionError::BlockhashNotFound => {
                ChainError::Transient("transaction validity anchor expired".to_string())
            }
            // Our own earlier submission already landed; the next poll tick
            // sees the settled record and moves on.
            TransactionError::AlreadyProcessed => {
                ChainError::Transient("transaction already processed".to_string())
            }
            other => ChainError::Unclassified(format!("transaction error: {other}")),
        }
    }

    /// Classify an RPC client error, preferring the typed transaction error
    /// when one is embedded, then falling back to message text (the ledger
    /// renders program errors by name in preflight logs).
    pub fn from_client_error(err: ClientError) -> Self {
        if let Some(tx_err) = err.get_transaction_error() {
            return Self::from_transaction_error(&tx_err);
        }

        let text = err.to_string();
        if text.contains("AlreadyExecuted") || text.contains("AlreadyCancelled") {
            return ChainError::RaceLoss;
        }
        if text.contains("TooEarly") {
            return ChainError::Premature;
        }

        match err.kind() {
            ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) => ChainError::Transient(text),
            ClientErrorKind::RpcError(RpcError::RpcRequestError(_))
            | ClientErrorKind::RpcError(RpcError::ForUser(_)) => ChainError::Transient(text),
            _ => ChainError::Unclassified(text),
        }
    }
}
