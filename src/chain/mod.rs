//! Ledger access layer: the abstract RPC interface and signing capability.

pub mod client;
pub mod signer;

pub use client::{ChainClient, RpcChainClient, SignatureState};
pub use signer::{LocalSigner, RemoteSigner, TransactionSigner};
