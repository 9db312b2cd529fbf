//! Timelock Keeper Library
//!
//! Components for discovering matured scheduled transfers on the ledger,
//! estimating settlement profitability, and submitting settlement
//! transactions in competition with other keepers.

pub mod chain;
pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod fees;
pub mod monitor;
pub mod pda;
pub mod record;
pub mod retry;
pub mod types;

// Re-export commonly used types
pub use chain::{ChainClient, LocalSigner, RemoteSigner, RpcChainClient, TransactionSigner};
pub use config::{load_config, load_config_from_file, KeeperConfig};
pub use error::{ChainError, DecodeError};
pub use executor::SettlementExecutor;
pub use fees::{estimate_profitability, split_fees, FeeBreakdown, ProfitEstimate};
pub use monitor::{MonitorState, PaymentMonitor};
pub use types::{KeeperStats, MonitorStats, ProtocolConfig, ScheduledTransfer};
