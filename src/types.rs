//! Core data structures shared across the keeper.
//!
//! The three ledger-owned record types mirror the settlement program's
//! account layouts field for field. The keeper only ever reads them;
//! every mutation happens on-ledger through a settlement transaction.

use solana_sdk::pubkey::Pubkey;
use std::fmt;

/// A scheduled transfer record, decoded from its 219-byte ledger account.
///
/// Terminal once `executed` or `cancelled` is set; the two flags are
/// mutually exclusive and no field changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTransfer {
    /// Unique per owner, assigned at creation.
    pub id: u64,
    pub owner: Pubkey,
    pub recipient: Pubkey,
    /// Token mint the escrow custodies.
    pub asset: Pubkey,
    pub escrow: Pubkey,
    /// Locked amount in base units.
    pub amount: u64,
    pub fee_amount: u64,
    pub execute_at_slot: u64,
    pub created_at_slot: u64,
    pub executed: bool,
    pub cancelled: bool,
    /// Keeper credited with settlement. Only meaningful when `executed`.
    pub executor: Pubkey,
    /// Only meaningful when `executed`.
    pub executed_at_slot: u64,
    /// Derivation nonce echoed back to the ledger on submission.
    pub nonce: u8,
}

impl ScheduledTransfer {
    /// Maturity test. Slot-to-slot comparison only; wall-clock estimates
    /// are never authoritative.
    pub fn is_matured(&self, current_slot: u64) -> bool {
        !self.executed && !self.cancelled && self.execute_at_slot <= current_slot
    }

    /// A terminal record never changes again.
    pub fn is_terminal(&self) -> bool {
        self.executed || self.cancelled
    }

    /// Slots elapsed past maturity at `current_slot`.
    pub fn slots_late(&self, current_slot: u64) -> u64 {
        current_slot.saturating_sub(self.execute_at_slot)
    }
}

impl fmt::Display for ScheduledTransfer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "transfer #{} ({} base units, matures at slot {})",
            self.id, self.amount, self.execute_at_slot
        )
    }
}

/// The protocol's singleton configuration account. Read-only input to fee
/// math; refreshed every poll iteration so rate changes take effect without
/// a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub authority: Pubkey,
    pub treasury: Pubkey,
    /// Protocol fee on the transfer amount, in basis points (0-10000).
    pub protocol_fee_bps: u16,
    /// Keeper's share of the protocol fee, in basis points of that fee (0-100).
    pub keeper_fee_bps: u16,
    pub total_transfers_created: u64,
    pub total_transfers_executed: u64,
    pub total_fees_collected: u64,
    pub paused: bool,
    pub nonce: u8,
}

/// Per-keeper statistics account, created once at registration and updated
/// transactionally by the ledger on each credited settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeeperStats {
    pub keeper: Pubkey,
    pub executions_count: u64,
    pub total_fees_earned: u64,
    pub failed_attempts: u64,
    pub registered_at_slot: u64,
    pub last_execution_slot: u64,
    pub nonce: u8,
}

/// Process-local run counters. Reset on every start, never persisted,
/// never shared across processes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    iterations: u64,
    executed: u64,
    failed: u64,
}

impl MonitorStats {
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn executed(&self) -> u64 {
        self.executed
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub(crate) fn record_iteration(&mut self) {
        self.iterations += 1;
    }

    pub(crate) fn record_executed(&mut self) {
        self.executed += 1;
    }

    pub(crate) fn record_failed(&mut self) {
        self.failed += 1;
    }
}
