//! Fee split and profitability estimation.
//!
//! The split must match the ledger program's arithmetic bit for bit: a
//! profitability decision is worthless if it diverges from the payout the
//! ledger will actually compute. Everything here is u64 floor division
//! with checked intermediates, same as on-chain.

use crate::types::{ProtocolConfig, ScheduledTransfer};

/// The three-way fee split the ledger applies at settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBreakdown {
    /// `amount * protocol_fee_bps / 10000`
    pub total_fee: u64,
    /// `total_fee * keeper_fee_bps / 100`
    pub keeper_fee: u64,
    /// Remainder of the protocol fee after the keeper's cut.
    pub treasury_fee: u64,
}

/// Reproduce the ledger's fee split. Returns `None` on arithmetic
/// overflow, mirroring the program's checked math.
pub fn split_fees(amount: u64, protocol_fee_bps: u16, keeper_fee_bps: u16) -> Option<FeeBreakdown> {
    let total_fee = amount.checked_mul(protocol_fee_bps as u64)?.checked_div(10_000)?;
    let keeper_fee = total_fee.checked_mul(keeper_fee_bps as u64)?.checked_div(100)?;
    let treasury_fee = total_fee.checked_sub(keeper_fee)?;
    Some(FeeBreakdown {
        total_fee,
        keeper_fee,
        treasury_fee,
    })
}

/// Configured cost model for one settlement submission.
///
/// Base fee and priority fee are separate, explicit inputs. Folding the
/// flat per-signature fee into the priority number understates break-even.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionCosts {
    /// Flat per-signature fee charged regardless of priority, in lamports.
    pub base_fee_lamports: u64,
    /// Compute-unit price directive attached to the transaction.
    pub priority_fee_microlamports: u64,
    /// Compute-unit limit directive; bounds the priority budget.
    pub compute_unit_limit: u32,
    /// Floor the estimated profit must strictly exceed.
    pub min_profit_lamports: u64,
}

impl SubmissionCosts {
    /// Worst-case lamports spent submitting: base fee plus the full
    /// priority budget (price x unit limit, microlamports floored to
    /// lamports).
    pub fn submission_cost(&self) -> u64 {
        let priority_budget =
            self.priority_fee_microlamports * self.compute_unit_limit as u64 / 1_000_000;
        self.base_fee_lamports + priority_budget
    }
}

/// Full breakdown of one execute/skip decision, kept inspectable so
/// callers and tests can see the intermediate values, not just the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfitEstimate {
    pub keeper_fee: u64,
    pub submission_cost: u64,
    /// Signed: a losing settlement has negative profit.
    pub profit: i128,
    pub profitable: bool,
}

/// Local heuristic, no on-ledger simulation. Can be wrong if network
/// conditions or protocol parameters moved since the last config fetch;
/// that inaccuracy is acceptable and recoverable.
///
/// Returns `None` when the fee arithmetic overflows (the ledger would
/// reject such a settlement anyway).
pub fn estimate_profitability(
    transfer: &ScheduledTransfer,
    protocol: &ProtocolConfig,
    costs: &SubmissionCosts,
) -> Option<ProfitEstimate> {
    let fees = split_fees(
        transfer.amount,
        protocol.protocol_fee_bps,
        protocol.keeper_fee_bps,
    )?;
    let submission_cost = costs.submission_cost();
    let profit = fees.keeper_fee as i128 - submission_cost as i128;
    // Strict inequality: landing exactly on the threshold is not worth
    // the race.
    let profitable = profit > costs.min_profit_lamports as i128;
    Some(ProfitEstimate {
        keeper_fee: fees.keeper_fee,
        submission_cost,
        profit,
        profitable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::pubkey::Pubkey;

    fn protocol(protocol_fee_bps: u16, keeper_fee_bps: u16) -> ProtocolConfig {
        ProtocolConfig {
            authority: Pubkey::new_unique(),
            treasury: Pubkey::new_unique(),
            protocol_fee_bps,
            keeper_fee_bps,
            total_transfers_created: 0,
            total_transfers_executed: 0,
            total_fees_collected: 0,
            paused: false,
            nonce: 255,
        }
    }

    fn transfer(amount: u64) -> ScheduledTransfer {
        ScheduledTransfer {
            id: 1,
            owner: Pubkey::new_unique(),
            recipient: Pubkey::new_unique(),
            asset: Pubkey::new_unique(),
            escrow: Pubkey::new_unique(),
            amount,
            fee_amount: 0,
            execute_at_slot: 999,
            created_at_slot: 0,
            executed: false,
            cancelled: false,
            executor: Pubkey::default(),
            executed_at_slot: 0,
            nonce: 250,
        }
    }

    fn costs(base: u64, priority: u64, min_profit: u64) -> SubmissionCosts {
        SubmissionCosts {
            base_fee_lamports: base,
            priority_fee_microlamports: priority,
            compute_unit_limit: 300_000,
            min_profit_lamports: min_profit,
        }
    }

    #[test]
    fn hundred_token_reference_split() {
        // 100 tokens at 6 decimals, 0.50% protocol fee, 30% keeper share.
        let fees = split_fees(100_000_000, 50, 30).unwrap();
        assert_eq!(fees.total_fee, 500_000);
        assert_eq!(fees.keeper_fee, 150_000);
        assert_eq!(fees.treasury_fee, 350_000);
    }

    #[test]
    fn split_is_monotonic_in_amount() {
        let mut previous = 0;
        for amount in (0..=10_000_000u64).step_by(333_333) {
            let fees = split_fees(amount, 50, 30).unwrap();
            assert!(fees.total_fee >= previous);
            previous = fees.total_fee;
        }
    }

    #[test]
    fn split_overflow_is_none() {
        assert!(split_fees(u64::MAX, 10_000, 100).is_none());
    }

    #[test]
    fn fee_equal_to_cost_is_not_profitable() {
        // keeper_fee = 150 lamports on a tiny transfer; make cost equal.
        let est = estimate_profitability(
            &transfer(100_000),
            &protocol(50, 30),
            &costs(150, 0, 0),
        )
        .unwrap();
        assert_eq!(est.keeper_fee, est.submission_cost);
        assert_eq!(est.profit, 0);
        assert!(!est.profitable);
    }

    #[test]
    fn fee_strictly_above_cost_is_profitable() {
        let est = estimate_profitability(
            &transfer(100_000),
            &protocol(50, 30),
            &costs(149, 0, 0),
        )
        .unwrap();
        assert_eq!(est.profit, 1);
        assert!(est.profitable);
    }

    #[test]
    fn profit_equal_to_threshold_is_not_profitable() {
        // profit = 150_000 - 5_000 = 145_000; threshold exactly there.
        let est = estimate_profitability(
            &transfer(100_000_000),
            &protocol(50, 30),
            &costs(5_000, 0, 145_000),
        )
        .unwrap();
        assert!(!est.profitable);

        let est = estimate_profitability(
            &transfer(100_000_000),
            &protocol(50, 30),
            &costs(5_000, 0, 144_999),
        )
        .unwrap();
        assert!(est.profitable);
    }

    #[test]
    fn priority_budget_floors_microlamports() {
        // 10 microlamports x 300k units = 3_000_000 micro = 3 lamports.
        let c = costs(5_000, 10, 0);
        assert_eq!(c.submission_cost(), 5_003);
    }

    #[test]
    fn reference_scenario_is_profitable() {
        // 100 tokens, negligible priority fee: 150_000 fee vs 5_000 cost.
        let est = estimate_profitability(
            &transfer(100_000_000),
            &protocol(50, 30),
            &costs(5_000, 0, 1_000),
        )
        .unwrap();
        assert_eq!(est.keeper_fee, 150_000);
        assert_eq!(est.submission_cost, 5_000);
        assert!(est.profitable);
    }
}
