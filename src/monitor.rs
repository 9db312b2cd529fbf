//! Payment monitor: the keeper's control loop.
//!
//! Each iteration: fetch the current slot, refresh the protocol config,
//! list candidate accounts by size, decode (discarding skips), retain
//! matured records, then estimate and settle each one sequentially.
//! Matured records are never processed concurrently; a single keeper
//! identity racing itself across simultaneous submissions would only burn
//! fees.
//!
//! The loop never terminates on its own. Per-record failures never abort
//! the batch, per-iteration failures never abort the process; iteration
//! errors back off on the retry schedule and the loop continues until
//! `stop()` is requested. Shutdown is cooperative: the in-flight iteration
//! completes, then final counters are printed exactly once.

use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::chain::ChainClient;
use crate::clock;
use crate::config::KeeperConfig;
use crate::error::ChainError;
use crate::executor::SettlementExecutor;
use crate::fees::{estimate_profitability, SubmissionCosts};
use crate::pda;
use crate::record::TRANSFER_RECORD_LEN;
use crate::retry::RetryPolicy;
use crate::types::{MonitorStats, ProtocolConfig, ScheduledTransfer};

/// How often to log a status line while idle (in iterations).
const IDLE_LOG_INTERVAL: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Running,
    Stopping,
}

/// The orchestrating loop. Owns the only mutable run state in the process.
pub struct PaymentMonitor<C: ChainClient> {
    client: Arc<C>,
    executor: SettlementExecutor<C>,
    config: KeeperConfig,
    costs: SubmissionCosts,
    retry: RetryPolicy,
    stop_flag: Arc<AtomicBool>,
    state: MonitorState,
    stats: MonitorStats,
    consecutive_errors: u32,
}

impl<C: ChainClient> PaymentMonitor<C> {
    pub fn new(client: Arc<C>, executor: SettlementExecutor<C>, config: KeeperConfig) -> Self {
        let costs = config.submission_costs();
        let retry = config.retry_policy();
        Self {
            client,
            executor,
            config,
            costs,
            retry,
            stop_flag: Arc::new(AtomicBool::new(false)),
            state: MonitorState::Stopped,
            stats: MonitorStats::default(),
            consecutive_errors: 0,
        }
    }

    /// Shared handle for signal handlers; storing `true` requests a stop.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_flag)
    }

    /// Request a cooperative stop. Idempotent; the loop exits after its
    /// in-flight iteration completes.
    pub fn stop(&self) {
        if !self.stop_flag.swap(true, Ordering::SeqCst) {
            info!("stop requested, finishing current iteration");
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    /// Run until `stop()` is called. Counters reset on entry.
    pub async fn start(&mut self) {
        self.state = MonitorState::Running;
        self.stats = MonitorStats::default();
        self.consecutive_errors = 0;
        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            "monitor started, watching for matured transfers"
        );

        while !self.stop_requested() {
            match self.run_iteration().await {
                Ok(()) => {
                    self.consecutive_errors = 0;
                    self.sleep_interruptible(self.config.poll_interval()).await;
                }
                Err(err) => {
                    self.consecutive_errors += 1;
                    let backoff = self.retry.delay_for(self.consecutive_errors);
                    error!(
                        error = %err,
                        consecutive = self.consecutive_errors,
                        backoff_ms = backoff.as_millis() as u64,
                        "monitor iteration failed, backing off"
                    );
                    self.sleep_interruptible(backoff).await;
                }
            }
        }

        self.state = MonitorState::Stopping;
        // The single final-counter print.
        info!(
            iterations = self.stats.iterations(),
            executed = self.stats.executed(),
            failed = self.stats.failed(),
            "monitor stopped"
        );
        self.state = MonitorState::Stopped;
    }

    fn stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }

    async fn run_iteration(&mut self) -> Result<(), ChainError> {
        self.stats.record_iteration();

        let current_slot = self.client.current_slot().await?;
        let protocol = self.fetch_protocol_config().await?;
        if protocol.paused {
            warn!(slot = current_slot, "protocol is paused, holding submissions");
            return Ok(());
        }

        let accounts = self
            .client
            .program_accounts(&self.config.program_id, TRANSFER_RECORD_LEN)
            .await?;

        let mut matured: Vec<(Pubkey, ScheduledTransfer)> = Vec::new();
        for (address, data) in accounts {
            match ScheduledTransfer::decode(&data) {
                Ok(transfer) if transfer.is_matured(current_slot) => {
                    matured.push((address, transfer));
                }
                Ok(_) => {}
                Err(skip) => debug!(%address, reason = %skip, "record skipped"),
            }
        }

        if matured.is_empty() {
            if self.stats.iterations() % IDLE_LOG_INTERVAL == 0 {
                info!(
                    slot = current_slot,
                    iterations = self.stats.iterations(),
                    executed = self.stats.executed(),
                    failed = self.stats.failed(),
                    "no matured transfers"
                );
            }
            return Ok(());
        }

        info!(
            count = matured.len(),
            slot = current_slot,
            "found matured transfer(s)"
        );
        for (address, transfer) in &matured {
            self.process_transfer(address, transfer, &protocol, current_slot)
                .await;
        }
        Ok(())
    }

    async fn fetch_protocol_config(&self) -> Result<ProtocolConfig, ChainError> {
        let (config_address, _) = pda::derive_protocol_config(&self.config.program_id);
        let data = self
            .client
            .account_data(&config_address)
            .await?
            .ok_or_else(|| {
                ChainError::Unclassified("protocol config account not found".to_string())
            })?;
        ProtocolConfig::decode(&data)
            .map_err(|e| ChainError::Unclassified(format!("protocol config malformed: {e}")))
    }

    /// Estimate and, when profitable, settle one matured record. Failures
    /// are counted and logged here; they never propagate to the iteration.
    async fn process_transfer(
        &mut self,
        address: &Pubkey,
        transfer: &ScheduledTransfer,
        protocol: &ProtocolConfig,
        current_slot: u64,
    ) {
        let estimate = match estimate_profitability(transfer, protocol, &self.costs) {
            Some(estimate) => estimate,
            None => {
                warn!(%transfer, "fee arithmetic overflowed, skipping");
                return;
            }
        };

        if !estimate.profitable {
            debug!(
                %transfer,
                keeper_fee = estimate.keeper_fee,
                submission_cost = estimate.submission_cost,
                profit = estimate.profit as i64,
                "not worth settling"
            );
            return;
        }

        // Advisory wall-clock estimate of when the record matured; the
        // selection itself was slot-based.
        let due_estimate = clock::time_for_slot(
            current_slot,
            Utc::now(),
            transfer.execute_at_slot,
            clock::SLOTS_PER_SECOND,
        );
        info!(
            %transfer,
            slots_late = transfer.slots_late(current_slot),
            due = %due_estimate.format("%H:%M:%S"),
            keeper_fee = estimate.keeper_fee,
            submission_cost = estimate.submission_cost,
            "attempting settlement"
        );

        match self.executor.settle(address, transfer, protocol).await {
            Ok(signature) => {
                self.stats.record_executed();
                info!(%signature, keeper_fee = estimate.keeper_fee, "settled {transfer}");
            }
            Err(err) => {
                self.stats.record_failed();
                match &err {
                    ChainError::RaceLoss => {
                        info!(%transfer, "already settled by a competing keeper")
                    }
                    ChainError::Premature => {
                        info!(%transfer, "ledger says not yet matured, retrying next tick")
                    }
                    ChainError::Transient(detail) => {
                        warn!(%transfer, %detail, "transient failure, retrying next tick")
                    }
                    ChainError::Unclassified(detail) => {
                        error!(%transfer, %detail, "settlement rejected")
                    }
                }
            }
        }
    }

    /// Sleep in short steps so a stop request cuts the wait short instead
    /// of holding the process for a full poll interval.
    async fn sleep_interruptible(&self, duration: Duration) {
        const STEP: Duration = Duration::from_millis(100);
        let mut remaining = duration;
        while !self.stop_requested() && remaining > Duration::ZERO {
            let chunk = remaining.min(STEP);
            tokio::time::sleep(chunk).await;
            remaining -= chunk;
        }
    }
}
