//! Timelock Keeper
//!
//! Main entry point for the keeper bot. Loads configuration from the
//! environment, connects to the ledger, makes sure the keeper identity is
//! registered, then runs the payment monitor until SIGINT or SIGTERM
//! requests a cooperative shutdown.

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use solana_sdk::commitment_config::CommitmentConfig;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use timelock_keeper::chain::{
    ChainClient, LocalSigner, RemoteSigner, RpcChainClient, TransactionSigner,
};
use timelock_keeper::config::{load_config, load_config_from_file};
use timelock_keeper::executor::SettlementExecutor;
use timelock_keeper::monitor::PaymentMonitor;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Minimum native balance before the low-balance warning fires (0.01 SOL).
const LOW_BALANCE_LAMPORTS: u64 = 10_000_000;

/// Timelock Keeper - settles matured scheduled transfers for a fee
#[derive(Parser)]
#[command(name = "timelock-keeper")]
struct Args {
    /// Env file to load configuration from (defaults to .env)
    #[arg(short, long, env = "KEEPER_ENV_FILE")]
    env_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging. RUST_LOG wins; LOG_LEVEL is the simpler knob.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| std::env::var("LOG_LEVEL").map(EnvFilter::new))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let args = Args::parse();

    info!("Timelock Keeper starting...");

    let config = match &args.env_file {
        Some(path) => load_config_from_file(path)?,
        None => load_config()?,
    };
    info!("RPC URL: {}", config.rpc_url);
    info!("Program: {}", config.program_id);
    info!("Poll interval: {}ms", config.poll_interval_ms);
    info!(
        "Priority fee: {} microlamports | base fee: {} lamports | min profit: {} lamports",
        config.priority_fee_microlamports, config.base_fee_lamports, config.min_profit_lamports
    );

    // Signing capability: delegated service when configured, otherwise the
    // local keypair from the credential.
    let signer: Arc<dyn TransactionSigner> = match (&config.signer_endpoint, config.signer_address)
    {
        (Some(endpoint), Some(address)) => {
            info!("Delegated signer: {} via {}", address, endpoint);
            Arc::new(RemoteSigner::new(endpoint, address))
        }
        _ => Arc::new(
            LocalSigner::from_secret(&config.keeper_credential)
                .context("failed to load keeper signing credential")?,
        ),
    };
    info!("Keeper identity: {}", signer.address());

    let client = Arc::new(RpcChainClient::new(
        &config.rpc_url,
        CommitmentConfig::confirmed(),
    ));

    // Verify connectivity before entering the loop.
    let slot = client
        .current_slot()
        .await
        .context("failed to reach the RPC endpoint")?;
    info!("Connected. Current slot: {}", slot);

    let balance = client.balance(&signer.address()).await?;
    info!("Balance: {:.4} SOL", balance as f64 / 1e9);
    if balance < LOW_BALANCE_LAMPORTS {
        warn!("Low balance! Submission fees will drain it quickly.");
    }

    let executor = SettlementExecutor::new(Arc::clone(&client), Arc::clone(&signer), &config);
    match executor.ensure_registered().await? {
        Some(stats) => info!(
            "Keeper registered since slot {} | executions: {} | fees earned: {} lamports",
            stats.registered_at_slot, stats.executions_count, stats.total_fees_earned
        ),
        None => info!("Keeper registration submitted"),
    }

    let mut monitor = PaymentMonitor::new(Arc::clone(&client), executor, config);

    // Cooperative shutdown: first signal requests a stop, the monitor
    // finishes its in-flight iteration and prints final counters.
    let stop_flag = monitor.stop_flag();
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let signals_handle = signals.handle();
    tokio::spawn(async move {
        while let Some(signal) = signals.next().await {
            info!("Received signal {}, shutting down...", signal);
            stop_flag.store(true, Ordering::SeqCst);
        }
    });

    monitor.start().await;
    signals_handle.close();

    Ok(())
}
