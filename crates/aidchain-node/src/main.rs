//! aidchain-node — the authoritative ledger process.
//!
//! Startup sequence:
//!   1. Open the repository database (validators, shipments, audit)
//!   2. Reconstitute the chain from the snapshot file, or start at genesis
//!   3. Deploy the built-in contracts
//!   4. Spawn the background sealing loop
//!   5. Start the JSON-RPC 2.0 server
//!   6. On ctrl-c: stop the loop, write a final snapshot

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use aidchain_audit::AuditSink;
use aidchain_consensus::{PoaEngine, Sealer, SealerConfig, ValidatorRegistry};
use aidchain_contracts::{ContractEngine, DeliveryVerificationContract, ShipmentTrackingContract};
use aidchain_core::{
    DEFAULT_BLOCK_INTERVAL_SECS, DEFAULT_MAX_BACKUP_FILES, DEFAULT_MAX_TXS_PER_BLOCK,
    DEFAULT_MIN_TXS_PER_BLOCK,
};
use aidchain_ledger::{Ledger, LedgerConfig, LedgerFlags};
use aidchain_rpc::{RpcServer, RpcServerState};
use aidchain_shipments::ShipmentService;
use aidchain_state::{ChainStore, ChainStoreConfig, StateDb};
use aidchain_vault::SessionKeyTable;

#[derive(Parser, Debug)]
#[command(
    name = "aidchain-node",
    version,
    about = "Aidchain node — permissioned ledger for humanitarian aid shipments"
)]
struct Args {
    /// Directory for the repository database and the chain snapshot.
    #[arg(long, default_value = "~/.aidchain/data")]
    data_dir: PathBuf,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8545")]
    rpc_addr: SocketAddr,

    // ── Consensus settings ───────────────────────────────────────────────────
    /// Seconds between sealing-loop ticks.
    #[arg(long, default_value_t = DEFAULT_BLOCK_INTERVAL_SECS)]
    block_interval_secs: u64,

    /// Minimum pool size before the loop seals.
    #[arg(long, default_value_t = DEFAULT_MIN_TXS_PER_BLOCK)]
    min_txs_per_block: usize,

    /// Cap on transactions per sealed block.
    #[arg(long, default_value_t = DEFAULT_MAX_TXS_PER_BLOCK)]
    max_txs_per_block: usize,

    /// Service passphrase the sealing loop uses to unlock validator keys.
    #[arg(long, default_value = "")]
    validator_password: String,

    /// Disable the automated sealing loop (blocks only seal on request).
    #[arg(long)]
    disable_auto_seal: bool,

    // ── Persistence settings ─────────────────────────────────────────────────
    /// Disable chain snapshot persistence entirely.
    #[arg(long)]
    no_persistence: bool,

    /// Snapshot file path. Defaults to `<data-dir>/chain.json`.
    #[arg(long)]
    chain_file: Option<PathBuf>,

    /// Do not save a snapshot after each sealed block.
    #[arg(long)]
    no_auto_save: bool,

    /// Do not reload the snapshot at startup.
    #[arg(long)]
    no_auto_load: bool,

    /// Do not keep rotated snapshot backups.
    #[arg(long)]
    no_backup: bool,

    /// Rotated backups kept on disk.
    #[arg(long, default_value_t = DEFAULT_MAX_BACKUP_FILES)]
    max_backup_files: usize,

    // ── Signature enforcement ────────────────────────────────────────────────
    /// Accept transactions without verifying sender signatures (bootstrap).
    #[arg(long)]
    no_verify_tx_signatures: bool,

    /// Accept blocks without verifying validator signatures (bootstrap).
    #[arg(long)]
    no_verify_block_signatures: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,aidchain=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("aidchain node starting");

    // ── Repository database ───────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let db = Arc::new(StateDb::open(data_dir.join("state")).context("opening state database")?);

    // ── Chain store + ledger ─────────────────────────────────────────────────
    let flags = LedgerFlags {
        verify_transaction_signatures: !args.no_verify_tx_signatures,
        verify_block_signatures: !args.no_verify_block_signatures,
    };
    let ledger_config = LedgerConfig {
        flags,
        max_block_transactions: args.max_txs_per_block,
    };

    let store = (!args.no_persistence).then(|| {
        let path = args
            .chain_file
            .clone()
            .unwrap_or_else(|| data_dir.join("chain.json"));
        let mut config = ChainStoreConfig::new(path);
        config.create_backup = !args.no_backup;
        config.max_backup_files = args.max_backup_files;
        Arc::new(ChainStore::new(config))
    });

    let ledger = match &store {
        Some(store) if !args.no_auto_load => match store.load().context("loading chain snapshot")? {
            Some((chain, pending)) => Arc::new(
                Ledger::from_snapshot(chain, pending, ledger_config)
                    .context("reconstituting ledger from snapshot")?,
            ),
            None => {
                info!("no chain snapshot found; starting at genesis");
                Arc::new(Ledger::new(ledger_config))
            }
        },
        _ => Arc::new(Ledger::new(ledger_config)),
    };

    // ── Consensus ────────────────────────────────────────────────────────────
    let registry = Arc::new(ValidatorRegistry::new(Arc::clone(&db)));
    let audit = AuditSink::spawn(Arc::clone(&db));
    let engine_store = if args.no_auto_save { None } else { store.clone() };
    let engine = Arc::new(PoaEngine::new(
        Arc::clone(&ledger),
        registry,
        engine_store,
        audit.clone(),
    ));

    // ── Contracts (explicit registration at boot) ────────────────────────────
    let contracts = Arc::new(ContractEngine::new());
    contracts
        .deploy(Arc::new(ShipmentTrackingContract))
        .context("deploying shipment-tracking contract")?;
    contracts
        .deploy(Arc::new(DeliveryVerificationContract))
        .context("deploying delivery-verification contract")?;

    // ── Shipment orchestrator ────────────────────────────────────────────────
    let sessions = SessionKeyTable::new();
    let shipments = Arc::new(ShipmentService::new(
        Arc::clone(&db),
        Arc::clone(&ledger),
        contracts,
        sessions,
        audit.clone(),
        args.no_verify_tx_signatures,
    ));

    // ── Sealing loop ─────────────────────────────────────────────────────────
    let sealer = Sealer::new(
        Arc::clone(&engine),
        SealerConfig {
            interval: Duration::from_secs(args.block_interval_secs.max(1)),
            min_txs_per_block: args.min_txs_per_block,
            validator_passphrase: args.validator_password.clone(),
            enabled: !args.disable_auto_seal,
        },
    );
    let failed_ticks = sealer.failed_ticks();
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let sealer_handle = tokio::spawn(sealer.run(shutdown_rx));

    // ── RPC server ───────────────────────────────────────────────────────────
    let rpc_state = Arc::new(RpcServerState {
        engine: Arc::clone(&engine),
        shipments,
        failed_ticks,
    });
    let rpc_handle = RpcServer::new(rpc_state)
        .start(args.rpc_addr)
        .await
        .context("starting RPC server")?;

    info!("node ready");
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown requested");

    // Stop the loop; a tick in flight completes on its own.
    let _ = shutdown_tx.send(true);
    let _ = sealer_handle.await;
    let _ = rpc_handle.stop();

    // Final snapshot so a clean shutdown never loses the pool.
    if let Some(store) = &store {
        if let Err(e) = store.save(&ledger.chain(), &ledger.pending()) {
            warn!(error = %e, "final snapshot save failed");
        }
    }
    db.flush().ok();
    info!("node stopped");
    Ok(())
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
