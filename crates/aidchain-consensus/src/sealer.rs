use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use aidchain_core::{DEFAULT_BLOCK_INTERVAL_SECS, DEFAULT_MIN_TXS_PER_BLOCK};

use crate::engine::PoaEngine;

/// Settings for the background sealing loop.
#[derive(Clone, Debug)]
pub struct SealerConfig {
    pub interval: Duration,
    pub min_txs_per_block: usize,
    /// Service passphrase used to unlock the proposer's key each tick.
    pub validator_passphrase: String,
    pub enabled: bool,
}

impl Default for SealerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_BLOCK_INTERVAL_SECS),
            min_txs_per_block: DEFAULT_MIN_TXS_PER_BLOCK,
            validator_passphrase: String::new(),
            enabled: true,
        }
    }
}

/// The background sealing task.
///
/// One cooperative loop: every `interval`, seal a block when the pool has
/// reached `min_txs_per_block`. Per-tick failures are logged and counted,
/// never fatal. Cancellation is honored between ticks; a tick in flight
/// runs to completion because a seal either fully commits or fully rolls
/// back.
pub struct Sealer {
    engine: Arc<PoaEngine>,
    config: SealerConfig,
    failed_ticks: Arc<AtomicU64>,
}

impl Sealer {
    pub fn new(engine: Arc<PoaEngine>, config: SealerConfig) -> Self {
        Self {
            engine,
            config,
            failed_ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared counter of failed ticks, for status introspection.
    pub fn failed_ticks(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.failed_ticks)
    }

    /// Run until `shutdown` flips to true. Consumes the sealer; spawn it.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if !self.config.enabled {
            info!("automated block creation disabled; sealer idle");
            let _ = shutdown.changed().await;
            return;
        }

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_secs = self.config.interval.as_secs(),
            min_txs = self.config.min_txs_per_block,
            "sealing loop started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender means the process is going away.
                    if changed.is_err() || *shutdown.borrow() {
                        info!("sealing loop stopping");
                        return;
                    }
                }
                _ = ticker.tick() => self.tick().await,
            }
        }
    }

    async fn tick(&self) {
        let pending = self.engine.ledger().pending_len();
        if pending < self.config.min_txs_per_block {
            debug!(pending, "below sealing threshold; skipping tick");
            return;
        }

        match self
            .engine
            .seal_next_block(&self.config.validator_passphrase)
            .await
        {
            Ok(outcome) => {
                debug!(
                    index = outcome.block.index,
                    validator = %outcome.validator_name,
                    "tick sealed a block"
                );
            }
            Err(e) => {
                self.failed_ticks.fetch_add(1, Ordering::Relaxed);
                if e.is_recoverable_tick_failure() {
                    debug!(error = %e, "tick skipped");
                } else {
                    warn!(error = %e, "sealing tick failed");
                }
            }
        }
    }
}
