use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, info};

use aidchain_core::{AidError, Block, Transaction, DEFAULT_MAX_TXS_PER_BLOCK};
use aidchain_crypto::hash::block_hash;
use aidchain_crypto::verify;

use crate::validation::{self, LedgerFlags, ValidationReport};

/// Construction-time ledger settings.
#[derive(Clone, Copy, Debug)]
pub struct LedgerConfig {
    pub flags: LedgerFlags,
    /// Oldest-first cutoff when a candidate block is built; the remainder
    /// stays pending.
    pub max_block_transactions: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            flags: LedgerFlags::default(),
            max_block_transactions: DEFAULT_MAX_TXS_PER_BLOCK,
        }
    }
}

struct Inner {
    chain: Vec<Block>,
    pending: VecDeque<Transaction>,
    /// Ids of every transaction sealed into the chain.
    chain_ids: HashSet<String>,
    /// Ids currently waiting in the pool.
    pending_ids: HashSet<String>,
}

/// The ledger engine: one live chain plus the pending pool, every mutation
/// serialized under a single lock. Readers receive defensive copies of
/// committed state only.
pub struct Ledger {
    inner: Mutex<Inner>,
    config: LedgerConfig,
}

impl Ledger {
    /// Fresh ledger holding only the genesis block.
    pub fn new(config: LedgerConfig) -> Self {
        let mut genesis = Block::genesis_at(Utc::now());
        genesis.hash = block_hash(&genesis);
        info!(hash = %genesis.hash, "genesis block created");
        Self {
            inner: Mutex::new(Inner {
                chain: vec![genesis],
                pending: VecDeque::new(),
                chain_ids: HashSet::new(),
                pending_ids: HashSet::new(),
            }),
            config,
        }
    }

    /// Reconstitute a ledger from a loaded snapshot. The chain must be
    /// non-empty and internally valid; the id index is rebuilt here.
    pub fn from_snapshot(
        chain: Vec<Block>,
        pending: Vec<Transaction>,
        config: LedgerConfig,
    ) -> Result<Self, AidError> {
        if chain.is_empty() {
            return Err(AidError::CorruptSnapshot("snapshot chain is empty".into()));
        }
        let report = validation::validate_chain(&chain, config.flags);
        if !report.is_valid {
            let first = &report.errors[0];
            return Err(AidError::CorruptSnapshot(format!(
                "block {}: {}",
                first.block_index, first.message
            )));
        }

        let mut chain_ids = HashSet::new();
        for block in &chain {
            for tx in &block.transactions {
                if !chain_ids.insert(tx.id.clone()) {
                    return Err(AidError::CorruptSnapshot(format!(
                        "duplicate transaction id {} in snapshot",
                        tx.id
                    )));
                }
            }
        }
        let mut pending_ids = HashSet::new();
        for tx in &pending {
            if chain_ids.contains(&tx.id) || !pending_ids.insert(tx.id.clone()) {
                return Err(AidError::CorruptSnapshot(format!(
                    "duplicate pending transaction id {} in snapshot",
                    tx.id
                )));
            }
        }

        info!(height = chain.len(), pending = pending.len(), "ledger restored from snapshot");
        Ok(Self {
            inner: Mutex::new(Inner {
                chain,
                pending: pending.into(),
                chain_ids,
                pending_ids,
            }),
            config,
        })
    }

    pub fn flags(&self) -> LedgerFlags {
        self.config.flags
    }

    // ── Pending pool ─────────────────────────────────────────────────────────

    /// Append a signed transaction to the pending pool.
    pub fn add_transaction(&self, tx: Transaction) -> Result<(), AidError> {
        tx.check_fields()?;

        if self.config.flags.verify_transaction_signatures
            && !verify(
                &tx.sender_public_key,
                tx.signing_input().as_bytes(),
                &tx.signature,
            )
        {
            return Err(AidError::InvalidSignature(tx.id.clone()));
        }

        let mut inner = self.lock();
        if inner.chain_ids.contains(&tx.id) || inner.pending_ids.contains(&tx.id) {
            return Err(AidError::Duplicate(tx.id));
        }
        debug!(tx_id = %tx.id, kind = %tx.kind, "transaction accepted into pool");
        inner.pending_ids.insert(tx.id.clone());
        inner.pending.push_back(tx);
        Ok(())
    }

    // ── Block construction ───────────────────────────────────────────────────

    /// Build an unsigned candidate block from the oldest pending
    /// transactions. Does not mutate the chain or the pool.
    pub fn create_block(&self, validator_public_key: &str) -> Result<Block, AidError> {
        let inner = self.lock();
        if inner.pending.is_empty() {
            return Err(AidError::EmptyPool);
        }

        let head = inner.chain.last().expect("chain always has genesis");
        let transactions: Vec<Transaction> = inner
            .pending
            .iter()
            .take(self.config.max_block_transactions)
            .cloned()
            .collect();

        let mut block = Block {
            index: head.index + 1,
            timestamp: Utc::now(),
            transactions,
            previous_hash: head.hash.clone(),
            hash: String::new(),
            nonce: 0,
            validator_public_key: validator_public_key.to_string(),
            validator_signature: String::new(),
        };
        block.hash = block_hash(&block);
        Ok(block)
    }

    /// Validate and append a sealed block, draining its transactions from
    /// the pool. No partial mutation: any failed check leaves the ledger
    /// untouched.
    pub fn add_block(&self, block: Block) -> Result<(), AidError> {
        let mut inner = self.lock();
        let head = inner.chain.last().expect("chain always has genesis");
        validation::validate_link(head, &block, self.config.flags)?;

        for tx in &block.transactions {
            if inner.chain_ids.contains(&tx.id) {
                return Err(AidError::Duplicate(tx.id.clone()));
            }
        }

        let sealed: HashSet<&str> = block.transactions.iter().map(|tx| tx.id.as_str()).collect();
        inner.pending.retain(|tx| !sealed.contains(tx.id.as_str()));
        for tx in &block.transactions {
            inner.pending_ids.remove(&tx.id);
            inner.chain_ids.insert(tx.id.clone());
        }

        info!(
            index = block.index,
            hash = %block.hash,
            txs = block.transactions.len(),
            "block appended"
        );
        inner.chain.push(block);
        Ok(())
    }

    // ── Validation ───────────────────────────────────────────────────────────

    /// Full ordered re-check from index 1 upward.
    pub fn validate_chain(&self) -> ValidationReport {
        let inner = self.lock();
        validation::validate_chain(&inner.chain, self.config.flags)
    }

    // ── Read accessors ───────────────────────────────────────────────────────

    pub fn head(&self) -> Block {
        self.lock().chain.last().expect("chain always has genesis").clone()
    }

    pub fn block_by_index(&self, index: u64) -> Option<Block> {
        self.lock().chain.get(index as usize).cloned()
    }

    /// Look up a transaction on-chain or in the pool.
    pub fn transaction_by_id(&self, id: &str) -> Option<Transaction> {
        let inner = self.lock();
        inner
            .chain
            .iter()
            .flat_map(|b| b.transactions.iter())
            .chain(inner.pending.iter())
            .find(|tx| tx.id == id)
            .cloned()
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.lock().pending.iter().cloned().collect()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of blocks including genesis.
    pub fn height(&self) -> u64 {
        self.lock().chain.len() as u64
    }

    /// Defensive copy of the whole chain (snapshot save, RPC).
    pub fn chain(&self) -> Vec<Block> {
        self.lock().chain.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("ledger lock poisoned")
    }
}
