use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use aidchain_audit::AuditSink;
use aidchain_core::{iso8601, AidError, AuditRecord, Block, UtcInstant};
use aidchain_crypto::sign;
use aidchain_ledger::{validate_link, Ledger};
use aidchain_state::ChainStore;
use aidchain_vault::decrypt_key;

use crate::registry::ValidatorRegistry;

/// A completed seal: the appended block and the validator that signed it.
#[derive(Clone, Debug)]
pub struct SealOutcome {
    pub block: Block,
    pub validator_id: String,
    pub validator_name: String,
}

/// Status snapshot served by the introspection endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsensusStatus {
    pub chain_height: u64,
    pub pending: usize,
    pub active_validator_count: usize,
    pub head_hash: String,
    pub head_timestamp: UtcInstant,
    pub current_proposer_id: Option<String>,
}

/// The Proof-of-Authority sealing engine.
///
/// Composes the ledger, the validator registry, the vault, and the snapshot
/// store. A dedicated seal lock keeps at most one sealing in flight; it is
/// distinct from (and taken before) the ledger's chain lock.
pub struct PoaEngine {
    ledger: Arc<Ledger>,
    registry: Arc<ValidatorRegistry>,
    store: Option<Arc<ChainStore>>,
    audit: AuditSink,
    seal_lock: tokio::sync::Mutex<()>,
}

impl PoaEngine {
    pub fn new(
        ledger: Arc<Ledger>,
        registry: Arc<ValidatorRegistry>,
        store: Option<Arc<ChainStore>>,
        audit: AuditSink,
    ) -> Self {
        Self {
            ledger,
            registry,
            store,
            audit,
            seal_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn registry(&self) -> &Arc<ValidatorRegistry> {
        &self.registry
    }

    /// Produce the next block end-to-end.
    ///
    /// Order: pool check, proposer selection, key decryption, candidate
    /// build, signing, append, statistics, snapshot, audit. `add_block` is
    /// the commit point — everything before it failing leaves no state
    /// change; failures after it are logged and audited but the block
    /// stands.
    pub async fn seal_next_block(&self, passphrase: &str) -> Result<SealOutcome, AidError> {
        let _sealing = self.seal_lock.lock().await;

        if self.ledger.pending_len() == 0 {
            return Err(AidError::EmptyPool);
        }

        let proposer = self
            .registry
            .next_proposer()?
            .ok_or(AidError::NoValidators)?;

        // Wrong passphrase surfaces to the caller; we do not shop the seal
        // around to another validator.
        let private_key = decrypt_key(&proposer.encrypted_private_key, passphrase).map_err(|e| {
            self.audit.emit(
                AuditRecord::failure(
                    "Consensus",
                    "seal_block",
                    format!("key decryption failed for validator {}", proposer.name),
                    e.to_string(),
                )
                .with_entity(&proposer.id, "Validator"),
            );
            e
        })?;

        let mut block = self.ledger.create_block(&proposer.public_key)?;
        block.validator_signature = sign(&private_key, block.signing_input().as_bytes())
            .map_err(|_| AidError::Unauthorized("validator key cannot sign".into()))?;

        self.ledger.add_block(block.clone())?;

        if let Err(e) = self.registry.record_block_creation(&proposer.id) {
            warn!(validator = %proposer.id, error = %e, "block statistics update failed");
        }

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.ledger.chain(), &self.ledger.pending()) {
                warn!(error = %e, "snapshot save failed after seal; retrying on next seal");
                self.audit.emit(
                    AuditRecord::failure(
                        "Consensus",
                        "persist_chain",
                        format!("snapshot save failed after block {}", block.index),
                        e.to_string(),
                    )
                    .with_entity(&block.hash, "Block"),
                );
            }
        }

        info!(
            index = block.index,
            hash = %block.hash,
            validator = %proposer.name,
            txs = block.transactions.len(),
            "block sealed"
        );
        self.audit.emit(
            AuditRecord::success(
                "Consensus",
                "seal_block",
                format!(
                    "block {} sealed with {} transaction(s) at {}",
                    block.index,
                    block.transactions.len(),
                    iso8601(&block.timestamp)
                ),
            )
            .with_principal(&proposer.id, &proposer.name)
            .with_entity(&block.hash, "Block"),
        );

        Ok(SealOutcome {
            block,
            validator_id: proposer.id,
            validator_name: proposer.name,
        })
    }

    /// Re-check one block against its predecessor. Genesis is always valid.
    /// Deliberately does not require the signer to still be in the active
    /// set — deactivating a validator must not invalidate its past blocks.
    pub fn validate_block_at(&self, index: u64) -> Result<bool, AidError> {
        let block = self
            .ledger
            .block_by_index(index)
            .ok_or_else(|| AidError::NotFound(format!("block {index}")))?;
        if block.index == 0 {
            return Ok(true);
        }
        let previous = self
            .ledger
            .block_by_index(index - 1)
            .ok_or_else(|| AidError::NotFound(format!("block {}", index - 1)))?;
        Ok(validate_link(&previous, &block, self.ledger.flags()).is_ok())
    }

    /// Id of the validator that would seal the next block, if any.
    pub fn current_proposer_id(&self) -> Option<String> {
        self.registry
            .next_proposer()
            .ok()
            .flatten()
            .map(|v| v.id)
    }

    pub fn status(&self) -> Result<ConsensusStatus, AidError> {
        let head = self.ledger.head();
        Ok(ConsensusStatus {
            chain_height: self.ledger.height(),
            pending: self.ledger.pending_len(),
            active_validator_count: self.registry.get_active_ordered()?.len(),
            head_hash: head.hash,
            head_timestamp: head.timestamp,
            current_proposer_id: self.current_proposer_id(),
        })
    }
}
