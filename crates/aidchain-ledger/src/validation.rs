use serde::{Deserialize, Serialize};

use aidchain_core::{AidError, Block};
use aidchain_crypto::hash::block_hash;
use aidchain_crypto::verify;

/// Runtime enforcement switches. Both default on; turning one off is a
/// bootstrap/development posture only.
#[derive(Clone, Copy, Debug)]
pub struct LedgerFlags {
    pub verify_transaction_signatures: bool,
    pub verify_block_signatures: bool,
}

impl Default for LedgerFlags {
    fn default() -> Self {
        Self {
            verify_transaction_signatures: true,
            verify_block_signatures: true,
        }
    }
}

/// One failed check found while validating the chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub block_index: u64,
    pub kind: String,
    pub message: String,
}

impl ValidationIssue {
    fn from_error(block_index: u64, err: &AidError) -> Self {
        let kind = match err {
            AidError::InvalidHash { .. } => "InvalidHash",
            AidError::InvalidBlockIndex { .. } => "InvalidBlockIndex",
            AidError::InvalidPreviousHash { .. } => "InvalidPreviousHash",
            AidError::InvalidBlockSignature { .. } => "InvalidBlockSignature",
            AidError::InvalidSignature(_) => "InvalidSignature",
            _ => "Invalid",
        };
        Self {
            block_index,
            kind: kind.to_string(),
            message: err.to_string(),
        }
    }
}

/// Result of a full chain re-check.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub block_count: usize,
    pub errors: Vec<ValidationIssue>,
}

/// Validate `block` as the successor of `prev`.
///
/// Checks, in order: index contiguity, previous-hash linkage, hash
/// recomputation, every transaction signature (when enforced), and the
/// validator signature (when enforced). Genesis is never passed here — it
/// validates unconditionally.
pub fn validate_link(prev: &Block, block: &Block, flags: LedgerFlags) -> Result<(), AidError> {
    if block.index != prev.index + 1 {
        return Err(AidError::InvalidBlockIndex {
            expected: prev.index + 1,
            got: block.index,
        });
    }
    if block.previous_hash != prev.hash {
        return Err(AidError::InvalidPreviousHash { index: block.index });
    }

    let computed = block_hash(block);
    if computed != block.hash {
        return Err(AidError::InvalidHash {
            index: block.index,
            stored: block.hash.clone(),
            computed,
        });
    }

    if flags.verify_transaction_signatures {
        for tx in &block.transactions {
            if !verify(
                &tx.sender_public_key,
                tx.signing_input().as_bytes(),
                &tx.signature,
            ) {
                return Err(AidError::InvalidSignature(tx.id.clone()));
            }
        }
    }

    if flags.verify_block_signatures
        && !verify(
            &block.validator_public_key,
            block.signing_input().as_bytes(),
            &block.validator_signature,
        )
    {
        return Err(AidError::InvalidBlockSignature { index: block.index });
    }

    Ok(())
}

/// Re-check every link of `chain` from index 1 upward, collecting every
/// failure instead of stopping at the first. Pure: same chain, same report.
pub fn validate_chain(chain: &[Block], flags: LedgerFlags) -> ValidationReport {
    let mut errors = Vec::new();
    for window in chain.windows(2) {
        if let Err(e) = validate_link(&window[0], &window[1], flags) {
            errors.push(ValidationIssue::from_error(window[1].index, &e));
        }
    }
    ValidationReport {
        is_valid: errors.is_empty(),
        block_count: chain.len(),
        errors,
    }
}
