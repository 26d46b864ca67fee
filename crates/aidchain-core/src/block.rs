use serde::{Deserialize, Serialize};

use crate::constants::{GENESIS_PREVIOUS_HASH, GENESIS_VALIDATOR_KEY};
use crate::transaction::Transaction;
use crate::types::{iso8601, UtcInstant};

/// One sealed unit of the chain.
///
/// `hash` commits to every field except the validator signature;
/// `validator_signature` commits to `(index, hash, timestamp, validator)`.
/// `nonce` is reserved from the pre-PoA format and always 0 here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: UtcInstant,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub hash: String,
    pub nonce: u64,
    pub validator_public_key: String,
    pub validator_signature: String,
}

impl Block {
    /// Preimage of `hash`: index, canonical timestamp, comma-joined
    /// transaction ids, previous hash, nonce, validator key — concatenated.
    pub fn hash_input(&self) -> String {
        let tx_ids = self
            .transactions
            .iter()
            .map(|tx| tx.id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}{}{}{}{}{}",
            self.index,
            iso8601(&self.timestamp),
            tx_ids,
            self.previous_hash,
            self.nonce,
            self.validator_public_key
        )
    }

    /// Preimage of `validator_signature`.
    pub fn signing_input(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.index,
            self.hash,
            iso8601(&self.timestamp),
            self.validator_public_key
        )
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.validator_public_key == GENESIS_VALIDATOR_KEY
    }

    /// The unsigned, unhashed genesis skeleton. The ledger fills in `hash`
    /// at construction; previous_hash and validator key are sentinels.
    pub fn genesis_at(timestamp: UtcInstant) -> Block {
        Block {
            index: 0,
            timestamp,
            transactions: Vec::new(),
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            hash: String::new(),
            nonce: 0,
            validator_public_key: GENESIS_VALIDATOR_KEY.to_string(),
            validator_signature: String::new(),
        }
    }
}
