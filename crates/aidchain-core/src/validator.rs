use serde::{Deserialize, Serialize};

use crate::types::UtcInstant;

/// One authority node allowed to seal blocks.
///
/// The private key is stored only in its encrypted container; decryption
/// happens in the vault at sealing time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Validator {
    pub id: String,
    pub name: String,
    /// Base64 SEC1 point. Unique across the registry.
    pub public_key: String,
    /// `base64(salt):base64(iv):base64(ciphertext)` container.
    pub encrypted_private_key: String,
    pub address: Option<String>,
    pub is_active: bool,
    /// Lower value wins proposer ties.
    pub priority: u32,
    pub total_blocks_created: u64,
    pub last_block_created_at: Option<UtcInstant>,
    pub created_at: UtcInstant,
}

impl Validator {
    /// Round-robin ordering key: fewest blocks first, then priority, then
    /// registration age. The lexicographic minimum is the next proposer.
    pub fn selection_key(&self) -> (u64, u32, UtcInstant) {
        (self.total_blocks_created, self.priority, self.created_at)
    }
}
