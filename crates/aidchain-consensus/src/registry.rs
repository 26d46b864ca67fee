use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::info;

use aidchain_core::{AidError, Validator};
use aidchain_crypto::{sha256_hex, KeyPair};
use aidchain_state::StateDb;
use aidchain_vault::encrypt_key;

/// The authority set.
///
/// Rows live in the `validators` sled tree; every read-modify-write goes
/// through the registry lock so proposer selection and the statistics
/// update that follows it cannot interleave with another sealer.
pub struct ValidatorRegistry {
    db: Arc<StateDb>,
    lock: Mutex<()>,
}

impl ValidatorRegistry {
    pub fn new(db: Arc<StateDb>) -> Self {
        Self {
            db,
            lock: Mutex::new(()),
        }
    }

    /// Register a new validator: fresh P-256 keypair, private key encrypted
    /// under `passphrase`, active from the start. Name and public key must
    /// be unique.
    pub fn register(
        &self,
        name: &str,
        passphrase: &str,
        priority: u32,
        address: Option<String>,
    ) -> Result<Validator, AidError> {
        let _guard = self.lock();

        let keypair = KeyPair::generate();
        for existing in self.db.iter_validators()? {
            if existing.name == name {
                return Err(AidError::DuplicateValidatorName(name.to_string()));
            }
            if existing.public_key == keypair.public_key {
                return Err(AidError::DuplicateValidatorKey);
            }
        }

        let validator = Validator {
            id: format!("val-{}", &sha256_hex(keypair.public_key.as_bytes())[..16]),
            name: name.to_string(),
            public_key: keypair.public_key.clone(),
            encrypted_private_key: encrypt_key(keypair.private_key(), passphrase),
            address,
            is_active: true,
            priority,
            total_blocks_created: 0,
            last_block_created_at: None,
            created_at: Utc::now(),
        };
        self.db.put_validator(&validator)?;
        info!(id = %validator.id, name = %validator.name, "validator registered");
        Ok(validator)
    }

    pub fn get(&self, id: &str) -> Result<Option<Validator>, AidError> {
        self.db.get_validator(id)
    }

    pub fn all(&self) -> Result<Vec<Validator>, AidError> {
        self.db.iter_validators()
    }

    /// Active validators ordered by priority, then registration age.
    pub fn get_active_ordered(&self) -> Result<Vec<Validator>, AidError> {
        let mut active: Vec<Validator> = self
            .db
            .iter_validators()?
            .into_iter()
            .filter(|v| v.is_active)
            .collect();
        active.sort_by_key(|v| (v.priority, v.created_at));
        Ok(active)
    }

    /// Exact round-robin: the active validator with the fewest sealed
    /// blocks, ties broken by priority then age. `None` when the active set
    /// is empty.
    pub fn next_proposer(&self) -> Result<Option<Validator>, AidError> {
        let _guard = self.lock();
        Ok(self
            .db
            .iter_validators()?
            .into_iter()
            .filter(|v| v.is_active)
            .min_by_key(|v| v.selection_key()))
    }

    /// Bump the proposer's statistics after a sealed block.
    pub fn record_block_creation(&self, id: &str) -> Result<(), AidError> {
        let _guard = self.lock();
        let mut validator = self
            .db
            .get_validator(id)?
            .ok_or_else(|| AidError::NotFound(format!("validator {id}")))?;
        validator.total_blocks_created += 1;
        validator.last_block_created_at = Some(Utc::now());
        self.db.put_validator(&validator)
    }

    pub fn set_active(&self, id: &str, active: bool) -> Result<(), AidError> {
        self.update(id, |v| v.is_active = active)
    }

    pub fn update_priority(&self, id: &str, priority: u32) -> Result<(), AidError> {
        self.update(id, |v| v.priority = priority)
    }

    pub fn update_address(&self, id: &str, address: Option<String>) -> Result<(), AidError> {
        self.update(id, |v| v.address = address.clone())
    }

    fn update(&self, id: &str, f: impl Fn(&mut Validator)) -> Result<(), AidError> {
        let _guard = self.lock();
        let mut validator = self
            .db
            .get_validator(id)?
            .ok_or_else(|| AidError::NotFound(format!("validator {id}")))?;
        f(&mut validator);
        self.db.put_validator(&validator)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lock.lock().expect("registry lock poisoned")
    }
}
