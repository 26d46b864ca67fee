use std::path::Path;

use aidchain_core::{AidError, AuditRecord, Shipment, Validator};

/// Persistent repository database backed by sled (pure-Rust, no C deps).
///
/// Named trees:
///   validators — id utf8 bytes                → bincode(Validator)
///   shipments  — id utf8 bytes                → bincode(Shipment)
///   audit      — ts nanos BE ++ id utf8 bytes → bincode(AuditRecord)
///
/// The chain itself is NOT stored here — it lives in the JSON snapshot so
/// the ledger stays replicable by file copy (see `snapshot`).
pub struct StateDb {
    _db: sled::Db,
    validators: sled::Tree,
    shipments: sled::Tree,
    audit: sled::Tree,
}

fn storage_err(e: impl std::fmt::Display) -> AidError {
    AidError::Storage(e.to_string())
}

fn codec_err(e: impl std::fmt::Display) -> AidError {
    AidError::Serialization(e.to_string())
}

impl StateDb {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AidError> {
        let db = sled::open(path).map_err(storage_err)?;
        let validators = db.open_tree("validators").map_err(storage_err)?;
        let shipments = db.open_tree("shipments").map_err(storage_err)?;
        let audit = db.open_tree("audit").map_err(storage_err)?;
        Ok(Self {
            _db: db,
            validators,
            shipments,
            audit,
        })
    }

    // ── Validators ───────────────────────────────────────────────────────────

    pub fn get_validator(&self, id: &str) -> Result<Option<Validator>, AidError> {
        match self.validators.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(codec_err)?)),
            None => Ok(None),
        }
    }

    pub fn put_validator(&self, validator: &Validator) -> Result<(), AidError> {
        let bytes = bincode::serialize(validator).map_err(codec_err)?;
        self.validators
            .insert(validator.id.as_bytes(), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_validators(&self) -> Result<Vec<Validator>, AidError> {
        let mut out = Vec::new();
        for item in self.validators.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(codec_err)?);
        }
        Ok(out)
    }

    // ── Shipments ────────────────────────────────────────────────────────────

    pub fn get_shipment(&self, id: &str) -> Result<Option<Shipment>, AidError> {
        match self.shipments.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(codec_err)?)),
            None => Ok(None),
        }
    }

    pub fn put_shipment(&self, shipment: &Shipment) -> Result<(), AidError> {
        let bytes = bincode::serialize(shipment).map_err(codec_err)?;
        self.shipments
            .insert(shipment.id.as_bytes(), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_shipments(&self) -> Result<Vec<Shipment>, AidError> {
        let mut out = Vec::new();
        for item in self.shipments.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(codec_err)?);
        }
        Ok(out)
    }

    // ── Audit ────────────────────────────────────────────────────────────────

    /// Append one audit record. The key orders the tree chronologically:
    /// big-endian timestamp nanos, then the record id as a tiebreak.
    pub fn append_audit(&self, record: &AuditRecord) -> Result<(), AidError> {
        let nanos = record
            .timestamp
            .timestamp_nanos_opt()
            .unwrap_or(i64::MAX);
        let mut key = nanos.to_be_bytes().to_vec();
        key.extend_from_slice(record.id.as_bytes());
        let bytes = bincode::serialize(record).map_err(codec_err)?;
        self.audit.insert(key, bytes).map_err(storage_err)?;
        Ok(())
    }

    /// All audit records in chronological key order.
    pub fn iter_audit(&self) -> Result<Vec<AuditRecord>, AidError> {
        let mut out = Vec::new();
        for item in self.audit.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(codec_err)?);
        }
        Ok(out)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), AidError> {
        self._db.flush().map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aidchain_core::ShipmentStatus;
    use chrono::Utc;

    fn temp_db(tag: &str) -> (StateDb, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("aidchain_db_{tag}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        (StateDb::open(&dir).unwrap(), dir)
    }

    #[test]
    fn validator_round_trip() {
        let (db, dir) = temp_db("validators");
        let v = Validator {
            id: "v1".into(),
            name: "warehouse-a".into(),
            public_key: "pk".into(),
            encrypted_private_key: "salt:iv:ct".into(),
            address: None,
            is_active: true,
            priority: 0,
            total_blocks_created: 0,
            last_block_created_at: None,
            created_at: Utc::now(),
        };
        db.put_validator(&v).unwrap();
        let loaded = db.get_validator("v1").unwrap().unwrap();
        assert_eq!(loaded.name, "warehouse-a");
        assert_eq!(db.iter_validators().unwrap().len(), 1);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn shipment_round_trip() {
        let (db, dir) = temp_db("shipments");
        let now = Utc::now();
        let s = Shipment {
            id: "s1".into(),
            origin: "Antwerp".into(),
            destination: "Goma".into(),
            recipient_id: "r1".into(),
            items: vec![],
            status: ShipmentStatus::Created,
            created_by: "c1".into(),
            created_at: now,
            updated_at: now,
            expected_delivery_at: None,
            qr_token: None,
        };
        db.put_shipment(&s).unwrap();
        assert_eq!(
            db.get_shipment("s1").unwrap().unwrap().status,
            ShipmentStatus::Created
        );
        assert!(db.get_shipment("missing").unwrap().is_none());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn audit_preserves_chronological_order() {
        let (db, dir) = temp_db("audit");
        let base = Utc::now();
        for (i, offset) in [2i64, 0, 1].iter().enumerate() {
            db.append_audit(&AuditRecord {
                id: format!("a{i}"),
                category: "Consensus".into(),
                action: "seal".into(),
                description: String::new(),
                principal_id: None,
                principal_name: None,
                entity_id: None,
                entity_type: None,
                metadata: None,
                ip_address: None,
                is_success: true,
                error_message: None,
                timestamp: base + chrono::Duration::seconds(*offset),
            })
            .unwrap();
        }
        let records = db.iter_audit().unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        let _ = std::fs::remove_dir_all(dir);
    }
}
