use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AidError;
use crate::types::{iso8601, UtcInstant};

// ── TxKind ───────────────────────────────────────────────────────────────────

/// Domain event kinds recorded on the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    ShipmentCreated,
    StatusUpdated,
    DeliveryConfirmed,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxKind::ShipmentCreated => write!(f, "ShipmentCreated"),
            TxKind::StatusUpdated => write!(f, "StatusUpdated"),
            TxKind::DeliveryConfirmed => write!(f, "DeliveryConfirmed"),
        }
    }
}

impl FromStr for TxKind {
    type Err = AidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ShipmentCreated" => Ok(TxKind::ShipmentCreated),
            "StatusUpdated" => Ok(TxKind::StatusUpdated),
            "DeliveryConfirmed" => Ok(TxKind::DeliveryConfirmed),
            other => Err(AidError::BadFormat(format!("unknown tx kind: {other}"))),
        }
    }
}

// ── Transaction ──────────────────────────────────────────────────────────────

/// A signed domain event. Immutable once signed: every field below except
/// `signature` is covered by the signature preimage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Opaque unique identifier.
    pub id: String,

    #[serde(rename = "type")]
    pub kind: TxKind,

    /// UTC instant the event was composed.
    pub timestamp: UtcInstant,

    /// Base64 SEC1 point of the sender's P-256 public key.
    pub sender_public_key: String,

    /// Canonical JSON (sorted keys) describing the event.
    pub payload: String,

    /// Base64 ECDSA signature over `signing_input()`. Empty string is the
    /// bootstrap sentinel: accepted only when signature enforcement is off.
    pub signature: String,
}

impl Transaction {
    /// The exact bytes covered by `signature`.
    pub fn signing_input(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.id,
            self.kind,
            iso8601(&self.timestamp),
            self.sender_public_key,
            self.payload
        )
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// Structural check: required fields must be present before the pool
    /// will even look at the signature.
    pub fn check_fields(&self) -> Result<(), AidError> {
        if self.id.is_empty() {
            return Err(AidError::BadTransaction("empty id".into()));
        }
        if self.sender_public_key.is_empty() {
            return Err(AidError::BadTransaction("empty sender public key".into()));
        }
        if self.payload.is_empty() {
            return Err(AidError::BadTransaction("empty payload".into()));
        }
        Ok(())
    }
}

/// Re-serialize a JSON document into canonical form: sorted object keys,
/// minimal whitespace, default number formatting. Two semantically equal
/// documents canonicalize to the same string, so signatures computed over
/// canonical payloads survive reserialization.
pub fn canonical_json(raw: &str) -> Result<String, AidError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| AidError::BadFormat(e.to_string()))?;
    serde_json::to_string(&value).map_err(|e| AidError::Serialization(e.to_string()))
}
