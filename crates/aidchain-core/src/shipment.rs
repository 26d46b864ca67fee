use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AidError;
use crate::types::UtcInstant;

// ── ShipmentStatus ───────────────────────────────────────────────────────────

/// The shipment lifecycle. Linear with exactly one successor per state;
/// `Confirmed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipmentStatus {
    Created,
    Validated,
    InTransit,
    Delivered,
    Confirmed,
}

impl ShipmentStatus {
    /// The only status this one may advance to, if any.
    pub fn successor(&self) -> Option<ShipmentStatus> {
        match self {
            ShipmentStatus::Created => Some(ShipmentStatus::Validated),
            ShipmentStatus::Validated => Some(ShipmentStatus::InTransit),
            ShipmentStatus::InTransit => Some(ShipmentStatus::Delivered),
            ShipmentStatus::Delivered => Some(ShipmentStatus::Confirmed),
            ShipmentStatus::Confirmed => None,
        }
    }

    pub fn can_transition_to(&self, next: ShipmentStatus) -> bool {
        self.successor() == Some(next)
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShipmentStatus::Created => write!(f, "Created"),
            ShipmentStatus::Validated => write!(f, "Validated"),
            ShipmentStatus::InTransit => write!(f, "InTransit"),
            ShipmentStatus::Delivered => write!(f, "Delivered"),
            ShipmentStatus::Confirmed => write!(f, "Confirmed"),
        }
    }
}

impl FromStr for ShipmentStatus {
    type Err = AidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(ShipmentStatus::Created),
            "Validated" => Ok(ShipmentStatus::Validated),
            "InTransit" => Ok(ShipmentStatus::InTransit),
            "Delivered" => Ok(ShipmentStatus::Delivered),
            "Confirmed" => Ok(ShipmentStatus::Confirmed),
            other => Err(AidError::BadFormat(format!("unknown shipment status: {other}"))),
        }
    }
}

// ── Shipment ─────────────────────────────────────────────────────────────────

/// One line item in a shipment manifest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub name: String,
    pub quantity: u32,
}

/// A tracked aid shipment. The repository row is the source of truth for
/// status; the chain records the transition history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Shipment {
    pub id: String,
    pub origin: String,
    pub destination: String,
    /// Principal id of the assigned recipient — the only party that may
    /// confirm delivery.
    pub recipient_id: String,
    pub items: Vec<ShipmentItem>,
    pub status: ShipmentStatus,
    pub created_by: String,
    pub created_at: UtcInstant,
    pub updated_at: UtcInstant,
    pub expected_delivery_at: Option<UtcInstant>,
    /// Opaque secret embedded in the shipment's QR label; presented back at
    /// delivery confirmation. Generation/encoding of the image is external.
    pub qr_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_is_linear() {
        let order = [
            ShipmentStatus::Created,
            ShipmentStatus::Validated,
            ShipmentStatus::InTransit,
            ShipmentStatus::Delivered,
            ShipmentStatus::Confirmed,
        ];
        for pair in order.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]));
        }
        assert_eq!(ShipmentStatus::Confirmed.successor(), None);
    }

    #[test]
    fn skipping_states_is_rejected() {
        assert!(!ShipmentStatus::Created.can_transition_to(ShipmentStatus::Delivered));
        assert!(!ShipmentStatus::Delivered.can_transition_to(ShipmentStatus::InTransit));
        assert!(!ShipmentStatus::Created.can_transition_to(ShipmentStatus::Created));
    }

    #[test]
    fn status_round_trips_display() {
        for s in ["Created", "Validated", "InTransit", "Delivered", "Confirmed"] {
            assert_eq!(s.parse::<ShipmentStatus>().unwrap().to_string(), s);
        }
        assert!("Shipped".parse::<ShipmentStatus>().is_err());
    }
}
