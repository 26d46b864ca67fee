use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// UTC instant used across the ledger. Alias so call sites read like the
/// domain rather than like chrono.
pub type UtcInstant = DateTime<Utc>;

/// Canonical ISO 8601 rendering of an instant, microsecond precision,
/// trailing `Z`. This exact string enters hash and signature preimages, so
/// every producer must go through here.
pub fn iso8601(ts: &UtcInstant) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ── Role ─────────────────────────────────────────────────────────────────────

/// Access role of a principal. Token issuance and password checks live
/// outside the core; the orchestrator only sees the resolved role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Coordinator,
    Recipient,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "Admin"),
            Role::Coordinator => write!(f, "Coordinator"),
            Role::Recipient => write!(f, "Recipient"),
        }
    }
}

// ── Principal ────────────────────────────────────────────────────────────────

/// A resolved caller identity. Resolution (credentials, tokens) is the
/// transport's problem; the core trusts what it is handed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub name: String,
    pub role: Role,
    /// Base64 SEC1 point of the principal's P-256 public key.
    pub public_key: String,
}

impl Principal {
    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Coordinator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn iso8601_is_stable_micros_z() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(iso8601(&ts), "2026-03-14T09:26:53.000000Z");
    }

    #[test]
    fn staff_roles() {
        let mut p = Principal {
            id: "u1".into(),
            name: "ops".into(),
            role: Role::Coordinator,
            public_key: String::new(),
        };
        assert!(p.is_staff());
        p.role = Role::Recipient;
        assert!(!p.is_staff());
    }
}
