//! Shipment lifecycle orchestration.
//!
//! The authoritative state machine lives here, not in the contract layer:
//! every domain operation is role-checked, validated against the shipment
//! row, mirrored into a signed ledger transaction, run past the deployed
//! contracts (advisory), and audited.

use std::sync::Arc;

use chrono::Utc;
use rand::RngCore;
use tracing::info;

use aidchain_audit::AuditSink;
use aidchain_contracts::delivery_verification::{
    CTX_ASSIGNED_RECIPIENT, CTX_EXPECTED_DELIVERY_DATE, CTX_EXPECTED_QR_TOKEN,
};
use aidchain_contracts::{ContractEngine, ExecutionContext, ExecutionResult};
use aidchain_core::{
    iso8601, AidError, AuditQuery, AuditRecord, Principal, Role, Shipment, ShipmentItem,
    ShipmentStatus, Transaction, TxKind,
};
use aidchain_crypto::{sha256_hex, sign};
use aidchain_ledger::Ledger;
use aidchain_state::StateDb;
use aidchain_vault::SessionKeyTable;

/// Inputs for registering a new shipment.
#[derive(Clone, Debug)]
pub struct NewShipment {
    pub id: String,
    pub origin: String,
    pub destination: String,
    pub recipient_id: String,
    pub items: Vec<ShipmentItem>,
    pub expected_delivery_at: Option<aidchain_core::UtcInstant>,
}

/// Outcome of a domain operation: the updated row, the ledger transaction
/// that records it, and the advisory contract results.
#[derive(Debug)]
pub struct OperationOutcome {
    pub shipment: Shipment,
    pub transaction: Transaction,
    pub contract_results: Vec<ExecutionResult>,
}

pub struct ShipmentService {
    db: Arc<StateDb>,
    ledger: Arc<Ledger>,
    contracts: Arc<ContractEngine>,
    sessions: SessionKeyTable,
    audit: AuditSink,
    /// Bootstrap mode: compose sentinel-signed transactions for principals
    /// with no session key. Only meaningful while transaction-signature
    /// enforcement is off.
    allow_sentinel_signatures: bool,
}

impl ShipmentService {
    pub fn new(
        db: Arc<StateDb>,
        ledger: Arc<Ledger>,
        contracts: Arc<ContractEngine>,
        sessions: SessionKeyTable,
        audit: AuditSink,
        allow_sentinel_signatures: bool,
    ) -> Self {
        Self {
            db,
            ledger,
            contracts,
            sessions,
            audit,
            allow_sentinel_signatures,
        }
    }

    pub fn sessions(&self) -> &SessionKeyTable {
        &self.sessions
    }

    // ── Create ───────────────────────────────────────────────────────────────

    pub fn create_shipment(
        &self,
        principal: &Principal,
        new: NewShipment,
    ) -> Result<OperationOutcome, AidError> {
        self.require_staff(principal, "create_shipment", &new.id)?;

        if self.db.get_shipment(&new.id)?.is_some() {
            return Err(AidError::Duplicate(format!("shipment {}", new.id)));
        }

        let now = Utc::now();
        // A manifest supplied at registration validates the shipment
        // immediately, mirroring the tracking contract's auto-advance.
        let initial_status = if new.items.is_empty() {
            ShipmentStatus::Created
        } else {
            ShipmentStatus::Validated
        };
        let shipment = Shipment {
            id: new.id.clone(),
            origin: new.origin,
            destination: new.destination,
            recipient_id: new.recipient_id,
            items: new.items,
            status: initial_status,
            created_by: principal.id.clone(),
            created_at: now,
            updated_at: now,
            expected_delivery_at: new.expected_delivery_at,
            qr_token: Some(generate_qr_token()),
        };
        self.db.put_shipment(&shipment)?;

        let mut payload = serde_json::json!({
            "shipmentId": shipment.id,
            "origin": shipment.origin,
            "destination": shipment.destination,
            "recipientId": shipment.recipient_id,
            "createdBy": principal.id,
            "items": shipment
                .items
                .iter()
                .map(|i| serde_json::json!({"name": i.name, "quantity": i.quantity}))
                .collect::<Vec<_>>(),
        });
        if let Some(expected) = &shipment.expected_delivery_at {
            payload["expectedDeliveryDate"] = serde_json::json!(iso8601(expected));
        }

        let transaction =
            self.sign_and_submit(principal, TxKind::ShipmentCreated, &payload.to_string())?;
        let contract_results = self
            .contracts
            .execute_applicable(&ExecutionContext::new(transaction.clone()));

        info!(shipment = %shipment.id, by = %principal.name, "shipment created");
        self.audit.emit(
            AuditRecord::success(
                "Shipment",
                "create",
                format!("shipment {} registered ({} -> {})", shipment.id, shipment.origin, shipment.destination),
            )
            .with_principal(&principal.id, &principal.name)
            .with_entity(&shipment.id, "Shipment"),
        );

        Ok(OperationOutcome {
            shipment,
            transaction,
            contract_results,
        })
    }

    // ── Advance status ───────────────────────────────────────────────────────

    pub fn update_status(
        &self,
        principal: &Principal,
        shipment_id: &str,
        new_status: ShipmentStatus,
    ) -> Result<OperationOutcome, AidError> {
        self.require_staff(principal, "update_status", shipment_id)?;

        let mut shipment = self
            .db
            .get_shipment(shipment_id)?
            .ok_or_else(|| AidError::NotFound(format!("shipment {shipment_id}")))?;

        let prior = shipment.status;
        if !prior.can_transition_to(new_status) {
            self.audit.emit(
                AuditRecord::failure(
                    "Shipment",
                    "update_status",
                    format!("rejected transition for {shipment_id}"),
                    format!("{prior} -> {new_status}"),
                )
                .with_principal(&principal.id, &principal.name)
                .with_entity(shipment_id, "Shipment"),
            );
            return Err(AidError::InvalidStateTransition {
                from: prior.to_string(),
                to: new_status.to_string(),
            });
        }

        shipment.status = new_status;
        shipment.updated_at = Utc::now();
        self.db.put_shipment(&shipment)?;

        let payload = serde_json::json!({
            "shipmentId": shipment.id,
            "previousStatus": prior.to_string(),
            "newStatus": new_status.to_string(),
            "updatedBy": principal.id,
        });
        let transaction =
            self.sign_and_submit(principal, TxKind::StatusUpdated, &payload.to_string())?;
        let contract_results = self
            .contracts
            .execute_applicable(&ExecutionContext::new(transaction.clone()));

        info!(shipment = %shipment.id, %prior, status = %new_status, "shipment status advanced");
        self.audit.emit(
            AuditRecord::success(
                "Shipment",
                "update_status",
                format!("shipment {} advanced {prior} -> {new_status}", shipment.id),
            )
            .with_principal(&principal.id, &principal.name)
            .with_entity(&shipment.id, "Shipment"),
        );

        Ok(OperationOutcome {
            shipment,
            transaction,
            contract_results,
        })
    }

    // ── Confirm delivery ─────────────────────────────────────────────────────

    /// Only the assigned recipient confirms, and only from `Delivered`.
    /// When the shipment carries a QR token, the presented token must match.
    pub fn confirm_delivery(
        &self,
        principal: &Principal,
        shipment_id: &str,
        qr_token: Option<&str>,
    ) -> Result<OperationOutcome, AidError> {
        let mut shipment = self
            .db
            .get_shipment(shipment_id)?
            .ok_or_else(|| AidError::NotFound(format!("shipment {shipment_id}")))?;

        if principal.role != Role::Recipient || principal.id != shipment.recipient_id {
            self.audit_denied(principal, "confirm_delivery", shipment_id);
            return Err(AidError::Unauthorized(format!(
                "only the assigned recipient may confirm shipment {shipment_id}"
            )));
        }

        let prior = shipment.status;
        if !prior.can_transition_to(ShipmentStatus::Confirmed) {
            return Err(AidError::InvalidStateTransition {
                from: prior.to_string(),
                to: ShipmentStatus::Confirmed.to_string(),
            });
        }

        if let Some(expected) = &shipment.qr_token {
            if qr_token != Some(expected.as_str()) {
                self.audit.emit(
                    AuditRecord::failure(
                        "Shipment",
                        "confirm_delivery",
                        format!("QR verification failed for {shipment_id}"),
                        "presented token does not match",
                    )
                    .with_principal(&principal.id, &principal.name)
                    .with_entity(shipment_id, "Shipment"),
                );
                return Err(AidError::Unauthorized("QR token mismatch".into()));
            }
        }

        shipment.status = ShipmentStatus::Confirmed;
        shipment.updated_at = Utc::now();
        self.db.put_shipment(&shipment)?;

        let mut payload = serde_json::json!({
            "shipmentId": shipment.id,
            "recipientId": principal.id,
            "confirmedBy": principal.id,
        });
        if let Some(token) = qr_token {
            payload["qrToken"] = serde_json::json!(token);
        }

        let transaction =
            self.sign_and_submit(principal, TxKind::DeliveryConfirmed, &payload.to_string())?;

        let mut ctx = ExecutionContext::new(transaction.clone())
            .with_data(CTX_ASSIGNED_RECIPIENT, shipment.recipient_id.clone());
        if let Some(expected) = &shipment.qr_token {
            ctx = ctx.with_data(CTX_EXPECTED_QR_TOKEN, expected.clone());
        }
        if let Some(expected_at) = &shipment.expected_delivery_at {
            ctx = ctx.with_data(CTX_EXPECTED_DELIVERY_DATE, expected_at.to_rfc3339());
        }
        let contract_results = self.contracts.execute_applicable(&ctx);

        info!(shipment = %shipment.id, recipient = %principal.name, "delivery confirmed");
        self.audit.emit(
            AuditRecord::success(
                "Shipment",
                "confirm_delivery",
                format!("delivery of {} confirmed by recipient", shipment.id),
            )
            .with_principal(&principal.id, &principal.name)
            .with_entity(&shipment.id, "Shipment"),
        );

        Ok(OperationOutcome {
            shipment,
            transaction,
            contract_results,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn get_shipment(&self, id: &str) -> Result<Option<Shipment>, AidError> {
        self.db.get_shipment(id)
    }

    pub fn list_shipments(&self) -> Result<Vec<Shipment>, AidError> {
        self.db.iter_shipments()
    }

    /// Query the audit trail of shipment operations.
    pub fn audit_query(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>, AidError> {
        self.audit.query(query)
    }

    /// Reconstruct a shipment's on-chain history: every sealed transaction
    /// whose canonical payload mentions the shipment id (quoted substring
    /// match), in chain order.
    pub fn history(&self, shipment_id: &str) -> Vec<Transaction> {
        let needle = format!("\"{shipment_id}\"");
        self.ledger
            .chain()
            .into_iter()
            .flat_map(|block| block.transactions)
            .filter(|tx| tx.payload.contains(&needle))
            .collect()
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn require_staff(
        &self,
        principal: &Principal,
        action: &str,
        entity: &str,
    ) -> Result<(), AidError> {
        if principal.is_staff() {
            return Ok(());
        }
        self.audit_denied(principal, action, entity);
        Err(AidError::Unauthorized(format!(
            "{} role may not {action}",
            principal.role
        )))
    }

    fn audit_denied(&self, principal: &Principal, action: &str, entity: &str) {
        self.audit.emit(
            AuditRecord::failure(
                "Shipment",
                action,
                format!("{action} denied for {}", principal.name),
                format!("role {} not permitted", principal.role),
            )
            .with_principal(&principal.id, &principal.name)
            .with_entity(entity, "Shipment"),
        );
    }

    /// Compose, sign, and submit the ledger transaction for one operation.
    /// The id commits to kind, sender, payload, and the timestamp, so two
    /// operations never collide.
    fn sign_and_submit(
        &self,
        principal: &Principal,
        kind: TxKind,
        payload: &str,
    ) -> Result<Transaction, AidError> {
        let timestamp = Utc::now();
        let digest = sha256_hex(
            format!(
                "{kind}|{}|{payload}|{}",
                principal.public_key,
                iso8601(&timestamp)
            )
            .as_bytes(),
        );

        let mut transaction = Transaction {
            id: format!("tx-{}", &digest[..32]),
            kind,
            timestamp,
            sender_public_key: principal.public_key.clone(),
            payload: payload.to_string(),
            signature: String::new(),
        };

        match self.sessions.get(&principal.id) {
            Some(private_key) => {
                transaction.signature =
                    sign(&private_key, transaction.signing_input().as_bytes()).map_err(|_| {
                        AidError::Unauthorized(format!(
                            "session key for {} cannot sign",
                            principal.id
                        ))
                    })?;
            }
            None if self.allow_sentinel_signatures => {
                // Bootstrap mode: the pool accepts the sentinel only while
                // signature enforcement is off.
            }
            None => {
                return Err(AidError::Unauthorized(format!(
                    "no session key for principal {}",
                    principal.id
                )));
            }
        }

        self.ledger.add_transaction(transaction.clone())?;
        Ok(transaction)
    }
}

/// Opaque token embedded in the shipment's QR label.
fn generate_qr_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
