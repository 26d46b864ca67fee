//! Delivery-verification contract.
//!
//! Checks a delivery confirmation against the orchestration data the caller
//! places in the context: the assigned recipient, the expected QR token,
//! and the promised delivery date.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use aidchain_core::{iso8601, TxKind};

use crate::contract::{Contract, ContractEvent, ExecutionContext, ExecutionResult};

pub struct DeliveryVerificationContract;

const ID: &str = "delivery-verification";

/// Context data keys the orchestrator fills in.
pub const CTX_ASSIGNED_RECIPIENT: &str = "assignedRecipientId";
pub const CTX_EXPECTED_QR_TOKEN: &str = "expectedQrToken";
pub const CTX_EXPECTED_DELIVERY_DATE: &str = "expectedDeliveryDate";

impl Contract for DeliveryVerificationContract {
    fn id(&self) -> &str {
        ID
    }

    fn name(&self) -> &str {
        "Delivery Verification"
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn description(&self) -> &str {
        "Verifies recipient identity and timeliness of delivery confirmations"
    }

    fn can_execute(&self, ctx: &ExecutionContext) -> bool {
        ctx.transaction.kind == TxKind::DeliveryConfirmed
            && ctx
                .payload()
                .map(|p| p.get("shipmentId").is_some())
                .unwrap_or(false)
    }

    fn execute(&self, ctx: &ExecutionContext, _state: &HashMap<String, String>) -> ExecutionResult {
        let Some(payload) = ctx.payload() else {
            return ExecutionResult::fail(ID, "payload is not valid JSON");
        };
        let Some(shipment_id) = payload.get("shipmentId").and_then(|v| v.as_str()) else {
            return ExecutionResult::fail(ID, "payload missing shipmentId");
        };
        let claimed_recipient = payload
            .get("recipientId")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        // Recipient identity is non-negotiable.
        match ctx.data.get(CTX_ASSIGNED_RECIPIENT) {
            Some(assigned) if assigned == claimed_recipient => {}
            Some(_) => {
                return ExecutionResult::fail(
                    ID,
                    format!("recipient {claimed_recipient} is not assigned to {shipment_id}"),
                );
            }
            None => {
                return ExecutionResult::fail(ID, "context missing assigned recipient");
            }
        }

        // Optional QR cross-check.
        if let Some(expected_token) = ctx.data.get(CTX_EXPECTED_QR_TOKEN) {
            let presented = payload.get("qrToken").and_then(|v| v.as_str());
            if presented != Some(expected_token.as_str()) {
                return ExecutionResult::fail(ID, "QR token mismatch").with_event(
                    ContractEvent::new("QRCodeVerificationFailed").with("shipmentId", shipment_id),
                );
            }
        }

        // On-time vs delayed, measured against the promised date when known.
        let confirmed_at = ctx.transaction.timestamp;
        let delayed = ctx
            .data
            .get(CTX_EXPECTED_DELIVERY_DATE)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|expected| confirmed_at > expected.with_timezone(&Utc));

        let mut result = ExecutionResult::ok(ID)
            .with_delta(
                format!("shipment_{shipment_id}_deliveryConfirmedAt"),
                iso8601(&confirmed_at),
            )
            .with_delta(
                format!("shipment_{shipment_id}_confirmedBy"),
                claimed_recipient.to_string(),
            );

        if delayed == Some(true) {
            result = result
                .with_event(
                    ContractEvent::new("DeliveryDelayed")
                        .with("shipmentId", shipment_id)
                        .with("confirmedAt", iso8601(&confirmed_at)),
                )
                .with_output(format!("delivery of {shipment_id} confirmed late"));
        } else {
            result = result
                .with_event(
                    ContractEvent::new("DeliveryVerified")
                        .with("shipmentId", shipment_id)
                        .with("recipientId", claimed_recipient),
                )
                .with_output(format!("delivery of {shipment_id} verified"));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aidchain_core::Transaction;
    use chrono::Duration;

    fn confirm_tx(qr_token: Option<&str>) -> Transaction {
        let mut payload = serde_json::json!({
            "shipmentId": "s1",
            "recipientId": "r1",
        });
        if let Some(token) = qr_token {
            payload["qrToken"] = serde_json::json!(token);
        }
        Transaction {
            id: "t1".into(),
            kind: TxKind::DeliveryConfirmed,
            timestamp: Utc::now(),
            sender_public_key: "pk".into(),
            payload: payload.to_string(),
            signature: String::new(),
        }
    }

    fn base_ctx(qr_token: Option<&str>) -> ExecutionContext {
        ExecutionContext::new(confirm_tx(qr_token)).with_data(CTX_ASSIGNED_RECIPIENT, "r1")
    }

    #[test]
    fn matching_recipient_verifies() {
        let contract = DeliveryVerificationContract;
        let ctx = base_ctx(None);
        assert!(contract.can_execute(&ctx));
        let result = contract.execute(&ctx, &HashMap::new());
        assert!(result.success);
        assert!(result.has_event("DeliveryVerified"));
        assert!(result
            .state_delta
            .contains_key("shipment_s1_deliveryConfirmedAt"));
    }

    #[test]
    fn wrong_recipient_fails() {
        let contract = DeliveryVerificationContract;
        let ctx =
            ExecutionContext::new(confirm_tx(None)).with_data(CTX_ASSIGNED_RECIPIENT, "someone-else");
        let result = contract.execute(&ctx, &HashMap::new());
        assert!(!result.success);
        assert!(result.state_delta.is_empty());
    }

    #[test]
    fn qr_mismatch_emits_failure_event() {
        let contract = DeliveryVerificationContract;
        let ctx = base_ctx(Some("wrong-token")).with_data(CTX_EXPECTED_QR_TOKEN, "right-token");
        let result = contract.execute(&ctx, &HashMap::new());
        assert!(!result.success);
        assert!(result.has_event("QRCodeVerificationFailed"));
    }

    #[test]
    fn qr_match_verifies() {
        let contract = DeliveryVerificationContract;
        let ctx = base_ctx(Some("token-42")).with_data(CTX_EXPECTED_QR_TOKEN, "token-42");
        let result = contract.execute(&ctx, &HashMap::new());
        assert!(result.success);
        assert!(result.has_event("DeliveryVerified"));
    }

    #[test]
    fn late_confirmation_is_delayed() {
        let contract = DeliveryVerificationContract;
        let expected = Utc::now() - Duration::days(2);
        let ctx = base_ctx(None).with_data(CTX_EXPECTED_DELIVERY_DATE, expected.to_rfc3339());
        let result = contract.execute(&ctx, &HashMap::new());
        assert!(result.success);
        assert!(result.has_event("DeliveryDelayed"));
        assert!(!result.has_event("DeliveryVerified"));
    }

    #[test]
    fn on_time_confirmation_is_verified() {
        let contract = DeliveryVerificationContract;
        let expected = Utc::now() + Duration::days(2);
        let ctx = base_ctx(None).with_data(CTX_EXPECTED_DELIVERY_DATE, expected.to_rfc3339());
        let result = contract.execute(&ctx, &HashMap::new());
        assert!(result.success);
        assert!(result.has_event("DeliveryVerified"));
    }

    #[test]
    fn other_kinds_not_applicable() {
        let contract = DeliveryVerificationContract;
        let mut tx = confirm_tx(None);
        tx.kind = TxKind::StatusUpdated;
        assert!(!contract.can_execute(&ExecutionContext::new(tx)));
    }
}
