//! Shipment-tracking contract.
//!
//! Mirrors the shipment lifecycle on contract state so consumers can audit
//! transitions without touching the repository layer. Advisory: the
//! orchestrator owns the authoritative state machine; this contract
//! re-checks it and emits events.

use std::collections::HashMap;

use aidchain_core::{iso8601, ShipmentStatus, TxKind};

use crate::contract::{Contract, ContractEvent, ExecutionContext, ExecutionResult};

pub struct ShipmentTrackingContract;

const ID: &str = "shipment-tracking";

fn status_key(shipment_id: &str) -> String {
    format!("shipment_{shipment_id}_status")
}

fn str_field<'a>(payload: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

impl Contract for ShipmentTrackingContract {
    fn id(&self) -> &str {
        ID
    }

    fn name(&self) -> &str {
        "Shipment Tracking"
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn description(&self) -> &str {
        "Tracks shipment lifecycle transitions and flags invalid ones"
    }

    fn can_execute(&self, ctx: &ExecutionContext) -> bool {
        matches!(
            ctx.transaction.kind,
            TxKind::ShipmentCreated | TxKind::StatusUpdated
        ) && ctx
            .payload()
            .map(|p| p.get("shipmentId").is_some())
            .unwrap_or(false)
    }

    fn execute(&self, ctx: &ExecutionContext, state: &HashMap<String, String>) -> ExecutionResult {
        let Some(payload) = ctx.payload() else {
            return ExecutionResult::fail(ID, "payload is not valid JSON");
        };
        let Some(shipment_id) = str_field(&payload, "shipmentId") else {
            return ExecutionResult::fail(ID, "payload missing shipmentId");
        };

        match ctx.transaction.kind {
            TxKind::ShipmentCreated => self.on_created(ctx, &payload, shipment_id),
            TxKind::StatusUpdated => self.on_status_updated(ctx, &payload, shipment_id, state),
            _ => ExecutionResult::fail(ID, "not applicable"),
        }
    }
}

impl ShipmentTrackingContract {
    fn on_created(
        &self,
        ctx: &ExecutionContext,
        payload: &serde_json::Value,
        shipment_id: &str,
    ) -> ExecutionResult {
        for required in ["origin", "destination", "recipientId"] {
            if str_field(payload, required).is_none() {
                return ExecutionResult::fail(ID, format!("payload missing {required}"));
            }
        }

        let created_by = str_field(payload, "createdBy")
            .unwrap_or(&ctx.transaction.sender_public_key)
            .to_string();

        let mut status = ShipmentStatus::Created;
        let mut result = ExecutionResult::ok(ID);

        // A manifest supplied up front lets validation happen immediately.
        let item_count = payload
            .get("items")
            .and_then(|v| v.as_array())
            .map(|items| items.len())
            .unwrap_or(0);
        if item_count > 0 {
            status = ShipmentStatus::Validated;
            result = result.with_event(
                ContractEvent::new("ShipmentAutoValidated")
                    .with("shipmentId", shipment_id)
                    .with("itemCount", item_count.to_string()),
            );
        }

        result
            .with_delta(status_key(shipment_id), status.to_string())
            .with_delta(format!("shipment_{shipment_id}_createdBy"), created_by)
            .with_delta(
                format!("shipment_{shipment_id}_createdAt"),
                iso8601(&ctx.transaction.timestamp),
            )
            .with_output(format!("shipment {shipment_id} registered as {status}"))
    }

    fn on_status_updated(
        &self,
        ctx: &ExecutionContext,
        payload: &serde_json::Value,
        shipment_id: &str,
        state: &HashMap<String, String>,
    ) -> ExecutionResult {
        let Some(new_status) = str_field(payload, "newStatus") else {
            return ExecutionResult::fail(ID, "payload missing newStatus");
        };
        let Ok(new_status) = new_status.parse::<ShipmentStatus>() else {
            return ExecutionResult::fail(ID, format!("unknown status {new_status}"));
        };

        let Some(prior) = state
            .get(&status_key(shipment_id))
            .and_then(|s| s.parse::<ShipmentStatus>().ok())
        else {
            return ExecutionResult::fail(ID, format!("no recorded status for {shipment_id}"));
        };

        if !prior.can_transition_to(new_status) {
            return ExecutionResult::fail(
                ID,
                format!("invalid transition {prior} -> {new_status}"),
            )
            .with_event(
                ContractEvent::new("InvalidStateTransition")
                    .with("shipmentId", shipment_id)
                    .with("from", prior.to_string())
                    .with("to", new_status.to_string()),
            );
        }

        let mut result = ExecutionResult::ok(ID)
            .with_delta(status_key(shipment_id), new_status.to_string())
            .with_delta(
                format!("shipment_{shipment_id}_updatedAt"),
                iso8601(&ctx.transaction.timestamp),
            )
            .with_output(format!("shipment {shipment_id}: {prior} -> {new_status}"));

        if new_status == ShipmentStatus::Delivered {
            result = result.with_event(
                ContractEvent::new("ShipmentReachedDestination").with("shipmentId", shipment_id),
            );
        }
        result
    }
}
