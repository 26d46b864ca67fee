use serde::{Deserialize, Serialize};

use aidchain_contracts::ExecutionResult;
use aidchain_core::{
    Block, Principal, Role, Shipment, ShipmentItem, Transaction, TxKind, UtcInstant, Validator,
};
use aidchain_ledger::{ValidationIssue, ValidationReport};

// ── Chain resources ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcTransaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub timestamp: UtcInstant,
    pub sender_public_key: String,
    pub payload: String,
    pub signature: String,
}

impl From<Transaction> for RpcTransaction {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            kind: tx.kind,
            timestamp: tx.timestamp,
            sender_public_key: tx.sender_public_key,
            payload: tx.payload,
            signature: tx.signature,
        }
    }
}

impl From<RpcTransaction> for Transaction {
    fn from(tx: RpcTransaction) -> Self {
        Self {
            id: tx.id,
            kind: tx.kind,
            timestamp: tx.timestamp,
            sender_public_key: tx.sender_public_key,
            payload: tx.payload,
            signature: tx.signature,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcBlock {
    pub index: u64,
    pub timestamp: UtcInstant,
    pub transactions: Vec<RpcTransaction>,
    pub previous_hash: String,
    pub hash: String,
    pub nonce: u64,
    pub validator_public_key: String,
    pub validator_signature: String,
}

impl From<Block> for RpcBlock {
    fn from(block: Block) -> Self {
        Self {
            index: block.index,
            timestamp: block.timestamp,
            transactions: block
                .transactions
                .into_iter()
                .map(RpcTransaction::from)
                .collect(),
            previous_hash: block.previous_hash,
            hash: block.hash,
            nonce: block.nonce,
            validator_public_key: block.validator_public_key,
            validator_signature: block.validator_signature,
        }
    }
}

// ── Validation ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcValidationIssue {
    pub block_index: u64,
    pub kind: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcValidationReport {
    pub is_valid: bool,
    pub block_count: usize,
    pub errors: Vec<RpcValidationIssue>,
}

impl From<ValidationReport> for RpcValidationReport {
    fn from(report: ValidationReport) -> Self {
        Self {
            is_valid: report.is_valid,
            block_count: report.block_count,
            errors: report.errors.into_iter().map(RpcValidationIssue::from).collect(),
        }
    }
}

impl From<ValidationIssue> for RpcValidationIssue {
    fn from(issue: ValidationIssue) -> Self {
        Self {
            block_index: issue.block_index,
            kind: issue.kind,
            message: issue.message,
        }
    }
}

// ── Consensus resources ──────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcConsensusStatus {
    pub chain_height: u64,
    pub pending: usize,
    pub active_validator_count: usize,
    pub head_hash: String,
    pub head_timestamp: UtcInstant,
    pub current_proposer_id: Option<String>,
    pub failed_ticks: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcSealResult {
    pub success: bool,
    pub block_index: u64,
    pub block_hash: String,
    pub transaction_count: usize,
    pub validator_id: String,
    pub validator_name: String,
}

/// Validator view without the encrypted key material.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcValidator {
    pub id: String,
    pub name: String,
    pub public_key: String,
    pub address: Option<String>,
    pub is_active: bool,
    pub priority: u32,
    pub total_blocks_created: u64,
    pub last_block_created_at: Option<UtcInstant>,
    pub created_at: UtcInstant,
}

impl From<Validator> for RpcValidator {
    fn from(v: Validator) -> Self {
        Self {
            id: v.id,
            name: v.name,
            public_key: v.public_key,
            address: v.address,
            is_active: v.is_active,
            priority: v.priority,
            total_blocks_created: v.total_blocks_created,
            last_block_created_at: v.last_block_created_at,
            created_at: v.created_at,
        }
    }
}

// ── Shipment resources ───────────────────────────────────────────────────────

/// A caller identity forwarded by the (external) authorization layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcPrincipal {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub public_key: String,
}

impl From<RpcPrincipal> for Principal {
    fn from(p: RpcPrincipal) -> Self {
        Self {
            id: p.id,
            name: p.name,
            role: p.role,
            public_key: p.public_key,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcShipmentItem {
    pub name: String,
    pub quantity: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcNewShipment {
    pub id: String,
    pub origin: String,
    pub destination: String,
    pub recipient_id: String,
    pub items: Vec<RpcShipmentItem>,
    pub expected_delivery_at: Option<UtcInstant>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcShipment {
    pub id: String,
    pub origin: String,
    pub destination: String,
    pub recipient_id: String,
    pub items: Vec<RpcShipmentItem>,
    pub status: String,
    pub created_by: String,
    pub created_at: UtcInstant,
    pub updated_at: UtcInstant,
    pub expected_delivery_at: Option<UtcInstant>,
    pub qr_token: Option<String>,
}

impl From<Shipment> for RpcShipment {
    fn from(s: Shipment) -> Self {
        Self {
            id: s.id,
            origin: s.origin,
            destination: s.destination,
            recipient_id: s.recipient_id,
            items: s
                .items
                .into_iter()
                .map(|i| RpcShipmentItem {
                    name: i.name,
                    quantity: i.quantity,
                })
                .collect(),
            status: s.status.to_string(),
            created_by: s.created_by,
            created_at: s.created_at,
            updated_at: s.updated_at,
            expected_delivery_at: s.expected_delivery_at,
            qr_token: s.qr_token,
        }
    }
}

impl From<RpcShipmentItem> for ShipmentItem {
    fn from(i: RpcShipmentItem) -> Self {
        Self {
            name: i.name,
            quantity: i.quantity,
        }
    }
}

/// Contract outcome summary carried on shipment operation responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcContractResult {
    pub contract_id: String,
    pub success: bool,
    pub error: Option<String>,
    pub events: Vec<String>,
}

impl From<&ExecutionResult> for RpcContractResult {
    fn from(r: &ExecutionResult) -> Self {
        Self {
            contract_id: r.contract_id.clone(),
            success: r.success,
            error: r.error.clone(),
            events: r.events.iter().map(|e| e.name.clone()).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcShipmentOutcome {
    pub shipment: RpcShipment,
    pub transaction_id: String,
    pub contract_results: Vec<RpcContractResult>,
}
