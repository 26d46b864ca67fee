use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use aidchain_consensus::PoaEngine;
use aidchain_core::AidError;
use aidchain_shipments::{NewShipment, ShipmentService};
use aidchain_vault::decrypt_key;

use crate::api::AidchainApiServer;
use crate::types::{
    RpcBlock, RpcConsensusStatus, RpcContractResult, RpcNewShipment, RpcPrincipal, RpcSealResult,
    RpcShipment, RpcShipmentOutcome, RpcTransaction, RpcValidationReport, RpcValidator,
};

/// Map a core error onto a JSON-RPC error object. Domain rejections are
/// invalid-params; storage trouble is an internal error.
fn rpc_err(e: AidError) -> ErrorObject<'static> {
    let code = match e {
        AidError::Storage(_)
        | AidError::Serialization(_)
        | AidError::PersistenceUnavailable(_)
        | AidError::BackgroundTickFailed(_) => -32603,
        _ => -32602,
    };
    ErrorObject::owned(code, e.to_string(), None::<()>)
}

/// Shared state handed to the RPC server.
pub struct RpcServerState {
    pub engine: Arc<PoaEngine>,
    pub shipments: Arc<ShipmentService>,
    /// Sealing-loop failure counter, surfaced in the status resource.
    pub failed_ticks: Arc<AtomicU64>,
}

/// The RPC server implementation.
pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr` with permissive CORS headers.
    /// Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }
}

#[async_trait]
impl AidchainApiServer for RpcServer {
    async fn get_chain(&self) -> RpcResult<Vec<RpcBlock>> {
        Ok(self
            .state
            .engine
            .ledger()
            .chain()
            .into_iter()
            .map(RpcBlock::from)
            .collect())
    }

    async fn get_block(&self, index: u64) -> RpcResult<Option<RpcBlock>> {
        Ok(self
            .state
            .engine
            .ledger()
            .block_by_index(index)
            .map(RpcBlock::from))
    }

    async fn get_transaction(&self, id: String) -> RpcResult<Option<RpcTransaction>> {
        Ok(self
            .state
            .engine
            .ledger()
            .transaction_by_id(&id)
            .map(RpcTransaction::from))
    }

    async fn get_pending_transactions(&self) -> RpcResult<Vec<RpcTransaction>> {
        Ok(self
            .state
            .engine
            .ledger()
            .pending()
            .into_iter()
            .map(RpcTransaction::from)
            .collect())
    }

    async fn validate_chain(&self) -> RpcResult<RpcValidationReport> {
        Ok(self.state.engine.ledger().validate_chain().into())
    }

    async fn get_consensus_status(&self) -> RpcResult<RpcConsensusStatus> {
        let status = self.state.engine.status().map_err(rpc_err)?;
        Ok(RpcConsensusStatus {
            chain_height: status.chain_height,
            pending: status.pending,
            active_validator_count: status.active_validator_count,
            head_hash: status.head_hash,
            head_timestamp: status.head_timestamp,
            current_proposer_id: status.current_proposer_id,
            failed_ticks: self.state.failed_ticks.load(Ordering::Relaxed),
        })
    }

    async fn create_block(&self, validator_password: String) -> RpcResult<RpcSealResult> {
        let outcome = self
            .state
            .engine
            .seal_next_block(&validator_password)
            .await
            .map_err(rpc_err)?;
        Ok(RpcSealResult {
            success: true,
            block_index: outcome.block.index,
            block_hash: outcome.block.hash,
            transaction_count: outcome.block.transactions.len(),
            validator_id: outcome.validator_id,
            validator_name: outcome.validator_name,
        })
    }

    async fn validate_block(&self, index: u64) -> RpcResult<bool> {
        self.state
            .engine
            .validate_block_at(index)
            .map_err(rpc_err)
    }

    async fn get_validators(&self) -> RpcResult<Vec<RpcValidator>> {
        Ok(self
            .state
            .engine
            .registry()
            .all()
            .map_err(rpc_err)?
            .into_iter()
            .map(RpcValidator::from)
            .collect())
    }

    async fn register_validator(
        &self,
        name: String,
        passphrase: String,
        priority: u32,
    ) -> RpcResult<RpcValidator> {
        let validator = self
            .state
            .engine
            .registry()
            .register(&name, &passphrase, priority, None)
            .map_err(rpc_err)?;
        Ok(validator.into())
    }

    async fn submit_transaction(&self, transaction: RpcTransaction) -> RpcResult<String> {
        let tx: aidchain_core::Transaction = transaction.into();
        let id = tx.id.clone();
        self.state
            .engine
            .ledger()
            .add_transaction(tx)
            .map_err(rpc_err)?;
        Ok(id)
    }

    // ── Sessions ─────────────────────────────────────────────────────────────

    async fn open_session(
        &self,
        principal_id: String,
        encrypted_private_key: String,
        passphrase: String,
    ) -> RpcResult<bool> {
        let private_key = decrypt_key(&encrypted_private_key, &passphrase).map_err(rpc_err)?;
        self.state
            .shipments
            .sessions()
            .put(&principal_id, private_key);
        Ok(true)
    }

    async fn close_session(&self, principal_id: String) -> RpcResult<bool> {
        self.state.shipments.sessions().remove(&principal_id);
        Ok(true)
    }

    // ── Shipments ────────────────────────────────────────────────────────────

    async fn create_shipment(
        &self,
        principal: RpcPrincipal,
        shipment: RpcNewShipment,
    ) -> RpcResult<RpcShipmentOutcome> {
        let outcome = self
            .state
            .shipments
            .create_shipment(
                &principal.into(),
                NewShipment {
                    id: shipment.id,
                    origin: shipment.origin,
                    destination: shipment.destination,
                    recipient_id: shipment.recipient_id,
                    items: shipment.items.into_iter().map(Into::into).collect(),
                    expected_delivery_at: shipment.expected_delivery_at,
                },
            )
            .map_err(rpc_err)?;
        Ok(outcome_to_rpc(outcome))
    }

    async fn update_shipment_status(
        &self,
        principal: RpcPrincipal,
        shipment_id: String,
        new_status: String,
    ) -> RpcResult<RpcShipmentOutcome> {
        let status = new_status
            .parse::<aidchain_core::ShipmentStatus>()
            .map_err(rpc_err)?;
        let outcome = self
            .state
            .shipments
            .update_status(&principal.into(), &shipment_id, status)
            .map_err(rpc_err)?;
        Ok(outcome_to_rpc(outcome))
    }

    async fn confirm_delivery(
        &self,
        principal: RpcPrincipal,
        shipment_id: String,
        qr_token: Option<String>,
    ) -> RpcResult<RpcShipmentOutcome> {
        let outcome = self
            .state
            .shipments
            .confirm_delivery(&principal.into(), &shipment_id, qr_token.as_deref())
            .map_err(rpc_err)?;
        Ok(outcome_to_rpc(outcome))
    }

    async fn get_shipment(&self, id: String) -> RpcResult<Option<RpcShipment>> {
        Ok(self
            .state
            .shipments
            .get_shipment(&id)
            .map_err(rpc_err)?
            .map(RpcShipment::from))
    }

    async fn get_shipment_history(&self, id: String) -> RpcResult<Vec<RpcTransaction>> {
        Ok(self
            .state
            .shipments
            .history(&id)
            .into_iter()
            .map(RpcTransaction::from)
            .collect())
    }
}

fn outcome_to_rpc(outcome: aidchain_shipments::OperationOutcome) -> RpcShipmentOutcome {
    RpcShipmentOutcome {
        shipment: outcome.shipment.into(),
        transaction_id: outcome.transaction.id,
        contract_results: outcome
            .contract_results
            .iter()
            .map(RpcContractResult::from)
            .collect(),
    }
}
