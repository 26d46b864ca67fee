use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use crate::types::{
    RpcBlock, RpcConsensusStatus, RpcNewShipment, RpcPrincipal, RpcSealResult, RpcShipment,
    RpcShipmentOutcome, RpcTransaction, RpcValidationReport, RpcValidator,
};

/// Aidchain JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "aid_" via `namespace = "aid"`.
/// Chain reads are public; sealing and registration are bound behind the
/// deployment's authorization layer, which lives outside this crate.
#[rpc(server, namespace = "aid")]
pub trait AidchainApi {
    /// The full chain, genesis first.
    #[method(name = "getChain")]
    async fn get_chain(&self) -> RpcResult<Vec<RpcBlock>>;

    /// One block by index, or null.
    #[method(name = "getBlock")]
    async fn get_block(&self, index: u64) -> RpcResult<Option<RpcBlock>>;

    /// One transaction (sealed or pending) by id, or null.
    #[method(name = "getTransaction")]
    async fn get_transaction(&self, id: String) -> RpcResult<Option<RpcTransaction>>;

    /// Snapshot of the pending pool, oldest first.
    #[method(name = "getPendingTransactions")]
    async fn get_pending_transactions(&self) -> RpcResult<Vec<RpcTransaction>>;

    /// Re-run full chain validation.
    #[method(name = "validateChain")]
    async fn validate_chain(&self) -> RpcResult<RpcValidationReport>;

    /// Consensus status: height, pool size, validator count, head, proposer.
    #[method(name = "getConsensusStatus")]
    async fn get_consensus_status(&self) -> RpcResult<RpcConsensusStatus>;

    /// Force a seal with the given validator password.
    #[method(name = "createBlock")]
    async fn create_block(&self, validator_password: String) -> RpcResult<RpcSealResult>;

    /// Re-check one block against its predecessor.
    #[method(name = "validateBlock")]
    async fn validate_block(&self, index: u64) -> RpcResult<bool>;

    /// Every registered validator (no key material).
    #[method(name = "getValidators")]
    async fn get_validators(&self) -> RpcResult<Vec<RpcValidator>>;

    /// Register a validator; its private key is encrypted under `passphrase`.
    #[method(name = "registerValidator")]
    async fn register_validator(
        &self,
        name: String,
        passphrase: String,
        priority: u32,
    ) -> RpcResult<RpcValidator>;

    /// Submit an externally signed transaction to the pending pool.
    /// Returns the transaction id.
    #[method(name = "submitTransaction")]
    async fn submit_transaction(&self, transaction: RpcTransaction) -> RpcResult<String>;

    // ── Sessions ─────────────────────────────────────────────────────────────

    /// Decrypt a principal's key under `passphrase` and hold it in the
    /// session table for signing. Called once at login by the gateway.
    #[method(name = "openSession")]
    async fn open_session(
        &self,
        principal_id: String,
        encrypted_private_key: String,
        passphrase: String,
    ) -> RpcResult<bool>;

    /// Drop a principal's session key (logout).
    #[method(name = "closeSession")]
    async fn close_session(&self, principal_id: String) -> RpcResult<bool>;

    // ── Shipments ────────────────────────────────────────────────────────────

    /// Register a shipment on behalf of a Coordinator/Admin principal.
    #[method(name = "createShipment")]
    async fn create_shipment(
        &self,
        principal: RpcPrincipal,
        shipment: RpcNewShipment,
    ) -> RpcResult<RpcShipmentOutcome>;

    /// Advance a shipment along its lifecycle.
    #[method(name = "updateShipmentStatus")]
    async fn update_shipment_status(
        &self,
        principal: RpcPrincipal,
        shipment_id: String,
        new_status: String,
    ) -> RpcResult<RpcShipmentOutcome>;

    /// Confirm delivery; only the assigned recipient may call.
    #[method(name = "confirmDelivery")]
    async fn confirm_delivery(
        &self,
        principal: RpcPrincipal,
        shipment_id: String,
        qr_token: Option<String>,
    ) -> RpcResult<RpcShipmentOutcome>;

    /// One shipment row, or null.
    #[method(name = "getShipment")]
    async fn get_shipment(&self, id: String) -> RpcResult<Option<RpcShipment>>;

    /// All sealed transactions mentioning the shipment, in chain order.
    #[method(name = "getShipmentHistory")]
    async fn get_shipment_history(&self, id: String) -> RpcResult<Vec<RpcTransaction>>;
}
