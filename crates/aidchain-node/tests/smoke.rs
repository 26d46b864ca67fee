//! End-to-end smoke tests for aidchain-node.
//!
//! Each test starts a real node process with a fresh data directory, drives
//! it over JSON-RPC, and asserts on observable chain state.
//!
//! Run with:
//!   cargo test -p aidchain-node --test smoke

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use aidchain_core::Role;
use aidchain_crypto::KeyPair;
use aidchain_vault::encrypt_key;

// ── Node lifecycle ────────────────────────────────────────────────────────────

struct NodeGuard {
    child: Child,
    data_dir: PathBuf,
    remove_on_drop: bool,
}

impl NodeGuard {
    fn stop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        self.stop();
        if self.remove_on_drop {
            let _ = std::fs::remove_dir_all(&self.data_dir);
        }
    }
}

/// Find a free TCP port on loopback.
fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn start_node(data_dir: &PathBuf, rpc_port: u16) -> NodeGuard {
    let node_bin = env!("CARGO_BIN_EXE_aidchain-node");
    let child = Command::new(node_bin)
        .args([
            "--data-dir",
            data_dir.to_str().unwrap(),
            "--rpc-addr",
            &format!("127.0.0.1:{rpc_port}"),
            // Seals only on explicit request so tests stay deterministic.
            "--disable-auto-seal",
            "--validator-password",
            "service-pw",
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn aidchain-node");

    NodeGuard {
        child,
        data_dir: data_dir.clone(),
        remove_on_drop: true,
    }
}

// ── RPC helpers ───────────────────────────────────────────────────────────────

async fn rpc_call(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let json = rpc_call_raw(client, url, method, params).await;
    if let Some(err) = json.get("error") {
        panic!("RPC error from {method}: {err}");
    }
    json["result"].clone()
}

async fn rpc_call_raw(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    });
    let resp = client
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap_or_else(|e| panic!("RPC call {method} failed: {e}"));
    resp.json().await.expect("parse RPC JSON")
}

/// Poll until the RPC server responds or the timeout elapses.
async fn wait_for_rpc(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "aid_getConsensusStatus",
            "params": [],
            "id": 1
        });
        if let Ok(resp) = client.post(url).json(&body).send().await {
            if resp.status().is_success() {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    false
}

fn principal_json(id: &str, role: Role, public_key: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": format!("{id}-name"),
        "role": format!("{role:?}"),
        "public_key": public_key,
    })
}

/// Register a principal's session key over RPC: encrypt locally the way an
/// account store would hold it, then open the session.
async fn open_session(client: &reqwest::Client, url: &str, id: &str) -> KeyPair {
    let keypair = KeyPair::generate();
    let encrypted = encrypt_key(keypair.private_key(), "login-pw");
    let ok = rpc_call(
        client,
        url,
        "aid_openSession",
        serde_json::json!([id, encrypted, "login-pw"]),
    )
    .await;
    assert_eq!(ok, serde_json::json!(true));
    keypair
}

// ── Scenario: fresh node serves a genesis-only chain ──────────────────────────

#[tokio::test]
async fn genesis_only_chain() {
    let data_dir = std::env::temp_dir().join(format!("aidchain_e2e_genesis_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&data_dir);
    let rpc_port = free_port();
    let url = format!("http://127.0.0.1:{rpc_port}");
    let _node = start_node(&data_dir, rpc_port);

    let http = reqwest::Client::new();
    assert!(wait_for_rpc(&http, &url, Duration::from_secs(20)).await);

    let chain = rpc_call(&http, &url, "aid_getChain", serde_json::json!([])).await;
    let blocks = chain.as_array().unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0]["index"], 0);
    assert_eq!(blocks[0]["previous_hash"], "0");
    assert_eq!(blocks[0]["validator_public_key"], "GENESIS");
    assert!(blocks[0]["transactions"].as_array().unwrap().is_empty());

    let report = rpc_call(&http, &url, "aid_validateChain", serde_json::json!([])).await;
    assert_eq!(report["is_valid"], true);
    assert_eq!(report["block_count"], 1);
    assert!(report["errors"].as_array().unwrap().is_empty());

    // Nothing pending, nothing sealable.
    let pending = rpc_call(&http, &url, "aid_getPendingTransactions", serde_json::json!([])).await;
    assert!(pending.as_array().unwrap().is_empty());
    let err = rpc_call_raw(&http, &url, "aid_createBlock", serde_json::json!(["service-pw"])).await;
    assert!(err["error"]["message"]
        .as_str()
        .unwrap()
        .contains("no pending transactions"));
}

// ── Scenario: full shipment lifecycle across sealed blocks ────────────────────

#[tokio::test]
async fn shipment_lifecycle_seals_and_tracks() {
    let data_dir =
        std::env::temp_dir().join(format!("aidchain_e2e_lifecycle_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&data_dir);
    let rpc_port = free_port();
    let url = format!("http://127.0.0.1:{rpc_port}");
    let _node = start_node(&data_dir, rpc_port);

    let http = reqwest::Client::new();
    assert!(wait_for_rpc(&http, &url, Duration::from_secs(20)).await);

    // ── Validators: v1 (priority 0) and v2 (priority 1) ──────────────────────
    let v1 = rpc_call(
        &http,
        &url,
        "aid_registerValidator",
        serde_json::json!(["warehouse-north", "service-pw", 0]),
    )
    .await;
    let v2 = rpc_call(
        &http,
        &url,
        "aid_registerValidator",
        serde_json::json!(["warehouse-south", "service-pw", 1]),
    )
    .await;
    let v1_id = v1["id"].as_str().unwrap().to_string();
    let v2_id = v2["id"].as_str().unwrap().to_string();

    // ── Principals: coordinator creates, recipient confirms ──────────────────
    let coordinator_kp = open_session(&http, &url, "coord-1").await;
    let recipient_kp = open_session(&http, &url, "recip-1").await;
    let coordinator = principal_json("coord-1", Role::Coordinator, &coordinator_kp.public_key);
    let recipient = principal_json("recip-1", Role::Recipient, &recipient_kp.public_key);

    // ── Create a shipment and seal block 1 ───────────────────────────────────
    let outcome = rpc_call(
        &http,
        &url,
        "aid_createShipment",
        serde_json::json!([coordinator.clone(), {
            "id": "SHP-001",
            "origin": "Rotterdam",
            "destination": "Juba",
            "recipient_id": "recip-1",
            "items": [],
            "expected_delivery_at": null,
        }]),
    )
    .await;
    assert_eq!(outcome["shipment"]["status"], "Created");
    let qr_token = outcome["shipment"]["qr_token"].as_str().unwrap().to_string();

    let seal = rpc_call(&http, &url, "aid_createBlock", serde_json::json!(["service-pw"])).await;
    assert_eq!(seal["success"], true);
    assert_eq!(seal["transaction_count"], 1);
    assert_eq!(seal["validator_id"], v1_id, "priority 0 proposes first");

    // ── Invalid jump straight to Delivered is rejected ───────────────────────
    let err = rpc_call_raw(
        &http,
        &url,
        "aid_updateShipmentStatus",
        serde_json::json!([coordinator.clone(), "SHP-001", "Delivered"]),
    )
    .await;
    assert!(err["error"]["message"]
        .as_str()
        .unwrap()
        .contains("invalid shipment state transition"));
    let shipment = rpc_call(&http, &url, "aid_getShipment", serde_json::json!(["SHP-001"])).await;
    assert_eq!(shipment["status"], "Created");

    // ── Walk the lifecycle; seal after each step to exercise round-robin ─────
    let mut sealers = vec![];
    for status in ["Validated", "InTransit", "Delivered"] {
        let outcome = rpc_call(
            &http,
            &url,
            "aid_updateShipmentStatus",
            serde_json::json!([coordinator.clone(), "SHP-001", status]),
        )
        .await;
        assert_eq!(outcome["shipment"]["status"], status);
        let seal =
            rpc_call(&http, &url, "aid_createBlock", serde_json::json!(["service-pw"])).await;
        sealers.push(seal["validator_id"].as_str().unwrap().to_string());
    }
    // Seals 2..4 rotate v2, v1, v2 (after v1 took block 1).
    assert_eq!(sealers, vec![v2_id.clone(), v1_id.clone(), v2_id.clone()]);

    // ── Recipient confirms with the QR token ─────────────────────────────────
    let outcome = rpc_call(
        &http,
        &url,
        "aid_confirmDelivery",
        serde_json::json!([recipient.clone(), "SHP-001", qr_token]),
    )
    .await;
    assert_eq!(outcome["shipment"]["status"], "Confirmed");
    let results = outcome["contract_results"].as_array().unwrap();
    assert!(results.iter().any(|r| {
        r["contract_id"] == "delivery-verification"
            && r["events"].as_array().unwrap().iter().any(|e| e == "DeliveryVerified")
    }));

    rpc_call(&http, &url, "aid_createBlock", serde_json::json!(["service-pw"])).await;

    // ── Chain state: 6 blocks, fair validator split, clean validation ────────
    let status = rpc_call(&http, &url, "aid_getConsensusStatus", serde_json::json!([])).await;
    assert_eq!(status["chain_height"], 6);
    assert_eq!(status["pending"], 0);
    assert_eq!(status["active_validator_count"], 2);

    let validators = rpc_call(&http, &url, "aid_getValidators", serde_json::json!([])).await;
    let blocks_by_id = |id: &str| {
        validators
            .as_array()
            .unwrap()
            .iter()
            .find(|v| v["id"] == id)
            .unwrap()["total_blocks_created"]
            .as_u64()
            .unwrap()
    };
    // v1 sealed blocks 1, 3, 5; v2 sealed 2, 4.
    assert_eq!(blocks_by_id(&v1_id), 3);
    assert_eq!(blocks_by_id(&v2_id), 2);

    let report = rpc_call(&http, &url, "aid_validateChain", serde_json::json!([])).await;
    assert_eq!(report["is_valid"], true);
    assert_eq!(report["block_count"], 6);

    // Every block individually re-validates.
    for index in 0..6 {
        let ok = rpc_call(&http, &url, "aid_validateBlock", serde_json::json!([index])).await;
        assert_eq!(ok, serde_json::json!(true), "block {index}");
    }

    // ── History: every lifecycle transaction mentions the shipment ──────────
    let history = rpc_call(
        &http,
        &url,
        "aid_getShipmentHistory",
        serde_json::json!(["SHP-001"]),
    )
    .await;
    assert_eq!(history.as_array().unwrap().len(), 5);

    // Confirmed is terminal: no further transition is accepted.
    let err = rpc_call_raw(
        &http,
        &url,
        "aid_updateShipmentStatus",
        serde_json::json!([coordinator, "SHP-001", "Validated"]),
    )
    .await;
    assert!(err["error"]["message"]
        .as_str()
        .unwrap()
        .contains("invalid shipment state transition"));
}

// ── Scenario: chain survives a restart via the snapshot ───────────────────────

#[tokio::test]
async fn persistence_round_trip() {
    let data_dir =
        std::env::temp_dir().join(format!("aidchain_e2e_persist_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&data_dir);
    let rpc_port = free_port();
    let url = format!("http://127.0.0.1:{rpc_port}");
    let http = reqwest::Client::new();

    let head_hash;
    {
        let mut node = start_node(&data_dir, rpc_port);
        node.remove_on_drop = false;
        assert!(wait_for_rpc(&http, &url, Duration::from_secs(20)).await);

        rpc_call(
            &http,
            &url,
            "aid_registerValidator",
            serde_json::json!(["solo", "service-pw", 0]),
        )
        .await;
        let coordinator_kp = open_session(&http, &url, "coord-1").await;
        let coordinator = principal_json("coord-1", Role::Coordinator, &coordinator_kp.public_key);

        // Two blocks with one transaction each.
        for (i, step) in [("SHP-A", None), ("SHP-A", Some("Validated"))].iter().enumerate() {
            match step.1 {
                None => {
                    rpc_call(
                        &http,
                        &url,
                        "aid_createShipment",
                        serde_json::json!([coordinator.clone(), {
                            "id": step.0,
                            "origin": "Antwerp",
                            "destination": "Goma",
                            "recipient_id": "recip-1",
                            "items": [],
                            "expected_delivery_at": null,
                        }]),
                    )
                    .await;
                }
                Some(status) => {
                    rpc_call(
                        &http,
                        &url,
                        "aid_updateShipmentStatus",
                        serde_json::json!([coordinator.clone(), step.0, status]),
                    )
                    .await;
                }
            }
            let seal =
                rpc_call(&http, &url, "aid_createBlock", serde_json::json!(["service-pw"])).await;
            assert_eq!(seal["block_index"], (i + 1) as u64);
        }

        let chain = rpc_call(&http, &url, "aid_getChain", serde_json::json!([])).await;
        head_hash = chain.as_array().unwrap()[2]["hash"].as_str().unwrap().to_string();
        node.stop();
    }

    // ── Restart on the same data dir; auto-load reconstitutes the chain ──────
    let rpc_port2 = free_port();
    let url2 = format!("http://127.0.0.1:{rpc_port2}");
    let _node2 = start_node(&data_dir, rpc_port2);
    assert!(wait_for_rpc(&http, &url2, Duration::from_secs(20)).await);

    let chain = rpc_call(&http, &url2, "aid_getChain", serde_json::json!([])).await;
    let blocks = chain.as_array().unwrap();
    assert_eq!(blocks.len(), 3, "genesis + 2 sealed blocks");
    assert_eq!(blocks[2]["hash"].as_str().unwrap(), head_hash);

    let report = rpc_call(&http, &url2, "aid_validateChain", serde_json::json!([])).await;
    assert_eq!(report["is_valid"], true);
    assert_eq!(report["block_count"], 3);

    let _ = std::fs::remove_dir_all(&data_dir);
}
