use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, warn};

use aidchain_core::AidError;

use crate::contract::{Contract, ExecutionContext, ExecutionResult};

/// Deployment-time metadata, served to introspection callers.
#[derive(Clone, Debug)]
pub struct ContractMeta {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
}

struct Deployed {
    contract: Arc<dyn Contract>,
    /// Isolated per-contract state; the lock covers execute + delta commit.
    state: Mutex<HashMap<String, String>>,
}

/// Holds deployed contracts and runs them.
///
/// `execute_applicable` visits contracts in deployment order; each
/// successful result's delta is applied to that contract's state under its
/// own lock, so one contract's failure or slowness never touches another's
/// state.
#[derive(Default)]
pub struct ContractEngine {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    order: Vec<String>,
    deployed: HashMap<String, Arc<Deployed>>,
}

impl ContractEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy a contract. Ids are unique; redeploying an id is an error.
    pub fn deploy(&self, contract: Arc<dyn Contract>) -> Result<(), AidError> {
        let mut inner = self.write();
        let id = contract.id().to_string();
        if inner.deployed.contains_key(&id) {
            return Err(AidError::Duplicate(format!("contract {id}")));
        }
        debug!(contract = %id, name = contract.name(), "contract deployed");
        inner.order.push(id.clone());
        inner.deployed.insert(
            id,
            Arc::new(Deployed {
                contract,
                state: Mutex::new(HashMap::new()),
            }),
        );
        Ok(())
    }

    pub fn undeploy(&self, id: &str) -> Result<(), AidError> {
        let mut inner = self.write();
        if inner.deployed.remove(id).is_none() {
            return Err(AidError::NotFound(format!("contract {id}")));
        }
        inner.order.retain(|existing| existing != id);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<ContractMeta> {
        self.read().deployed.get(id).map(|d| meta(&d.contract))
    }

    /// All deployed contracts in deployment order.
    pub fn all(&self) -> Vec<ContractMeta> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.deployed.get(id))
            .map(|d| meta(&d.contract))
            .collect()
    }

    /// Execute one contract by id, committing its delta on success.
    pub fn execute(&self, id: &str, ctx: &ExecutionContext) -> Result<ExecutionResult, AidError> {
        let deployed = self
            .read()
            .deployed
            .get(id)
            .cloned()
            .ok_or_else(|| AidError::NotFound(format!("contract {id}")))?;
        Ok(run_one(&deployed, ctx))
    }

    /// Execute every deployed contract whose `can_execute` accepts `ctx`,
    /// in deployment order, collecting all results. A failed contract is
    /// reported in its result slot; it never stops the iteration.
    pub fn execute_applicable(&self, ctx: &ExecutionContext) -> Vec<ExecutionResult> {
        let applicable: Vec<Arc<Deployed>> = {
            let inner = self.read();
            inner
                .order
                .iter()
                .filter_map(|id| inner.deployed.get(id))
                .filter(|d| d.contract.can_execute(ctx))
                .cloned()
                .collect()
        };

        applicable.iter().map(|d| run_one(d, ctx)).collect()
    }

    /// Snapshot of one contract's isolated state.
    pub fn state_of(&self, id: &str) -> Option<HashMap<String, String>> {
        self.read()
            .deployed
            .get(id)
            .map(|d| d.state.lock().expect("contract state lock poisoned").clone())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("contract engine lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("contract engine lock poisoned")
    }
}

fn meta(contract: &Arc<dyn Contract>) -> ContractMeta {
    ContractMeta {
        id: contract.id().to_string(),
        name: contract.name().to_string(),
        version: contract.version().to_string(),
        description: contract.description().to_string(),
    }
}

/// Execute under the contract's state lock and commit the delta atomically.
/// Failed executions leave the state exactly as it was.
fn run_one(deployed: &Deployed, ctx: &ExecutionContext) -> ExecutionResult {
    let mut state = deployed
        .state
        .lock()
        .expect("contract state lock poisoned");
    let result = deployed.contract.execute(ctx, &state);
    if result.success {
        for (key, value) in &result.state_delta {
            state.insert(key.clone(), value.clone());
        }
    } else {
        warn!(
            contract = deployed.contract.id(),
            tx = %ctx.transaction.id,
            error = result.error.as_deref().unwrap_or("unknown"),
            "contract execution failed"
        );
    }
    result
}
