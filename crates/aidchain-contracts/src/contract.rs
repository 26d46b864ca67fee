use std::collections::HashMap;

use aidchain_core::{Block, Transaction};

/// Read-only inputs for one contract execution: the triggering transaction,
/// optionally the containing block, and orchestration data supplied by the
/// caller (assigned recipient, expected QR token, …).
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    pub transaction: Transaction,
    pub block: Option<Block>,
    pub data: HashMap<String, String>,
}

impl ExecutionContext {
    pub fn new(transaction: Transaction) -> Self {
        Self {
            transaction,
            block: None,
            data: HashMap::new(),
        }
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.block = Some(block);
        self
    }

    pub fn with_data(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// Parse the transaction payload as JSON. `None` when it is not valid
    /// JSON — contracts treat that as not-applicable or a failed execution,
    /// never a panic.
    pub fn payload(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.transaction.payload).ok()
    }
}

/// An event emitted by a contract execution. Observed only through the
/// execution result; the engine does no post-processing.
#[derive(Clone, Debug, PartialEq)]
pub struct ContractEvent {
    pub name: String,
    pub data: HashMap<String, String>,
}

impl ContractEvent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: HashMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

/// Outcome of one execution. A failed result carries an error and never a
/// state delta.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    pub contract_id: String,
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    pub state_delta: HashMap<String, String>,
    pub events: Vec<ContractEvent>,
}

impl ExecutionResult {
    pub fn ok(contract_id: &str) -> Self {
        Self {
            contract_id: contract_id.to_string(),
            success: true,
            output: None,
            error: None,
            state_delta: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn fail(contract_id: &str, error: impl Into<String>) -> Self {
        Self {
            contract_id: contract_id.to_string(),
            success: false,
            output: None,
            error: Some(error.into()),
            state_delta: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_delta(mut self, key: String, value: String) -> Self {
        self.state_delta.insert(key, value);
        self
    }

    pub fn with_event(mut self, event: ContractEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.events.iter().any(|e| e.name == name)
    }
}

/// A deployable contract: a named, versioned handler with a pure
/// applicability predicate and a deterministic execute step.
///
/// `execute` receives a snapshot of the contract's current state and
/// proposes mutations through the result's `state_delta`; it never writes
/// state directly. Determinism: same context + same state → same result.
pub trait Contract: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn description(&self) -> &str;

    fn can_execute(&self, ctx: &ExecutionContext) -> bool;
    fn execute(&self, ctx: &ExecutionContext, state: &HashMap<String, String>) -> ExecutionResult;
}
