use thiserror::Error;

#[derive(Debug, Error)]
pub enum AidError {
    // ── Validation ───────────────────────────────────────────────────────────
    #[error("bad transaction: {0}")]
    BadTransaction(String),

    #[error("invalid signature on transaction {0}")]
    InvalidSignature(String),

    #[error("invalid hash on block {index}: stored {stored}, computed {computed}")]
    InvalidHash {
        index: u64,
        stored: String,
        computed: String,
    },

    #[error("invalid block index: expected {expected}, got {got}")]
    InvalidBlockIndex { expected: u64, got: u64 },

    #[error("invalid previous hash on block {index}")]
    InvalidPreviousHash { index: u64 },

    #[error("invalid block signature on block {index}")]
    InvalidBlockSignature { index: u64 },

    #[error("invalid shipment state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("duplicate transaction: {0}")]
    Duplicate(String),

    // ── Availability ─────────────────────────────────────────────────────────
    #[error("no pending transactions to seal")]
    EmptyPool,

    #[error("no active validators")]
    NoValidators,

    // ── Authorization ────────────────────────────────────────────────────────
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    // ── Integrity ────────────────────────────────────────────────────────────
    #[error("corrupt chain snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("bad format: {0}")]
    BadFormat(String),

    // ── Transient ────────────────────────────────────────────────────────────
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("background tick failed: {0}")]
    BackgroundTickFailed(String),

    // ── Lookup ───────────────────────────────────────────────────────────────
    #[error("not found: {0}")]
    NotFound(String),

    // ── Registry ─────────────────────────────────────────────────────────────
    #[error("validator name already registered: {0}")]
    DuplicateValidatorName(String),

    #[error("validator public key already registered")]
    DuplicateValidatorKey,

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl AidError {
    /// Kinds the sealing loop absorbs locally: it logs, bumps the failure
    /// counter, and waits for the next tick instead of dying.
    pub fn is_recoverable_tick_failure(&self) -> bool {
        matches!(
            self,
            AidError::EmptyPool
                | AidError::NoValidators
                | AidError::PersistenceUnavailable(_)
                | AidError::BackgroundTickFailed(_)
        )
    }
}
