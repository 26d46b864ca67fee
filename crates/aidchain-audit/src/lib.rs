//! Append-only audit sink.
//!
//! Security-relevant operations are recorded through a non-blocking channel
//! feeding a single writer task. A sink failure is the sink's problem: the
//! emitting caller never fails because auditing did.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use aidchain_core::{AidError, AuditQuery, AuditRecord};
use aidchain_state::StateDb;

/// Cloneable handle for emitting and querying audit records.
#[derive(Clone)]
pub struct AuditSink {
    tx: mpsc::UnboundedSender<AuditRecord>,
    db: Arc<StateDb>,
}

impl AuditSink {
    /// Start the writer task on the current tokio runtime.
    pub fn spawn(db: Arc<StateDb>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditRecord>();
        let writer_db = Arc::clone(&db);
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = writer_db.append_audit(&record) {
                    warn!(error = %e, action = %record.action, "audit record dropped");
                } else {
                    debug!(
                        category = %record.category,
                        action = %record.action,
                        success = record.is_success,
                        "audit record written"
                    );
                }
            }
        });
        Self { tx, db }
    }

    /// Enqueue a record. Never fails; a closed channel is logged and the
    /// record is dropped.
    pub fn emit(&self, record: AuditRecord) {
        if self.tx.send(record).is_err() {
            warn!("audit writer task is gone; record dropped");
        }
    }

    /// Query persisted records, chronologically ordered, filtered and
    /// paginated per `query`.
    pub fn query(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>, AidError> {
        let records = self.db.iter_audit()?;
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(records
            .into_iter()
            .filter(|r| query.matches(r))
            .skip(query.offset)
            .take(limit)
            .collect())
    }
}
