// Transaction Collaborator Boundary
//
// The transaction handle is opaque and owned by the session. Execution
// only ever starts, commits, rolls back, or savepoints it through this
// trait; it never inspects transaction internals.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{QueryError, QueryResult};

/// The transaction operations the execution layer may invoke.
pub trait TransactionOps: Send + Sync {
    fn start_transaction(&self) -> QueryResult<()>;

    fn commit_transaction(&self) -> QueryResult<()>;

    fn rollback(&self) -> QueryResult<()>;

    fn create_savepoint(&self, name: &str) -> QueryResult<()>;

    fn rollback_to_savepoint(&self, name: &str) -> QueryResult<()>;

    fn release_savepoint(&self, name: &str) -> QueryResult<()>;
}

/// A counting `TransactionOps` double used by the tests in this crate.
///
/// Savepoint bookkeeping is real enough to catch double-release and
/// rollback-to-missing-savepoint bugs.
#[derive(Default)]
pub struct RecordingTxn {
    state: Mutex<RecordingTxnState>,
}

#[derive(Default)]
struct RecordingTxnState {
    started: usize,
    commits: usize,
    rollbacks: usize,
    savepoints: Vec<String>,
    savepoint_rollbacks: Vec<String>,
}

impl RecordingTxn {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingTxn::default())
    }

    pub fn commits(&self) -> usize {
        self.state.lock().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().rollbacks
    }

    pub fn open_savepoints(&self) -> usize {
        self.state.lock().savepoints.len()
    }

    pub fn savepoint_rollbacks(&self) -> Vec<String> {
        self.state.lock().savepoint_rollbacks.clone()
    }
}

impl TransactionOps for RecordingTxn {
    fn start_transaction(&self) -> QueryResult<()> {
        self.state.lock().started += 1;
        Ok(())
    }

    fn commit_transaction(&self) -> QueryResult<()> {
        self.state.lock().commits += 1;
        Ok(())
    }

    fn rollback(&self) -> QueryResult<()> {
        self.state.lock().rollbacks += 1;
        Ok(())
    }

    fn create_savepoint(&self, name: &str) -> QueryResult<()> {
        self.state.lock().savepoints.push(name.to_string());
        Ok(())
    }

    fn rollback_to_savepoint(&self, name: &str) -> QueryResult<()> {
        let mut state = self.state.lock();
        if !state.savepoints.iter().any(|s| s == name) {
            return Err(QueryError::TransactionError(format!(
                "Savepoint '{}' does not exist",
                name
            )));
        }
        state.savepoint_rollbacks.push(name.to_string());
        Ok(())
    }

    fn release_savepoint(&self, name: &str) -> QueryResult<()> {
        let mut state = self.state.lock();
        match state.savepoints.iter().rposition(|s| s == name) {
            Some(pos) => {
                state.savepoints.remove(pos);
                Ok(())
            }
            None => Err(QueryError::TransactionError(format!(
                "Savepoint '{}' does not exist",
                name
            ))),
        }
    }
}
