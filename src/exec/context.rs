// Execution Context
//
// One mutable context is threaded through every next/close call. It
// carries the capabilities iterators need (cancellation, warnings, session
// state, the transaction collaborator, the table registry for runtime
// rebuilds, the safepoint hook) so nothing is reached through a global.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{QueryError, QueryResult, Warning};
use crate::exec::operators::dml::RowEffect;
use crate::storage::TableRegistry;
use crate::txn::{RecordingTxn, TransactionOps};

/// Session-level checkpoint hook invoked by the safepoint decorator.
pub type SafepointHook = Box<dyn FnMut() -> QueryResult<()> + Send>;

/// Per-session flags the commit coordination wrapper consults.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Auto-commit enabled for this session
    pub autocommit: bool,
    /// The session is inside an explicit BEGIN ... COMMIT
    pub in_explicit_transaction: bool,
    /// Last auto-generated insert id observed this statement
    pub last_insert_id: Option<i64>,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState {
            autocommit: true,
            in_explicit_transaction: false,
            last_insert_id: None,
        }
    }
}

/// Execution context passed to every iterator call
pub struct ExecContext {
    registry: Arc<TableRegistry>,
    txn: Arc<dyn TransactionOps>,
    cancelled: Arc<AtomicBool>,
    session: SessionState,
    warnings: Vec<Warning>,
    safepoint_hook: Option<SafepointHook>,
    safepoints_reached: u64,
    /// Per-row effect reported by the innermost DML iterator, consumed by
    /// the accumulator after each pull
    last_effect: Option<RowEffect>,
}

impl ExecContext {
    pub fn new(registry: Arc<TableRegistry>, txn: Arc<dyn TransactionOps>) -> Self {
        ExecContext {
            registry,
            txn,
            cancelled: Arc::new(AtomicBool::new(false)),
            session: SessionState::default(),
            warnings: Vec::new(),
            safepoint_hook: None,
            safepoints_reached: 0,
            last_effect: None,
        }
    }

    /// A context over an empty registry and a recording transaction
    /// double. Unit-test convenience.
    pub fn for_tests() -> Self {
        ExecContext::new(Arc::new(TableRegistry::new()), RecordingTxn::new())
    }

    pub fn registry(&self) -> &Arc<TableRegistry> {
        &self.registry
    }

    pub fn txn(&self) -> &Arc<dyn TransactionOps> {
        &self.txn
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    /// Shareable cancellation flag; the session layer flips it to request
    /// cooperative cancellation.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Called from every potentially unbounded loop.
    pub fn check_cancelled(&self) -> QueryResult<()> {
        if self.cancelled.load(Ordering::Relaxed) {
            Err(QueryError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn add_warning(&mut self, warning: Warning) {
        log::debug!("execution warning: {}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    pub fn set_safepoint_hook(&mut self, hook: SafepointHook) {
        self.safepoint_hook = Some(hook);
    }

    /// Invoked by the periodic-safepoint decorator. A no-op when the
    /// session installed no hook.
    pub fn reach_safepoint(&mut self) -> QueryResult<()> {
        self.safepoints_reached += 1;
        match self.safepoint_hook.as_mut() {
            Some(hook) => hook(),
            None => Ok(()),
        }
    }

    pub fn safepoints_reached(&self) -> u64 {
        self.safepoints_reached
    }

    pub fn set_effect(&mut self, effect: RowEffect) {
        self.last_effect = Some(effect);
    }

    pub fn take_effect(&mut self) -> Option<RowEffect> {
        self.last_effect.take()
    }
}
