//! The execution seam. The gateway never parses or plans SQL; it hands a
//! statement to an [`ExecutionBackend`] and later collects a result set.
//! Backends run on blocking threads and must poll the cancel token.

pub mod memory;

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use thiserror::Error;

use crate::operation::log::OperationLog;
use crate::results::{RowSet, Schema};

pub use memory::MemoryBackend;

// -----------------------------------------------------------------------------
// ----- CancelToken -----------------------------------------------------------

/// Cooperative cancellation flag shared between an operation record and the
/// backend call running on its behalf. Setting it never blocks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

// -----------------------------------------------------------------------------
// ----- ExecContext -----------------------------------------------------------

/// Everything a backend call may consult: the session's effective
/// configuration, the operation's log sink, and its cancel token.
#[derive(Debug, Clone)]
pub struct ExecContext {
    pub session_conf: HashMap<String, String>,
    pub log: OperationLog,
    pub cancel: CancelToken,
}

impl ExecContext {
    pub fn new(session_conf: HashMap<String, String>, log: OperationLog, cancel: CancelToken) -> Self {
        Self {
            session_conf,
            log,
            cancel,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- BackendResult ---------------------------------------------------------

#[derive(Debug)]
pub struct BackendResult {
    pub schema: Schema,
    pub rows: RowSet,
}

impl BackendResult {
    pub fn empty() -> Self {
        Self {
            schema: Schema::empty(),
            rows: RowSet::empty(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- BackendError ----------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("execution failed: {0}")]
    Execution(String),

    #[error("backend cannot satisfy request: {0}")]
    Unsupported(String),

    #[error("execution canceled")]
    Canceled,
}

// -----------------------------------------------------------------------------
// ----- ExecutionBackend ------------------------------------------------------

/// Blocking execution interface. Calls are made from `spawn_blocking` while
/// the owning session's gate is held, so a backend sees at most one call per
/// session at a time.
pub trait ExecutionBackend: Send + Sync + 'static {
    fn execute(&self, ctx: &ExecContext, statement: &str) -> Result<BackendResult, BackendError>;

    fn get_catalogs(&self, ctx: &ExecContext) -> Result<BackendResult, BackendError>;

    fn get_schemas(
        &self,
        ctx: &ExecContext,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
    ) -> Result<BackendResult, BackendError>;

    fn get_tables(
        &self,
        ctx: &ExecContext,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
        table_types: &[String],
    ) -> Result<BackendResult, BackendError>;

    fn get_columns(
        &self,
        ctx: &ExecContext,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
        column_pattern: Option<&str>,
    ) -> Result<BackendResult, BackendError>;

    fn get_functions(
        &self,
        ctx: &ExecContext,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        function_pattern: Option<&str>,
    ) -> Result<BackendResult, BackendError>;

    fn get_type_info(&self, ctx: &ExecContext) -> Result<BackendResult, BackendError>;

    fn get_table_types(&self, ctx: &ExecContext) -> Result<BackendResult, BackendError>;
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
