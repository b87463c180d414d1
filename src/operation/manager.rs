use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use crate::backend::{BackendError, BackendResult, ExecContext, ExecutionBackend};
use crate::errors::GatewayResult;
use crate::handle::{Handle, HandleKind, HandleRegistry};
use crate::results::FetchOrientation;
use crate::session::SessionRecord;

use super::{
    kind::OperationKind,
    record::{FetchOutcome, OperationRecord, SchemaOutcome},
    state::OperationState,
};

// -----------------------------------------------------------------------------
// ----- OperationManager ------------------------------------------------------

/// Creates, runs, and tears down operations. Owns the global operation
/// registry; the per-session owned sets live on the session records and are
/// always touched before the registry on the create and close paths.
pub struct OperationManager {
    backend: Arc<dyn ExecutionBackend>,
    registry: HandleRegistry<OperationRecord>,
}

impl std::fmt::Debug for OperationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationManager")
            .field("live_operations", &self.registry.len())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ----- OperationManager: Static ----------------------------------------------

impl OperationManager {
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self {
            backend,
            registry: HandleRegistry::new(HandleKind::Operation),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- OperationManager: Create / run ----------------------------------------

impl OperationManager {
    /// Creates the record in state Initialized and returns it before any
    /// execution happens. The session tracks it from this moment so a
    /// session close can always find it.
    pub fn new_operation(
        &self,
        session: &Arc<SessionRecord>,
        kind: OperationKind,
        conf_overlay: HashMap<String, String>,
    ) -> GatewayResult<Arc<OperationRecord>> {
        crate::session::manager::validate_overlay(&conf_overlay)?;

        if session.is_closed() {
            return Err(crate::errors::GatewayError::stale_handle(session.handle()));
        }

        let handle = self.registry.allocate();
        let record = Arc::new(OperationRecord::new(handle, session, kind, conf_overlay));

        session.track_operation(handle);
        self.registry.register(handle, record.clone());

        debug!(operation = %handle, session = %session.handle(),
            kind = record.kind().describe(), "operation created");
        Ok(record)
    }

    /// Runs the operation under the session gate. The gate guard is dropped
    /// on every exit path, including backend panics surfacing as join
    /// errors, so a failed statement never wedges its session.
    pub async fn run(
        &self,
        session: &Arc<SessionRecord>,
        record: &Arc<OperationRecord>,
    ) -> GatewayResult<()> {
        let _gate = session.gate().lock().await;

        if !record.start()? {
            // Cancel won the race before execution began.
            return Ok(());
        }

        let mut conf = session.conf_snapshot();
        conf.extend(record.conf_overlay().clone());

        let ctx = ExecContext::new(conf, record.log(), record.cancel_token());
        let backend = self.backend.clone();
        let kind = record.kind().clone();

        let outcome = tokio::task::spawn_blocking(move || run_kind(&*backend, &kind, &ctx)).await;

        match outcome {
            Ok(result) => record.complete(result),
            Err(join_err) => record.complete(Err(BackendError::Execution(format!(
                "execution task failed: {join_err}"
            )))),
        }

        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- OperationManager: Lookup / teardown -----------------------------------

impl OperationManager {
    pub fn lookup(&self, handle: Handle) -> GatewayResult<Arc<OperationRecord>> {
        self.registry.lookup(handle)
    }

    /// Signals cancellation without touching the session gate, so it can
    /// never deadlock against a run already holding it.
    pub fn cancel_operation(&self, handle: Handle) -> GatewayResult<()> {
        self.registry.lookup(handle)?.cancel();
        Ok(())
    }

    /// Removes the record from the registry and the owning session's set,
    /// then releases its buffers. The registry removal is the authority: a
    /// concurrent second close loses and sees NotFound.
    pub fn close_operation(&self, handle: Handle) -> GatewayResult<Arc<OperationRecord>> {
        let record = self.registry.remove(handle)?;

        if let Some(session) = record.session() {
            session.untrack_operation(handle);
        }
        record.close();

        debug!(operation = %handle, "operation closed");
        Ok(record)
    }

    pub fn get_status(&self, handle: Handle) -> GatewayResult<(OperationState, Option<String>)> {
        Ok(self.registry.lookup(handle)?.status())
    }

    pub fn result_schema(&self, handle: Handle) -> GatewayResult<SchemaOutcome> {
        self.registry.lookup(handle)?.result_schema()
    }

    pub fn fetch_results(
        &self,
        handle: Handle,
        orientation: FetchOrientation,
        max_rows: usize,
    ) -> GatewayResult<FetchOutcome> {
        self.registry.lookup(handle)?.fetch(orientation, max_rows)
    }

    /// Best-effort: whatever the backend logged so far; empty if nothing.
    pub fn get_log(&self, handle: Handle) -> GatewayResult<String> {
        Ok(self.registry.lookup(handle)?.log().render())
    }

    pub fn operation_count(&self) -> usize {
        self.registry.len()
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: kind dispatch -----------------------------------------------

fn run_kind(
    backend: &dyn ExecutionBackend,
    kind: &OperationKind,
    ctx: &ExecContext,
) -> Result<BackendResult, BackendError> {
    match kind {
        OperationKind::ExecuteStatement { statement } => backend.execute(ctx, statement),
        OperationKind::GetCatalogs => backend.get_catalogs(ctx),
        OperationKind::GetSchemas {
            catalog,
            schema_pattern,
        } => backend.get_schemas(ctx, catalog.as_deref(), schema_pattern.as_deref()),
        OperationKind::GetTables {
            catalog,
            schema_pattern,
            table_pattern,
            table_types,
        } => backend.get_tables(
            ctx,
            catalog.as_deref(),
            schema_pattern.as_deref(),
            table_pattern.as_deref(),
            table_types,
        ),
        OperationKind::GetColumns {
            catalog,
            schema_pattern,
            table_pattern,
            column_pattern,
        } => backend.get_columns(
            ctx,
            catalog.as_deref(),
            schema_pattern.as_deref(),
            table_pattern.as_deref(),
            column_pattern.as_deref(),
        ),
        OperationKind::GetFunctions {
            catalog,
            schema_pattern,
            function_pattern,
        } => backend.get_functions(
            ctx,
            catalog.as_deref(),
            schema_pattern.as_deref(),
            function_pattern.as_deref(),
        ),
        OperationKind::GetTypeInfo => backend.get_type_info(ctx),
        OperationKind::GetTableTypes => backend.get_table_types(ctx),
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
