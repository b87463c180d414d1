use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use crate::backend::{BackendError, BackendResult, CancelToken};
use crate::errors::{GatewayError, GatewayResult};
use crate::handle::Handle;
use crate::results::{FetchOrientation, Row, Schema};
use crate::session::SessionRecord;

use super::{kind::OperationKind, log::OperationLog, state::OperationState};

// -----------------------------------------------------------------------------
// ----- Outcomes --------------------------------------------------------------

#[derive(Debug)]
pub enum FetchOutcome {
    StillExecuting,
    Page { rows: Vec<Row>, has_more: bool },
}

#[derive(Debug)]
pub enum SchemaOutcome {
    StillExecuting,
    Ready(Schema),
}

// -----------------------------------------------------------------------------
// ----- OperationRecord -------------------------------------------------------

/// One unit of work scoped to a session: state machine, buffered results,
/// captured log, cancel flag. The state mutex guards only bookkeeping; the
/// backend call itself runs outside it.
#[derive(Debug)]
pub struct OperationRecord {
    handle: Handle,
    session_handle: Handle,
    session: Weak<SessionRecord>,
    kind: OperationKind,
    conf_overlay: HashMap<String, String>,
    log: OperationLog,
    cancel: CancelToken,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: OperationState,
    schema: Option<Schema>,
    rows: Option<crate::results::RowSet>,
    error: Option<String>,
}

// -----------------------------------------------------------------------------
// ----- OperationRecord: Static -----------------------------------------------

impl OperationRecord {
    pub fn new(
        handle: Handle,
        session: &Arc<SessionRecord>,
        kind: OperationKind,
        conf_overlay: HashMap<String, String>,
    ) -> Self {
        Self {
            handle,
            session_handle: session.handle(),
            session: Arc::downgrade(session),
            kind,
            conf_overlay,
            log: OperationLog::new(),
            cancel: CancelToken::new(),
            inner: Mutex::new(Inner {
                state: OperationState::Initialized,
                schema: None,
                rows: None,
                error: None,
            }),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- OperationRecord: Accessors --------------------------------------------

impl OperationRecord {
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn session_handle(&self) -> Handle {
        self.session_handle
    }

    /// The owning session, while it is still alive.
    pub fn session(&self) -> Option<Arc<SessionRecord>> {
        self.session.upgrade()
    }

    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    pub fn conf_overlay(&self) -> &HashMap<String, String> {
        &self.conf_overlay
    }

    pub fn log(&self) -> OperationLog {
        self.log.clone()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> OperationState {
        self.inner.lock().state
    }

    /// Current state plus retained error detail, for status polling.
    pub fn status(&self) -> (OperationState, Option<String>) {
        let inner = self.inner.lock();
        (inner.state, inner.error.clone())
    }
}

// -----------------------------------------------------------------------------
// ----- OperationRecord: Transitions ------------------------------------------

impl OperationRecord {
    /// Move Initialized -> Running. Returns false when a cancel won the race
    /// before execution started; the caller must then skip the backend call.
    pub fn start(&self) -> GatewayResult<bool> {
        let mut inner = self.inner.lock();

        if inner.state == OperationState::Canceled {
            return Ok(false);
        }

        inner.state = inner.state.advance_to(OperationState::Running)?;
        Ok(true)
    }

    /// Record the backend outcome. A cancel or close that landed while the
    /// backend was running wins; the late result is quietly dropped.
    pub fn complete(&self, outcome: Result<BackendResult, BackendError>) {
        let mut inner = self.inner.lock();

        if inner.state != OperationState::Running {
            return;
        }

        match outcome {
            Ok(result) => {
                inner.state = OperationState::Finished;
                inner.schema = Some(result.schema);
                inner.rows = Some(result.rows);
            }
            Err(BackendError::Canceled) => {
                inner.state = OperationState::Canceled;
            }
            Err(err) => {
                inner.state = OperationState::Error;
                inner.error = Some(err.to_string());
            }
        }
    }

    /// Idempotent: canceling a terminal operation is a successful no-op.
    pub fn cancel(&self) {
        self.cancel.cancel();

        let mut inner = self.inner.lock();
        if !inner.state.is_terminal() {
            inner.state = OperationState::Canceled;
        }
    }

    /// Transition to Closed and release the result buffer. Returns false if
    /// the record was already closed. A backend call still running for this
    /// record sees the cancel flag and bails out; its late result is dropped.
    pub fn close(&self) -> bool {
        self.cancel.cancel();

        let mut inner = self.inner.lock();

        if inner.state == OperationState::Closed {
            return false;
        }

        inner.state = OperationState::Closed;
        inner.schema = None;
        inner.rows = None;
        true
    }
}

// -----------------------------------------------------------------------------
// ----- OperationRecord: Results ----------------------------------------------

impl OperationRecord {
    pub fn fetch(
        &self,
        orientation: FetchOrientation,
        max_rows: usize,
    ) -> GatewayResult<FetchOutcome> {
        let mut inner = self.inner.lock();

        match inner.state {
            OperationState::Initialized | OperationState::Running => Ok(FetchOutcome::StillExecuting),
            OperationState::Finished => {
                let rows = inner
                    .rows
                    .as_mut()
                    .expect("finished operation must carry a result set");
                let page = rows.fetch(orientation, max_rows)?;
                let has_more = rows.has_more();
                Ok(FetchOutcome::Page {
                    rows: page,
                    has_more,
                })
            }
            OperationState::Canceled => Err(GatewayError::InvalidArgument(format!(
                "operation {} was canceled",
                self.handle
            ))),
            OperationState::Error => Err(GatewayError::BackendExecution(
                inner
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown backend failure".to_string()),
            )),
            OperationState::Closed => Err(GatewayError::stale_handle(self.handle)),
        }
    }

    pub fn result_schema(&self) -> GatewayResult<SchemaOutcome> {
        let inner = self.inner.lock();

        match inner.state {
            OperationState::Initialized | OperationState::Running => Ok(SchemaOutcome::StillExecuting),
            OperationState::Finished => Ok(SchemaOutcome::Ready(
                inner
                    .schema
                    .clone()
                    .expect("finished operation must carry a schema"),
            )),
            OperationState::Canceled => Err(GatewayError::InvalidArgument(format!(
                "operation {} was canceled",
                self.handle
            ))),
            OperationState::Error => Err(GatewayError::BackendExecution(
                inner
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown backend failure".to_string()),
            )),
            OperationState::Closed => Err(GatewayError::stale_handle(self.handle)),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::HandleKind;
    use crate::results::RowSet;

    fn record() -> OperationRecord {
        let session = Arc::new(SessionRecord::new(
            Handle::generate(HandleKind::Session),
            "alice".into(),
            None,
            "127.0.0.1".into(),
            HashMap::new(),
        ));

        OperationRecord::new(
            Handle::generate(HandleKind::Operation),
            &session,
            OperationKind::ExecuteStatement {
                statement: "SHOW TABLES".into(),
            },
            HashMap::new(),
        )
    }

    fn finished_record() -> OperationRecord {
        let rec = record();
        assert!(rec.start().unwrap());
        rec.complete(Ok(BackendResult {
            schema: Schema::empty(),
            rows: RowSet::empty(),
        }));
        rec
    }

    #[test]
    fn normal_lifecycle_reaches_finished() {
        let rec = finished_record();
        assert_eq!(rec.state(), OperationState::Finished);
    }

    #[test]
    fn cancel_twice_is_a_noop() {
        let rec = record();
        rec.cancel();
        assert_eq!(rec.state(), OperationState::Canceled);

        rec.cancel();
        assert_eq!(rec.state(), OperationState::Canceled);
    }

    #[test]
    fn cancel_on_finished_operation_keeps_finished() {
        let rec = finished_record();
        rec.cancel();
        assert_eq!(rec.state(), OperationState::Finished);
    }

    #[test]
    fn cancel_before_start_skips_execution() {
        let rec = record();
        rec.cancel();
        assert!(!rec.start().unwrap());
        assert_eq!(rec.state(), OperationState::Canceled);
    }

    #[test]
    fn late_result_after_cancel_is_dropped() {
        let rec = record();
        assert!(rec.start().unwrap());
        rec.cancel();

        rec.complete(Ok(BackendResult {
            schema: Schema::empty(),
            rows: RowSet::empty(),
        }));
        assert_eq!(rec.state(), OperationState::Canceled);
    }

    #[test]
    fn fetch_while_running_is_still_executing() {
        let rec = record();
        assert!(rec.start().unwrap());

        let outcome = rec.fetch(FetchOrientation::Next, 10).unwrap();
        assert!(matches!(outcome, FetchOutcome::StillExecuting));
    }

    #[test]
    fn backend_error_is_retained_for_status() {
        let rec = record();
        assert!(rec.start().unwrap());
        rec.complete(Err(BackendError::Execution("boom".into())));

        let (state, error) = rec.status();
        assert_eq!(state, OperationState::Error);
        assert!(error.unwrap().contains("boom"));

        assert!(matches!(
            rec.fetch(FetchOrientation::Next, 1),
            Err(GatewayError::BackendExecution(_))
        ));
    }

    #[test]
    fn close_is_idempotent_and_releases_results() {
        let rec = finished_record();
        assert!(rec.close());
        assert!(!rec.close());
        assert_eq!(rec.state(), OperationState::Closed);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
