use std::{collections::HashMap, sync::Arc};
use tracing::warn;

use crate::backend::{BackendResult, ExecutionBackend};
use crate::config::AuthMode;
use crate::errors::{GatewayError, GatewayResult};
use crate::handle::Handle;
use crate::operation::{
    FetchOutcome, OperationKind, OperationManager, OperationState, SchemaOutcome,
};
use crate::results::FetchOrientation;
use crate::session::{SessionManager, SessionPolicy};
use crate::wire::{Request, Response, Status};

// -----------------------------------------------------------------------------
// ----- GatewayService --------------------------------------------------------

/// The RPC brain: resolves handles, delegates to the managers, and encodes
/// every outcome (including every error) as a structured status. A request
/// can fail; the worker serving it cannot.
pub struct GatewayService {
    auth_mode: AuthMode,
    sessions: SessionManager,
    operations: Arc<OperationManager>,
}

// -----------------------------------------------------------------------------
// ----- GatewayService: Static ------------------------------------------------

impl GatewayService {
    pub fn new(policy: SessionPolicy, backend: Arc<dyn ExecutionBackend>) -> Arc<Self> {
        let auth_mode = policy.auth_mode;

        Arc::new(Self {
            auth_mode,
            sessions: SessionManager::new(policy),
            operations: Arc::new(OperationManager::new(backend)),
        })
    }
}

// -----------------------------------------------------------------------------
// ----- GatewayService: Accessors ---------------------------------------------

impl GatewayService {
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn operations(&self) -> &OperationManager {
        &self.operations
    }
}

// -----------------------------------------------------------------------------
// ----- GatewayService: Dispatch ----------------------------------------------

impl GatewayService {
    pub async fn dispatch(self: &Arc<Self>, request: Request, peer_host: &str) -> Response {
        match request {
            Request::OpenSession {
                username,
                password,
                configuration,
            } => match self
                .sessions
                .open_session(&username, &password, peer_host, configuration)
            {
                Ok(session) => Response::OpenSession {
                    status: Status::ok(),
                    session_handle: Some(session.handle()),
                },
                Err(err) => Response::OpenSession {
                    status: Status::error(&err),
                    session_handle: None,
                },
            },

            Request::CloseSession { session_handle } => {
                let status = match self.sessions.close_session(session_handle, &self.operations) {
                    Ok(()) => Status::ok(),
                    Err(err) => Status::error(&err),
                };
                Response::CloseSession { status }
            }

            Request::ExecuteStatement {
                session_handle,
                statement,
                conf_overlay,
            } => match self
                .execute_statement(session_handle, statement, conf_overlay)
                .await
            {
                Ok((handle, status)) => Response::ExecuteStatement {
                    status,
                    operation_handle: Some(handle),
                },
                Err(err) => Response::ExecuteStatement {
                    status: Status::error(&err),
                    operation_handle: None,
                },
            },

            Request::GetOperationStatus { operation_handle } => {
                match self.operations.get_status(operation_handle) {
                    Ok((state, detail)) => Response::GetOperationStatus {
                        status: Status::ok(),
                        state: Some(state),
                        error_message: detail,
                    },
                    Err(err) => Response::GetOperationStatus {
                        status: Status::error(&err),
                        state: None,
                        error_message: None,
                    },
                }
            }

            Request::CancelOperation { operation_handle } => {
                let status = match self.operations.cancel_operation(operation_handle) {
                    Ok(()) => Status::ok(),
                    Err(err) => Status::error(&err),
                };
                Response::CancelOperation { status }
            }

            Request::CloseOperation { operation_handle } => {
                let status = match self.operations.close_operation(operation_handle) {
                    Ok(_) => Status::ok(),
                    Err(err) => Status::error(&err),
                };
                Response::CloseOperation { status }
            }

            Request::GetResultSetMetadata { operation_handle } => {
                match self.operations.result_schema(operation_handle) {
                    Ok(SchemaOutcome::Ready(schema)) => Response::GetResultSetMetadata {
                        status: Status::ok(),
                        schema: Some(schema),
                    },
                    Ok(SchemaOutcome::StillExecuting) => Response::GetResultSetMetadata {
                        status: Status::still_executing(),
                        schema: None,
                    },
                    Err(err) => Response::GetResultSetMetadata {
                        status: Status::error(&err),
                        schema: None,
                    },
                }
            }

            Request::FetchResults {
                operation_handle,
                orientation,
                max_rows,
            } => self.fetch_results(operation_handle, orientation, max_rows),

            Request::GetLog { operation_handle } => {
                match self.operations.get_log(operation_handle) {
                    Ok(log) => Response::GetLog {
                        status: Status::ok(),
                        log,
                    },
                    Err(err) => Response::GetLog {
                        status: Status::error(&err),
                        log: String::new(),
                    },
                }
            }

            Request::GetCatalogs { session_handle } => {
                self.metadata_operation(session_handle, OperationKind::GetCatalogs)
                    .await
            }

            Request::GetSchemas {
                session_handle,
                catalog_name,
                schema_name,
            } => {
                self.metadata_operation(
                    session_handle,
                    OperationKind::GetSchemas {
                        catalog: catalog_name,
                        schema_pattern: schema_name,
                    },
                )
                .await
            }

            Request::GetTables {
                session_handle,
                catalog_name,
                schema_name,
                table_name,
                table_types,
            } => {
                self.metadata_operation(
                    session_handle,
                    OperationKind::GetTables {
                        catalog: catalog_name,
                        schema_pattern: schema_name,
                        table_pattern: table_name,
                        table_types,
                    },
                )
                .await
            }

            Request::GetColumns {
                session_handle,
                catalog_name,
                schema_name,
                table_name,
                column_name,
            } => {
                self.metadata_operation(
                    session_handle,
                    OperationKind::GetColumns {
                        catalog: catalog_name,
                        schema_pattern: schema_name,
                        table_pattern: table_name,
                        column_pattern: column_name,
                    },
                )
                .await
            }

            Request::GetFunctions {
                session_handle,
                catalog_name,
                schema_name,
                function_name,
            } => {
                self.metadata_operation(
                    session_handle,
                    OperationKind::GetFunctions {
                        catalog: catalog_name,
                        schema_pattern: schema_name,
                        function_pattern: function_name,
                    },
                )
                .await
            }

            Request::GetTypeInfo { session_handle } => {
                self.metadata_operation(session_handle, OperationKind::GetTypeInfo)
                    .await
            }

            Request::GetTableTypes { session_handle } => {
                self.metadata_operation(session_handle, OperationKind::GetTableTypes)
                    .await
            }

            Request::GetDelegationToken {
                session_handle,
                owner,
                renewer,
            } => {
                if !self.auth_mode.is_strong() {
                    return Response::GetDelegationToken {
                        status: Status::token_unsupported(),
                        delegation_token: None,
                    };
                }
                match self
                    .sessions
                    .issue_delegation_token(session_handle, &owner, &renewer)
                {
                    Ok(token) => Response::GetDelegationToken {
                        status: Status::ok(),
                        delegation_token: Some(token),
                    },
                    Err(err) => Response::GetDelegationToken {
                        status: Status::error(&err),
                        delegation_token: None,
                    },
                }
            }

            Request::CancelDelegationToken {
                session_handle,
                delegation_token,
            } => {
                if !self.auth_mode.is_strong() {
                    return Response::CancelDelegationToken {
                        status: Status::token_unsupported(),
                    };
                }
                let status = match self
                    .sessions
                    .cancel_delegation_token(session_handle, &delegation_token)
                {
                    Ok(()) => Status::ok(),
                    Err(err) => Status::error(&err),
                };
                Response::CancelDelegationToken { status }
            }

            Request::RenewDelegationToken {
                session_handle,
                delegation_token,
            } => {
                if !self.auth_mode.is_strong() {
                    return Response::RenewDelegationToken {
                        status: Status::token_unsupported(),
                    };
                }
                let status = match self
                    .sessions
                    .renew_delegation_token(session_handle, &delegation_token)
                {
                    Ok(()) => Status::ok(),
                    Err(err) => Status::error(&err),
                };
                Response::RenewDelegationToken { status }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ----- GatewayService: Statements --------------------------------------------

impl GatewayService {
    /// Creates the operation and hands it to a background task; the caller
    /// gets the handle right away and polls. `SET key = value` never reaches
    /// the backend: it lands in the session's config overlay.
    async fn execute_statement(
        self: &Arc<Self>,
        session_handle: Handle,
        statement: String,
        conf_overlay: HashMap<String, String>,
    ) -> GatewayResult<(Handle, Status)> {
        let session = self.sessions.get_session(session_handle)?;

        if let Some((key, value)) = parse_set_statement(&statement) {
            crate::session::manager::validate_overlay(&HashMap::from([(
                key.clone(),
                value.clone(),
            )]))?;

            let record = self.operations.new_operation(
                &session,
                OperationKind::ExecuteStatement { statement },
                conf_overlay,
            )?;
            if record.start()? {
                record.complete(Ok(BackendResult::empty()));
            }
            session.set_conf(key, value);

            return Ok((record.handle(), Status::ok()));
        }

        let record = self.operations.new_operation(
            &session,
            OperationKind::ExecuteStatement { statement },
            conf_overlay,
        )?;

        let service = self.clone();
        let run_session = session.clone();
        let run_record = record.clone();
        tokio::spawn(async move {
            if let Err(err) = service.operations.run(&run_session, &run_record).await {
                warn!(operation = %run_record.handle(), error = %err,
                    "statement execution never started");
            }
        });

        let status = match record.state() {
            OperationState::Finished => Status::ok(),
            _ => Status::still_executing(),
        };
        Ok((record.handle(), status))
    }

    /// Metadata operations populate their results before the RPC returns;
    /// the handle then supports the same status/fetch calls as statements.
    async fn metadata_operation(
        self: &Arc<Self>,
        session_handle: Handle,
        kind: OperationKind,
    ) -> Response {
        let outcome: GatewayResult<Handle> = async {
            let session = self.sessions.get_session(session_handle)?;
            let record = self.operations.new_operation(&session, kind, HashMap::new())?;
            self.operations.run(&session, &record).await?;

            let (state, detail) = record.status();
            if state == OperationState::Error {
                return Err(GatewayError::BackendExecution(
                    detail.unwrap_or_else(|| "metadata query failed".to_string()),
                ));
            }
            Ok(record.handle())
        }
        .await;

        match outcome {
            Ok(handle) => Response::MetadataOperation {
                status: Status::ok(),
                operation_handle: Some(handle),
            },
            Err(err) => Response::MetadataOperation {
                status: Status::error(&err),
                operation_handle: None,
            },
        }
    }
}

// -----------------------------------------------------------------------------
// ----- GatewayService: Results -----------------------------------------------

impl GatewayService {
    fn fetch_results(
        &self,
        handle: Handle,
        orientation: FetchOrientation,
        max_rows: usize,
    ) -> Response {
        match self.operations.fetch_results(handle, orientation, max_rows) {
            Ok(FetchOutcome::Page { rows, has_more }) => Response::FetchResults {
                status: Status::ok(),
                rows,
                has_more_rows: has_more,
            },
            Ok(FetchOutcome::StillExecuting) => Response::FetchResults {
                status: Status::still_executing(),
                rows: Vec::new(),
                has_more_rows: false,
            },
            Err(err) => Response::FetchResults {
                status: Status::error(&err),
                rows: Vec::new(),
                has_more_rows: false,
            },
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

/// `SET key = value` -> (key, value). Anything else is not a set statement.
fn parse_set_statement(statement: &str) -> Option<(String, String)> {
    let trimmed = statement.trim().trim_end_matches(';');
    let rest = trimmed.strip_prefix("SET").or_else(|| {
        let upper = trimmed.get(..3)?;
        upper.eq_ignore_ascii_case("SET").then(|| &trimmed[3..])
    })?;

    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let (key, value) = rest.split_once('=')?;
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() {
        return None;
    }

    Some((key.to_string(), value.to_string()))
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
