use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::handle::Handle;
use crate::operation::OperationState;
use crate::results::{FetchOrientation, Row, Schema};

use super::status::Status;

// -----------------------------------------------------------------------------
// ----- Request ---------------------------------------------------------------

/// One inbound RPC. Internally tagged so frames read naturally as
/// `{"method": "open_session", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    OpenSession {
        username: String,
        #[serde(default)]
        password: String,
        #[serde(default)]
        configuration: HashMap<String, String>,
    },
    CloseSession {
        session_handle: Handle,
    },
    ExecuteStatement {
        session_handle: Handle,
        statement: String,
        #[serde(default)]
        conf_overlay: HashMap<String, String>,
    },
    GetOperationStatus {
        operation_handle: Handle,
    },
    CancelOperation {
        operation_handle: Handle,
    },
    CloseOperation {
        operation_handle: Handle,
    },
    GetResultSetMetadata {
        operation_handle: Handle,
    },
    FetchResults {
        operation_handle: Handle,
        orientation: FetchOrientation,
        max_rows: usize,
    },
    GetLog {
        operation_handle: Handle,
    },
    GetCatalogs {
        session_handle: Handle,
    },
    GetSchemas {
        session_handle: Handle,
        #[serde(default)]
        catalog_name: Option<String>,
        #[serde(default)]
        schema_name: Option<String>,
    },
    GetTables {
        session_handle: Handle,
        #[serde(default)]
        catalog_name: Option<String>,
        #[serde(default)]
        schema_name: Option<String>,
        #[serde(default)]
        table_name: Option<String>,
        #[serde(default)]
        table_types: Vec<String>,
    },
    GetColumns {
        session_handle: Handle,
        #[serde(default)]
        catalog_name: Option<String>,
        #[serde(default)]
        schema_name: Option<String>,
        #[serde(default)]
        table_name: Option<String>,
        #[serde(default)]
        column_name: Option<String>,
    },
    GetFunctions {
        session_handle: Handle,
        #[serde(default)]
        catalog_name: Option<String>,
        #[serde(default)]
        schema_name: Option<String>,
        #[serde(default)]
        function_name: Option<String>,
    },
    GetTypeInfo {
        session_handle: Handle,
    },
    GetTableTypes {
        session_handle: Handle,
    },
    GetDelegationToken {
        session_handle: Handle,
        owner: String,
        renewer: String,
    },
    CancelDelegationToken {
        session_handle: Handle,
        delegation_token: String,
    },
    RenewDelegationToken {
        session_handle: Handle,
        delegation_token: String,
    },
}

// -----------------------------------------------------------------------------
// ----- Response --------------------------------------------------------------

/// The matching outbound shapes. All seven metadata-discovery calls answer
/// with the shared `MetadataOperation` shape, exactly like their requests
/// all resolve to an operation handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Response {
    OpenSession {
        status: Status,
        #[serde(default)]
        session_handle: Option<Handle>,
    },
    CloseSession {
        status: Status,
    },
    ExecuteStatement {
        status: Status,
        #[serde(default)]
        operation_handle: Option<Handle>,
    },
    GetOperationStatus {
        status: Status,
        #[serde(default)]
        state: Option<OperationState>,
        /// Retained failure detail when the operation is in the error state.
        #[serde(default)]
        error_message: Option<String>,
    },
    CancelOperation {
        status: Status,
    },
    CloseOperation {
        status: Status,
    },
    GetResultSetMetadata {
        status: Status,
        #[serde(default)]
        schema: Option<Schema>,
    },
    FetchResults {
        status: Status,
        #[serde(default)]
        rows: Vec<Row>,
        #[serde(default)]
        has_more_rows: bool,
    },
    GetLog {
        status: Status,
        #[serde(default)]
        log: String,
    },
    MetadataOperation {
        status: Status,
        #[serde(default)]
        operation_handle: Option<Handle>,
    },
    GetDelegationToken {
        status: Status,
        #[serde(default)]
        delegation_token: Option<String>,
    },
    CancelDelegationToken {
        status: Status,
    },
    RenewDelegationToken {
        status: Status,
    },
    /// Sent when a frame never made it to dispatch: undecodable request or
    /// a connection rejected at admission.
    Rejected {
        status: Status,
    },
}

// -----------------------------------------------------------------------------
// ----- Response: Public ------------------------------------------------------

impl Response {
    pub fn status(&self) -> &Status {
        match self {
            Response::OpenSession { status, .. }
            | Response::CloseSession { status }
            | Response::ExecuteStatement { status, .. }
            | Response::GetOperationStatus { status, .. }
            | Response::CancelOperation { status }
            | Response::CloseOperation { status }
            | Response::GetResultSetMetadata { status, .. }
            | Response::FetchResults { status, .. }
            | Response::GetLog { status, .. }
            | Response::MetadataOperation { status, .. }
            | Response::GetDelegationToken { status, .. }
            | Response::CancelDelegationToken { status }
            | Response::RenewDelegationToken { status }
            | Response::Rejected { status } => status,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
