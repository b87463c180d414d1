use serde::{Deserialize, Serialize};

use crate::errors::GatewayError;

// -----------------------------------------------------------------------------
// ----- StatusCode ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Ok,
    StillExecuting,
    Error,
}

// -----------------------------------------------------------------------------
// ----- Status ----------------------------------------------------------------

/// The structured status carried on every response. Internal errors always
/// arrive here as a code plus message; nothing ever escapes un-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlstate: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// -----------------------------------------------------------------------------
// ----- Status: Static --------------------------------------------------------

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            error_code: None,
            sqlstate: None,
            message: None,
        }
    }

    pub fn still_executing() -> Self {
        Self {
            code: StatusCode::StillExecuting,
            error_code: None,
            sqlstate: None,
            message: None,
        }
    }

    pub fn error(err: &GatewayError) -> Self {
        Self {
            code: StatusCode::Error,
            error_code: Some(err.code().to_string()),
            sqlstate: err.sqlstate().map(str::to_string),
            message: Some(err.to_string()),
        }
    }

    /// Fixed status for delegation-token calls outside strong auth mode.
    pub fn token_unsupported() -> Self {
        Self {
            code: StatusCode::Error,
            error_code: Some("TOKEN_AUTH_MODE".to_string()),
            sqlstate: Some("42000".to_string()),
            message: Some(
                "delegation tokens are only supported with strong authentication".to_string(),
            ),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Status: Public --------------------------------------------------------

impl Status {
    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }

    pub fn is_error(&self) -> bool {
        self.code == StatusCode::Error
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
