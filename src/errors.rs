use thiserror::Error;

// -----------------------------------------------------------------------------
// ----- GatewayError ----------------------------------------------------------

/// Everything a gateway RPC can fail with. Each variant carries a stable wire
/// code so clients can branch without parsing messages.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("authorization failed: {0}")]
    Authorization(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("backend execution failed: {0}")]
    BackendExecution(String),

    #[error("server capacity exhausted: {0}")]
    CapacityExhausted(String),
}

// -----------------------------------------------------------------------------
// ----- GatewayError: Public --------------------------------------------------

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::InvalidArgument(_) => "INVALID_ARGUMENT",
            GatewayError::Authorization(_) => "UNAUTHORIZED",
            GatewayError::Unsupported(_) => "UNSUPPORTED",
            GatewayError::BackendExecution(_) => "BACKEND_ERROR",
            GatewayError::CapacityExhausted(_) => "CAPACITY_EXHAUSTED",
        }
    }

    /// SQLSTATE carried on the wire for errors that map to a standard class.
    pub fn sqlstate(&self) -> Option<&'static str> {
        match self {
            GatewayError::Authorization(_) => Some("42000"),
            GatewayError::Unsupported(_) => Some("0A000"),
            _ => None,
        }
    }

    pub fn stale_handle(what: impl std::fmt::Display) -> Self {
        GatewayError::NotFound(format!("unknown or closed handle {what}"))
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(GatewayError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(
            GatewayError::CapacityExhausted("x".into()).code(),
            "CAPACITY_EXHAUSTED"
        );
    }

    #[test]
    fn authorization_carries_sqlstate() {
        let err = GatewayError::Authorization("proxy denied".into());
        assert_eq!(err.sqlstate(), Some("42000"));
        assert_eq!(GatewayError::NotFound("x".into()).sqlstate(), None);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
