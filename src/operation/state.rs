use serde::{Deserialize, Serialize};

use crate::errors::{GatewayError, GatewayResult};

// -----------------------------------------------------------------------------
// ----- OperationState --------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Initialized,
    Running,
    Finished,
    Canceled,
    Closed,
    Error,
}

// -----------------------------------------------------------------------------
// ----- OperationState: Public ------------------------------------------------

impl OperationState {
    /// Terminal with respect to new work. Only `Closed` releases resources.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationState::Finished
                | OperationState::Canceled
                | OperationState::Closed
                | OperationState::Error
        )
    }

    /// The single place transition legality is decided.
    pub fn can_advance_to(self, next: OperationState) -> bool {
        use OperationState::*;

        match (self, next) {
            (Initialized, Running) => true,
            (Running, Finished) => true,
            (Running, Error) => true,
            (Initialized | Running, Canceled) => true,
            // Close is allowed from every state except an already-closed one.
            (Closed, Closed) => false,
            (_, Closed) => true,
            _ => false,
        }
    }

    pub fn advance_to(self, next: OperationState) -> GatewayResult<OperationState> {
        if !self.can_advance_to(next) {
            return Err(GatewayError::InvalidArgument(format!(
                "illegal operation state transition {self:?} -> {next:?}"
            )));
        }
        Ok(next)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationState::Initialized => "initialized",
            OperationState::Running => "running",
            OperationState::Finished => "finished",
            OperationState::Canceled => "canceled",
            OperationState::Closed => "closed",
            OperationState::Error => "error",
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::OperationState::*;

    #[test]
    fn lifecycle_transitions_are_legal() {
        assert!(Initialized.can_advance_to(Running));
        assert!(Running.can_advance_to(Finished));
        assert!(Running.can_advance_to(Error));
        assert!(Initialized.can_advance_to(Canceled));
        assert!(Running.can_advance_to(Canceled));
    }

    #[test]
    fn close_is_reachable_from_everywhere_once() {
        assert!(Initialized.can_advance_to(Closed));
        assert!(Running.can_advance_to(Closed));
        assert!(Finished.can_advance_to(Closed));
        assert!(Error.can_advance_to(Closed));
        assert!(Canceled.can_advance_to(Closed));
        assert!(!Closed.can_advance_to(Closed));
    }

    #[test]
    fn terminal_states_reject_new_work() {
        assert!(!Finished.can_advance_to(Running));
        assert!(!Canceled.can_advance_to(Running));
        assert!(!Error.can_advance_to(Finished));
        assert!(!Closed.can_advance_to(Running));
    }

    #[test]
    fn advance_to_reports_the_offending_pair() {
        let err = Finished.advance_to(Running).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Finished"));
        assert!(msg.contains("Running"));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
