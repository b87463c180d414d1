use parking_lot::Mutex;
use std::sync::Arc;

// -----------------------------------------------------------------------------
// ----- OperationLog ----------------------------------------------------------

/// Per-operation log sink. Handed to the backend inside the execution
/// context, so log capture follows the call instead of a thread-local
/// registration. Cheap to clone; all clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct OperationLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }
}

// -----------------------------------------------------------------------------
// ----- OperationLog: Public --------------------------------------------------

impl OperationLog {
    pub fn push(&self, line: impl Into<String>) {
        self.lines.lock().push(line.into());
    }

    /// Best-effort snapshot of everything logged so far, newline-joined.
    pub fn render(&self) -> String {
        self.lines.lock().join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
