pub mod kind;
pub mod log;
pub mod manager;
pub mod record;
pub mod state;

pub use kind::OperationKind;
pub use log::OperationLog;
pub use manager::OperationManager;
pub use record::{FetchOutcome, OperationRecord, SchemaOutcome};
pub use state::OperationState;
