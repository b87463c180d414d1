pub mod manager;
pub mod record;

pub use manager::{PROXY_USER_KEY, SessionManager, SessionPolicy};
pub use record::SessionRecord;
