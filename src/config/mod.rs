pub mod cli;
pub mod config;
pub mod types;
pub mod users;

pub use cli::CliConfig;
pub use config::Config;
pub use types::{AuthMode, LogLevel};
pub use users::UsersConfig;
