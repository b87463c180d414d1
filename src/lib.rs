pub mod backend;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod handle;
pub mod operation;
pub mod results;
pub mod session;
pub mod wire;

pub use config::Config;
pub use errors::{GatewayError, GatewayResult};
pub use gateway::{GatewayServer, GatewayService};
pub use session::SessionPolicy;
