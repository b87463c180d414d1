pub mod connection;
pub mod server;
pub mod service;

pub use connection::GatewayConnection;
pub use server::GatewayServer;
pub use service::GatewayService;

// RPC orchestration module; keep encoding-specific code in wire.
