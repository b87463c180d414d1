use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use sqlgate::backend::MemoryBackend;
use sqlgate::{Config, GatewayServer, GatewayService, SessionPolicy};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "sqlgate";

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

#[tokio::main]
async fn main() -> std::io::Result<()> {
    setup().await;
    run_forever().await
}

// -----------------------------------------------------------------------------
// ----- Setup -----------------------------------------------------------------

async fn setup() {
    // This has to be the first thing we do, because it initializes the config
    Config::init().await;

    init_tracing();
}

fn init_tracing() {
    let config = Config::snapshot();
    let filter = EnvFilter::try_new(config.log_level.as_str()).unwrap();
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

async fn run_forever() -> std::io::Result<()> {
    // Config might reload, but the fields used by run_forever are set at startup
    let config = Config::snapshot();

    let socket = if config.listen_addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    socket.bind(config.listen_addr)?;

    let listener: TcpListener = socket.listen(1024)?;

    let policy = SessionPolicy {
        auth_mode: config.auth_mode,
        allow_user_substitution: config.allow_user_substitution,
        users: config.users.clone(),
    };
    let service = GatewayService::new(policy, Arc::new(MemoryBackend::new()));
    let server = GatewayServer::new(service, config.max_workers, config.login_timeout);

    info!(
        "{} listening on {} ({}..{} workers)",
        APP_NAME, config.listen_addr, config.min_workers, config.max_workers
    );

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("{} shutting down", APP_NAME);
            Ok(())
        }

        serve_res = server.serve(listener) => serve_res,
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
