use std::{sync::Arc, time::Duration};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::errors::GatewayError;
use crate::wire::{self, Response, Status};

use super::{connection::GatewayConnection, service::GatewayService};

// -----------------------------------------------------------------------------
// ----- GatewayServer ---------------------------------------------------------

/// Accept loop plus worker admission. The accept loop itself never blocks on
/// a full pool: each new connection waits for a permit on its own task, and
/// is turned away with a structured rejection when the login window expires.
pub struct GatewayServer {
    service: Arc<GatewayService>,
    workers: Arc<Semaphore>,
    login_timeout: Duration,
}

// -----------------------------------------------------------------------------
// ----- GatewayServer: Static -------------------------------------------------

impl GatewayServer {
    pub fn new(service: Arc<GatewayService>, max_workers: usize, login_timeout: Duration) -> Self {
        Self {
            service,
            workers: Arc::new(Semaphore::new(max_workers)),
            login_timeout,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- GatewayServer: Serve --------------------------------------------------

impl GatewayServer {
    /// Runs until the listener fails. Shutdown is the caller's concern; see
    /// the select in main.
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(listen = %addr, "gateway accepting connections");
        }

        loop {
            let (stream, peer) = listener.accept().await?;

            let service = self.service.clone();
            let workers = self.workers.clone();
            let login_timeout = self.login_timeout;
            let peer_host = peer.ip().to_string();

            tokio::spawn(async move {
                admit_and_serve(service, workers, login_timeout, stream, peer_host).await;
            });
        }
    }

    pub fn available_workers(&self) -> usize {
        self.workers.available_permits()
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Admission ---------------------------------------------------

async fn admit_and_serve(
    service: Arc<GatewayService>,
    workers: Arc<Semaphore>,
    login_timeout: Duration,
    stream: TcpStream,
    peer_host: String,
) {
    let _ = stream.set_nodelay(true);

    let permit = match timeout(login_timeout, workers.acquire_owned()).await {
        Ok(Ok(permit)) => permit,
        // Semaphore closed: the server is going away.
        Ok(Err(_)) => return,
        Err(_) => {
            warn!(peer = peer_host.as_str(), "no worker within the login timeout");
            reject(stream).await;
            return;
        }
    };

    let connection = GatewayConnection::new(service, stream, peer_host.clone(), permit);
    if let Err(err) = connection.serve().await {
        warn!(peer = peer_host.as_str(), error = %err, "connection terminated");
    }
}

/// Tell the client why it is being dropped. Best-effort: the socket may
/// already be gone.
async fn reject(mut stream: TcpStream) {
    let response = Response::Rejected {
        status: Status::error(&GatewayError::CapacityExhausted(
            "all workers are busy".to_string(),
        )),
    };

    if let Ok(body) = serde_json::to_vec(&response) {
        let _ = wire::write_frame(&mut stream, &body).await;
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
