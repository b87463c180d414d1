use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, warn};

use crate::errors::GatewayError;
use crate::wire::{self, FrameError, Request, Response, Status};

use super::service::GatewayService;

// -----------------------------------------------------------------------------
// ----- GatewayConnection -----------------------------------------------------

/// One admitted client connection: a strict request/response frame loop.
/// The worker permit is held for the connection's whole lifetime and goes
/// back to the pool when the connection drops.
pub struct GatewayConnection {
    service: Arc<GatewayService>,
    stream: TcpStream,
    peer_host: String,
    _permit: OwnedSemaphorePermit,
}

// -----------------------------------------------------------------------------
// ----- GatewayConnection: Static ---------------------------------------------

impl GatewayConnection {
    pub fn new(
        service: Arc<GatewayService>,
        stream: TcpStream,
        peer_host: String,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            service,
            stream,
            peer_host,
            _permit: permit,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- GatewayConnection: Serve ----------------------------------------------

impl GatewayConnection {
    pub async fn serve(self) -> Result<(), FrameError> {
        let peer_host = self.peer_host;
        let service = self.service;
        let (mut reader, mut writer) = self.stream.into_split();

        debug!(peer = peer_host.as_str(), "connection admitted");

        while let Some(frame) = wire::read_frame(&mut reader).await? {
            let response = match serde_json::from_slice::<Request>(&frame) {
                Ok(request) => service.dispatch(request, &peer_host).await,
                Err(err) => {
                    warn!(peer = peer_host.as_str(), error = %err, "undecodable frame");
                    Response::Rejected {
                        status: Status::error(&GatewayError::InvalidArgument(format!(
                            "undecodable request frame: {err}"
                        ))),
                    }
                }
            };

            let body = serde_json::to_vec(&response).map_err(|err| {
                FrameError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
            })?;
            wire::write_frame(&mut writer, &body).await?;
        }

        debug!(peer = peer_host.as_str(), "connection closed");
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
