use std::future::Future;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::protocol::error::{GeoRpcError, Result};
use crate::protocol::Response;
use crate::protocol::Request;
use crate::transport::codec::JsonCodec;
use crate::transport::tcp::TcpTransportAsync;

/// Minimal async TCP server speaking the length-prefixed JSON protocol.
///
/// Each accepted connection is served on its own task; frames on one
/// connection are handled in order.
pub struct TcpServer {
    listener: TcpListener,
}

impl TcpServer {
    pub async fn new(bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| GeoRpcError::Connection(format!("Failed to bind to {}: {}", bind_addr, e)))?;

        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| GeoRpcError::Connection(format!("Failed to get local addr: {}", e)))
    }

    /// Accepts connections forever, answering every request with `handler`.
    ///
    /// A handler error is sent back as an error [`Response`] rather than
    /// closing the connection. Connection tasks are owned by this future:
    /// dropping it (or aborting the task running it) closes every open
    /// connection, not just the listener.
    pub async fn run_with_handler<F, Fut>(&self, handler: F) -> Result<()>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer_addr) = accepted.map_err(|e| {
                        GeoRpcError::Connection(format!("Failed to accept connection: {}", e))
                    })?;

                    debug!(peer = %peer_addr, "connection established");

                    let handler = handler.clone();
                    connections.spawn(async move {
                        if let Err(e) = handle_connection(stream, handler).await {
                            debug!(peer = %peer_addr, error = %e, "connection closed with error");
                        }
                    });
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }
    }
}

async fn handle_connection<F, Fut>(mut stream: TcpStream, handler: Arc<F>) -> Result<()>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    loop {
        let buf = match TcpTransportAsync::receive_message(&mut stream).await {
            Ok(buf) => buf,
            // Peer hung up between frames
            Err(GeoRpcError::Connection(_)) => return Ok(()),
            Err(e) => return Err(e),
        };

        let request = match JsonCodec::decode_request(&buf) {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, "failed to decode request");
                let error_response = Response::error(0, e.to_string());
                send_response(&mut stream, &error_response).await?;
                continue;
            }
        };

        let request_id = request.id;
        let response = match handler(request).await {
            Ok(resp) => resp,
            Err(e) => Response::error(request_id, e.to_string()),
        };

        send_response(&mut stream, &response).await?;
    }
}

async fn send_response(stream: &mut TcpStream, response: &Response) -> Result<()> {
    let encoded = JsonCodec::encode_response(response)?;
    TcpTransportAsync::send_message(stream, &encoded).await
}
