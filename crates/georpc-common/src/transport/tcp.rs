use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::error::{GeoRpcError, Result};
use crate::protocol::{Request, Response};
use crate::transport::codec::JsonCodec;

/// Largest frame accepted in either direction (100 MB).
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Async TCP transport.
///
/// Stateless: every method takes the stream it should operate on, so one
/// transport value can be shared by any number of connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransportAsync;

impl TcpTransportAsync {
    pub fn new() -> Self {
        Self
    }

    /// Connects to `addr`, trying each resolved socket address in turn.
    pub async fn connect(&self, addr: &str) -> Result<TcpStream> {
        let socket_addrs = tokio::net::lookup_host(addr)
            .await
            .map_err(|e| GeoRpcError::Connection(format!("Invalid address '{}': {}", addr, e)))?;

        let mut last_err = None;
        for socket_addr in socket_addrs {
            match TcpStream::connect(socket_addr).await {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    return Ok(stream);
                }
                Err(e) => {
                    last_err = Some(e);
                }
            }
        }

        Err(GeoRpcError::Connection(format!(
            "Failed to connect to {}: {}",
            addr,
            last_err.map(|e| e.to_string()).unwrap_or_else(|| "no addresses resolved".to_string())
        )))
    }

    /// Like [`connect`](Self::connect) but gives up after `timeout`.
    pub async fn connect_timeout(&self, addr: &str, timeout: Duration) -> Result<TcpStream> {
        tokio::time::timeout(timeout, self.connect(addr))
            .await
            .map_err(|_| GeoRpcError::Timeout(timeout.as_millis() as u64))?
    }

    /// Writes one request frame and reads back one response frame.
    pub async fn send_request(&self, stream: &mut TcpStream, request: &Request) -> Result<Response> {
        let encoded = JsonCodec::encode_request(request)?;
        Self::send_message(stream, &encoded).await?;

        let response_data = Self::receive_message(stream).await?;
        JsonCodec::decode_response(&response_data)
    }

    pub async fn send_message(stream: &mut TcpStream, data: &[u8]) -> Result<()> {
        if data.len() > MAX_MESSAGE_SIZE {
            return Err(GeoRpcError::InvalidRequest(format!(
                "Message too large: {} bytes (max {} bytes)",
                data.len(),
                MAX_MESSAGE_SIZE
            )));
        }
        let len = data.len() as u32;

        stream
            .write_all(&len.to_be_bytes())
            .await
            .map_err(|e| Self::map_io_error(e, "writing length prefix"))?;
        stream
            .write_all(data)
            .await
            .map_err(|e| Self::map_io_error(e, "writing data"))?;
        stream
            .flush()
            .await
            .map_err(|e| Self::map_io_error(e, "flushing stream"))?;

        Ok(())
    }

    pub async fn receive_message(stream: &mut TcpStream) -> Result<Vec<u8>> {
        let mut len_buf = [0u8; 4];
        stream
            .read_exact(&mut len_buf)
            .await
            .map_err(|e| Self::map_io_error(e, "reading length prefix"))?;

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(GeoRpcError::InvalidResponse(format!(
                "Message too large: {} bytes (max {} bytes)",
                len, MAX_MESSAGE_SIZE
            )));
        }

        let mut buf = vec![0u8; len];
        stream
            .read_exact(&mut buf)
            .await
            .map_err(|e| Self::map_io_error(e, "reading data"))?;

        Ok(buf)
    }

    fn map_io_error(err: std::io::Error, context: &str) -> GeoRpcError {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                GeoRpcError::Connection(format!("{}: timed out", context))
            }
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof => {
                GeoRpcError::Connection(format!("{}: connection lost", context))
            }
            _ => GeoRpcError::Io(err),
        }
    }
}
