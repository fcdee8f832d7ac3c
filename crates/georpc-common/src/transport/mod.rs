//! georpc Transport Layer
//!
//! Async TCP transport and JSON codec for sending/receiving RPC messages.
//!
//! # Architecture
//!
//! - **Transport**: TCP, one request in flight per stream
//! - **Codec**: JSON serialization for protocol messages
//! - **Wire Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//!
//! # Components
//!
//! - **[`JsonCodec`]**: Encode/decode protocol messages to JSON
//! - **[`TcpTransportAsync`]**: Async TCP client transport
//! - **[`TcpServer`]**: Async TCP server, used to stand in for the backend
//!
//! # Example
//!
//! ```no_run
//! use georpc_common::transport::TcpTransportAsync;
//! use georpc_common::{GeoMethod, Request};
//! use serde_json::json;
//!
//! # async fn run() -> georpc_common::Result<()> {
//! let transport = TcpTransportAsync::new();
//! let mut stream = transport.connect("127.0.0.1:62051").await?;
//!
//! let request = Request::new(GeoMethod::GetServers.full_name(), json!({}));
//! let response = transport.send_request(&mut stream, &request).await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod tcp;
pub mod tcp_server;

pub use codec::JsonCodec;
pub use tcp::{TcpTransportAsync, MAX_MESSAGE_SIZE};
pub use tcp_server::TcpServer;

#[cfg(test)]
mod tests;
