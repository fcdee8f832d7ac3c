//! georpc Common Types and Transport
//!
//! This crate provides the protocol definitions and the TCP transport layer
//! shared by the georpc client crates.
//!
//! # Overview
//!
//! The geo backend is a replicated service with one leader and several
//! followers. Clients talk to it over a small length-prefixed JSON protocol:
//!
//! - **Protocol Layer**: Request/Response types, discovery messages, the geo
//!   method vocabulary and the shared error type
//! - **Transport Layer**: async TCP framing plus a minimal server used to
//!   stand in for the backend
//!
//! # Wire Format
//!
//! - **Transport**: TCP
//! - **Serialization**: JSON
//! - **Message Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//! - **Max Message Size**: 100 MB
//!
//! # Example
//!
//! ```no_run
//! use georpc_common::{GeoMethod, Request, Response};
//! use serde_json::json;
//!
//! let request = Request::new(GeoMethod::GetAddress.full_name(), json!({"id": "a1"}))
//!     .with_timeout(5000)
//!     .with_metadata("service-client", "docs");
//!
//! let response = Response::success(request.id, json!({"address": {}}));
//! assert!(response.success);
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
