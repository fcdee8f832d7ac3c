//! Leader/follower aware client for the geo service.
//!
//! The geo backend runs one leader and several followers. Mutations must
//! reach the leader; retrievals may be served by any follower. This crate
//! routes every call accordingly:
//!
//! - [`MethodClassifier`] maps a method name to an [`OperationIntent`]
//! - [`TopologyResolver`] discovers the node set and roles and publishes it
//!   to a [`TopologySink`]
//! - [`ConnectionManager`] is that sink: it keeps a [`Channel`] per reachable
//!   node and rebuilds the picker whenever the ready set changes
//! - [`RoutingPicker`] chooses the channel for each call: the leader for
//!   writes, followers in round-robin order for reads
//! - [`GeoClient`] wires the pieces together and exposes the geo methods

pub mod classifier;
pub mod client;
pub mod config;
pub mod manager;
pub mod picker;
pub mod resolver;
pub mod topology;

pub use classifier::{MethodClassifier, OperationIntent};
pub use client::{GeoClient, SERVICE_CLIENT_KEY};
pub use config::{ClientConfig, ClientOption};
pub use manager::{Channel, ConnectionManager, ManagerConfig};
pub use picker::{ConnectionPicker, ReadFallback, ReadyConnection, RoutingPicker};
pub use resolver::{DegradedSignal, Discovery, ResolverConfig, RpcDiscovery, TopologyResolver, TopologySink};
pub use topology::{NodeAddress, ResolvedTopology};
