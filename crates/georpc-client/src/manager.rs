use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use georpc_common::transport::TcpTransportAsync;
use georpc_common::{GeoRpcError, Request, Response, Result};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::picker::{ConnectionPicker, ReadyConnection};
use crate::resolver::{DegradedSignal, TopologySink};
use crate::topology::{NodeAddress, ResolvedTopology};

/// Connection manager configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Timeout for establishing a TCP connection to a node.
    pub dial_timeout: Duration,
    /// Idle streams older than this are closed instead of reused.
    pub idle_timeout: Duration,
    /// Maximum idle streams kept per node.
    pub max_idle_streams: usize,
    /// How long a node reported as failed is left out of re-dials.
    pub failure_backoff: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(30),
            max_idle_streams: 8,
            failure_backoff: Duration::from_secs(5),
        }
    }
}

struct IdleStream {
    stream: TcpStream,
    since: Instant,
}

/// An established connection to one backend node.
///
/// Holds a small LIFO stack of idle streams so concurrent calls to the same
/// node each get their own stream. A stream that fails mid-call is dropped.
pub struct Channel {
    node: NodeAddress,
    transport: TcpTransportAsync,
    config: ManagerConfig,
    idle: Mutex<Vec<IdleStream>>,
}

impl Channel {
    /// Dials `node`; the channel only exists once a stream is established.
    pub async fn dial(node: NodeAddress, config: ManagerConfig) -> Result<Self> {
        let transport = TcpTransportAsync::new();
        let stream = transport.connect_timeout(&node.addr, config.dial_timeout).await?;

        Ok(Self {
            node,
            transport,
            config,
            idle: Mutex::new(vec![IdleStream {
                stream,
                since: Instant::now(),
            }]),
        })
    }

    pub fn address(&self) -> &NodeAddress {
        &self.node
    }

    pub fn addr(&self) -> &str {
        &self.node.addr
    }

    pub fn is_leader(&self) -> bool {
        self.node.is_leader
    }

    /// Sends `request` and waits up to `timeout` for its response.
    ///
    /// If a reused idle stream turns out to be closed, the call is retried
    /// once on a freshly dialed stream; the redial gets its own
    /// `dial_timeout` and the retried exchange a fresh `timeout`.
    pub async fn call(&self, request: &Request, timeout: Duration) -> Result<Response> {
        if let Some(mut stream) = self.take_idle().await {
            match self.exchange(&mut stream, request, timeout).await {
                Ok(response) => {
                    self.put_idle(stream).await;
                    return Ok(response);
                }
                Err(GeoRpcError::Connection(reason)) => {
                    debug!(addr = %self.node.addr, %reason, "idle stream closed, redialing");
                }
                Err(e) => return Err(e),
            }
        }

        let mut stream = self
            .transport
            .connect_timeout(&self.node.addr, self.config.dial_timeout)
            .await?;
        let response = self.exchange(&mut stream, request, timeout).await?;
        self.put_idle(stream).await;
        Ok(response)
    }

    async fn exchange(&self, stream: &mut TcpStream, request: &Request, timeout: Duration) -> Result<Response> {
        tokio::time::timeout(timeout, self.transport.send_request(stream, request))
            .await
            .map_err(|_| GeoRpcError::Timeout(timeout.as_millis() as u64))?
    }

    async fn take_idle(&self) -> Option<TcpStream> {
        let mut idle = self.idle.lock().await;
        while let Some(entry) = idle.pop() {
            if entry.since.elapsed() < self.config.idle_timeout {
                return Some(entry.stream);
            }
        }
        None
    }

    async fn put_idle(&self, stream: TcpStream) {
        let mut idle = self.idle.lock().await;
        if idle.len() < self.config.max_idle_streams {
            idle.push(IdleStream {
                stream,
                since: Instant::now(),
            });
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").field("node", &self.node).finish()
    }
}

#[derive(Default)]
struct ManagerState {
    topology: ResolvedTopology,
    channels: BTreeMap<String, Arc<Channel>>,
    /// When each node was last reported as failed.
    failed: BTreeMap<String, Instant>,
}

/// Maintains one [`Channel`] per reachable node of the published topology and
/// rebuilds the injected picker whenever the ready set changes.
pub struct ConnectionManager {
    picker: Arc<dyn ConnectionPicker<Arc<Channel>>>,
    config: ManagerConfig,
    degraded: DegradedSignal,
    state: Mutex<ManagerState>,
}

impl ConnectionManager {
    pub fn new(
        picker: Arc<dyn ConnectionPicker<Arc<Channel>>>,
        config: ManagerConfig,
        degraded: DegradedSignal,
    ) -> Self {
        Self {
            picker,
            config,
            degraded,
            state: Mutex::new(ManagerState::default()),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Nodes that currently have a ready channel, sorted by address.
    pub async fn ready_nodes(&self) -> Vec<NodeAddress> {
        let state = self.state.lock().await;
        state.channels.values().map(|ch| ch.address().clone()).collect()
    }

    /// Drops `channel` from the ready set after a failed or timed-out call and
    /// asks the resolver for an early refresh.
    ///
    /// The node is not re-dialed for `failure_backoff`. A channel that was
    /// already replaced is left alone.
    pub async fn report_failure(&self, channel: &Arc<Channel>) {
        let mut state = self.state.lock().await;
        let is_current = state
            .channels
            .get(channel.addr())
            .is_some_and(|current| Arc::ptr_eq(current, channel));
        if !is_current {
            return;
        }

        state.channels.remove(channel.addr());
        state.failed.insert(channel.addr().to_string(), Instant::now());
        warn!(node = %channel.address(), "node failed, removing it from ready set");
        self.rebuild_picker(&state);
        self.degraded.signal();
    }

    /// Closes every channel and leaves the picker with nothing to pick.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.channels.clear();
        state.failed.clear();
        state.topology = ResolvedTopology::empty();
        self.rebuild_picker(&state);
    }

    /// Brings the channel set in line with `topology`: keeps channels whose
    /// address and role are unchanged, dials the rest, drops the channels of
    /// departed nodes.
    ///
    /// `state` is only touched once every dial has finished, so a caller that
    /// gives up mid-way leaves the previous channels and picker in place.
    async fn sync_channels(&self, state: &mut ManagerState, topology: ResolvedTopology) {
        let mut next = BTreeMap::new();
        let mut to_dial = Vec::new();

        for node in topology.nodes() {
            match state.channels.get(&node.addr) {
                Some(channel) if channel.address() == node => {
                    next.insert(node.addr.clone(), Arc::clone(channel));
                }
                _ if self.backing_off(state, &node.addr) => {
                    debug!(node = %node, "node recently failed, not re-dialing yet");
                }
                _ => to_dial.push(node.clone()),
            }
        }

        let dials = to_dial
            .into_iter()
            .map(|node| Channel::dial(node, self.config.clone()));
        let results = futures::future::join_all(dials).await;

        for result in results {
            match result {
                Ok(channel) => {
                    debug!(node = %channel.address(), "channel ready");
                    state.failed.remove(channel.addr());
                    next.insert(channel.addr().to_string(), Arc::new(channel));
                }
                Err(e) => {
                    warn!(error = %e, "failed to connect to node");
                }
            }
        }

        for departed in state.channels.keys().filter(|addr| !next.contains_key(*addr)) {
            debug!(addr = %departed, "closing channel");
        }
        state
            .failed
            .retain(|addr, _| topology.nodes().iter().any(|node| &node.addr == addr));

        state.channels = next;
        state.topology = topology;
        self.rebuild_picker(state);
    }

    fn backing_off(&self, state: &ManagerState, addr: &str) -> bool {
        state
            .failed
            .get(addr)
            .is_some_and(|at| at.elapsed() < self.config.failure_backoff)
    }

    fn rebuild_picker(&self, state: &ManagerState) {
        let ready: Vec<ReadyConnection<Arc<Channel>>> = state
            .channels
            .values()
            .map(|ch| ReadyConnection::new(Arc::clone(ch), ch.address().clone()))
            .collect();

        info!(
            ready = ready.len(),
            known = state.topology.len(),
            "ready connections changed"
        );
        self.picker.build(&ready);
    }
}

#[async_trait]
impl TopologySink for ConnectionManager {
    async fn update_topology(&self, topology: &ResolvedTopology) {
        let mut state = self.state.lock().await;
        if state.topology == *topology && state.channels.len() == topology.len() {
            debug!("address set unchanged");
            return;
        }
        self.sync_channels(&mut state, topology.clone()).await;
    }

    async fn reconnect(&self) {
        let mut state = self.state.lock().await;
        if state.channels.len() == state.topology.len() {
            return;
        }
        debug!(
            missing = state.topology.len() - state.channels.len(),
            "re-dialing unreachable nodes"
        );
        let topology = state.topology.clone();
        self.sync_channels(&mut state, topology).await;
    }
}
