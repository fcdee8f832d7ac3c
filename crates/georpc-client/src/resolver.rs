use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use georpc_common::transport::TcpTransportAsync;
use georpc_common::{GeoMethod, GeoRpcError, GetServersRequest, GetServersResponse, Request, Result};
use tokio::sync::{Mutex, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::topology::ResolvedTopology;

/// Source of the current backend topology.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Fails with [`GeoRpcError::DiscoveryUnavailable`] when the topology
    /// cannot be fetched.
    async fn discover(&self) -> Result<ResolvedTopology>;
}

/// Name-resolution plugin interface: where the resolver publishes topologies.
#[async_trait]
pub trait TopologySink: Send + Sync {
    /// Replaces the sink's address book with `topology`.
    async fn update_topology(&self, topology: &ResolvedTopology);

    /// Called after a refresh that found the topology unchanged, so the sink
    /// can re-dial nodes it failed to reach.
    async fn reconnect(&self) {}
}

/// Wakes the refresh loop early, e.g. after a connection to a node dropped.
#[derive(Debug, Clone, Default)]
pub struct DegradedSignal {
    notify: Arc<Notify>,
}

impl DegradedSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a refresh. Signals raised while a refresh is running are
    /// coalesced into one follow-up refresh.
    pub fn signal(&self) {
        self.notify.notify_one();
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Discovers the topology by calling `GetServers` on a bootstrap address.
pub struct RpcDiscovery {
    bootstrap_addr: String,
    transport: TcpTransportAsync,
    timeout: Duration,
    caller: String,
}

impl RpcDiscovery {
    pub fn new(bootstrap_addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bootstrap_addr: bootstrap_addr.into(),
            transport: TcpTransportAsync::new(),
            timeout,
            caller: String::new(),
        }
    }

    /// Sets the `service-client` metadata sent with each discovery call.
    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = caller.into();
        self
    }

    pub fn bootstrap_addr(&self) -> &str {
        &self.bootstrap_addr
    }

    async fn fetch_servers(&self) -> Result<GetServersResponse> {
        let args = serde_json::to_value(GetServersRequest::default())?;
        let mut request = Request::new(GeoMethod::GetServers.full_name(), args)
            .with_timeout(self.timeout.as_millis() as u64);
        if !self.caller.is_empty() {
            request = request.with_metadata(crate::client::SERVICE_CLIENT_KEY, self.caller.clone());
        }

        let mut stream = self
            .transport
            .connect_timeout(&self.bootstrap_addr, self.timeout)
            .await?;
        let response = tokio::time::timeout(self.timeout, self.transport.send_request(&mut stream, &request))
            .await
            .map_err(|_| GeoRpcError::Timeout(self.timeout.as_millis() as u64))??;

        if !response.success {
            return Err(GeoRpcError::Remote(
                response.error.unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        let result = response
            .result
            .ok_or_else(|| GeoRpcError::InvalidResponse("Missing result in GetServers response".to_string()))?;
        Ok(serde_json::from_value(result)?)
    }
}

#[async_trait]
impl Discovery for RpcDiscovery {
    async fn discover(&self) -> Result<ResolvedTopology> {
        let servers = self.fetch_servers().await.map_err(|e| {
            GeoRpcError::DiscoveryUnavailable(format!("{}: {}", self.bootstrap_addr, e))
        })?;
        Ok(ResolvedTopology::from_servers(&servers.servers))
    }
}

/// Topology refresh configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub refresh_interval: Duration,
    pub discovery_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            discovery_timeout: Duration::from_secs(5),
        }
    }
}

/// Keeps a [`TopologySink`] supplied with the current backend topology.
///
/// Discovery runs single-flight: a refresh requested while another is in
/// progress is skipped. A failed discovery or an inconsistent topology leaves
/// the last published topology in place.
pub struct TopologyResolver {
    discovery: Arc<dyn Discovery>,
    sink: Arc<dyn TopologySink>,
    config: ResolverConfig,
    degraded: DegradedSignal,
    in_flight: Mutex<()>,
    publish_lock: Mutex<()>,
    last_published: ArcSwapOption<ResolvedTopology>,
}

impl TopologyResolver {
    pub fn new(
        discovery: Arc<dyn Discovery>,
        sink: Arc<dyn TopologySink>,
        config: ResolverConfig,
        degraded: DegradedSignal,
    ) -> Self {
        Self {
            discovery,
            sink,
            config,
            degraded,
            in_flight: Mutex::new(()),
            publish_lock: Mutex::new(()),
            last_published: ArcSwapOption::empty(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn degraded_signal(&self) -> DegradedSignal {
        self.degraded.clone()
    }

    pub fn last_published(&self) -> Option<Arc<ResolvedTopology>> {
        self.last_published.load_full()
    }

    /// Runs one Discover + Publish cycle.
    ///
    /// Returns `Ok(true)` when a new topology reached the sink and `Ok(false)`
    /// when it was unchanged or another refresh was already in flight.
    pub async fn resolve_now(&self) -> Result<bool> {
        let _in_flight = match self.in_flight.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("topology refresh already in flight");
                return Ok(false);
            }
        };

        let topology = match self.discovery.discover().await {
            Ok(topology) => topology,
            Err(e) => {
                let e = match e {
                    GeoRpcError::DiscoveryUnavailable(_) => e,
                    other => GeoRpcError::DiscoveryUnavailable(other.to_string()),
                };
                warn!(error = %e, "topology discovery failed, keeping last known topology");
                return Err(e);
            }
        };

        self.publish(topology).await
    }

    /// Validates `topology` and hands it to the sink if it differs from the
    /// last published one.
    pub async fn publish(&self, topology: ResolvedTopology) -> Result<bool> {
        if let Err(e) = topology.validate() {
            warn!(error = %e, nodes = topology.len(), "discarding inconsistent topology");
            return Err(e);
        }

        let _publish = self.publish_lock.lock().await;

        if self.last_published.load().as_deref() == Some(&topology) {
            debug!(nodes = topology.len(), "topology unchanged");
            return Ok(false);
        }

        if topology.is_empty() {
            warn!("publishing empty topology");
        }

        self.sink.update_topology(&topology).await;
        info!(
            leader = topology.leader().map(|n| n.addr.as_str()).unwrap_or("-"),
            followers = topology.followers().count(),
            "topology updated"
        );
        self.last_published.store(Some(Arc::new(topology)));

        Ok(true)
    }

    /// Starts the refresh loop on its own task.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Refreshes on every tick of `refresh_interval` and whenever the
    /// degraded signal fires. The first tick is one interval after start;
    /// callers wanting a topology right away run [`resolve_now`](Self::resolve_now) first.
    async fn run(self: Arc<Self>) {
        let period = self.config.refresh_interval;
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.degraded.notified() => {
                    debug!("connectivity degraded, refreshing topology early");
                    interval.reset();
                }
            }

            // Errors were already logged; the next tick retries
            if let Ok(false) = self.resolve_now().await {
                self.sink.reconnect().await;
            }
        }
    }
}
