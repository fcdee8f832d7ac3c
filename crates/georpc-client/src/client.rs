use std::sync::Arc;
use std::time::Duration;

use georpc_common::{GeoMethod, GeoRpcError, GetServersRequest, GetServersResponse, Request, Result};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::classifier::MethodClassifier;
use crate::config::{ClientConfig, ClientOption};
use crate::manager::{Channel, ConnectionManager};
use crate::picker::{ConnectionPicker, RoutingPicker};
use crate::resolver::{DegradedSignal, Discovery, ResolverConfig, RpcDiscovery, TopologyResolver};

/// Metadata key naming the calling service.
pub const SERVICE_CLIENT_KEY: &str = "service-client";

/// Client for the geo service.
///
/// Writes are sent to the current leader and reads are spread over the
/// followers. The topology is discovered from the bootstrap address and kept
/// current by a background refresh task that lives as long as the client.
///
/// # Example
///
/// ```no_run
/// use georpc_client::{ClientConfig, ClientOption, GeoClient};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::from_env()?;
/// let client = GeoClient::connect(config, ClientOption::default().with_caller("billing")).await?;
///
/// let added = client.add_address(json!({"street": "1 Main St", "city": "Springfield"})).await?;
/// let fetched = client.get_address(json!({"id": added["id"]})).await?;
/// # let _ = fetched;
/// client.close().await;
/// # Ok(())
/// # }
/// ```
pub struct GeoClient {
    option: ClientOption,
    picker: Arc<RoutingPicker<Arc<Channel>>>,
    manager: Arc<ConnectionManager>,
    resolver: Arc<TopologyResolver>,
    refresh_task: tokio::task::JoinHandle<()>,
}

impl GeoClient {
    /// Connects using `GetServers` on the configured bootstrap address.
    pub async fn connect(config: ClientConfig, option: ClientOption) -> Result<Self> {
        config.validate()?;
        let bootstrap_addr = config.bootstrap_addr();
        info!(client = option.caller(), %bootstrap_addr, "geo client bootstrap address");

        let discovery = RpcDiscovery::new(bootstrap_addr, config.discovery_timeout)
            .with_caller(option.caller());
        Self::with_discovery(Arc::new(discovery), config.resolver_config(), option).await
    }

    /// Connects using any [`Discovery`] source.
    ///
    /// Wires the picker into the connection manager and the manager into the
    /// resolver, runs one discovery, then starts the refresh task. A failed
    /// first discovery is logged; calls fail with
    /// [`GeoRpcError::NoConnectionAvailable`] until a later refresh succeeds.
    pub async fn with_discovery(
        discovery: Arc<dyn Discovery>,
        resolver_config: ResolverConfig,
        option: ClientOption,
    ) -> Result<Self> {
        if resolver_config.refresh_interval.is_zero() {
            return Err(GeoRpcError::Config("refresh interval must be non-zero".to_string()));
        }

        let classifier = MethodClassifier::with_default(option.unknown_method_intent);
        let picker = Arc::new(RoutingPicker::with_read_fallback(classifier, option.read_fallback));
        let degraded = DegradedSignal::new();
        let manager = Arc::new(ConnectionManager::new(
            picker.clone(),
            option.manager_config(),
            degraded.clone(),
        ));
        let resolver = Arc::new(TopologyResolver::new(
            discovery,
            manager.clone(),
            resolver_config,
            degraded,
        ));

        if let Err(e) = resolver.resolve_now().await {
            warn!(client = option.caller(), error = %e, "initial topology discovery failed");
        }
        let refresh_task = resolver.clone().spawn();

        info!(client = option.caller(), "geo client connected");
        Ok(Self {
            option,
            picker,
            manager,
            resolver,
            refresh_task,
        })
    }

    pub fn option(&self) -> &ClientOption {
        &self.option
    }

    pub fn picker(&self) -> &RoutingPicker<Arc<Channel>> {
        &self.picker
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn resolver(&self) -> &TopologyResolver {
        &self.resolver
    }

    /// Runs a topology refresh now instead of waiting for the next tick.
    pub async fn refresh_topology(&self) -> Result<bool> {
        self.resolver.resolve_now().await
    }

    pub async fn geo_locate(&self, req: Value) -> Result<Value> {
        self.invoke(GeoMethod::GeoLocate, req, "geo locating").await
    }

    pub async fn get_geo_route(&self, req: Value) -> Result<Value> {
        self.invoke(GeoMethod::GetGeoRoute, req, "fetching routes").await
    }

    pub async fn get_address_route(&self, req: Value) -> Result<Value> {
        self.invoke(GeoMethod::GetAddressRoute, req, "fetching routes").await
    }

    pub async fn add_geo(&self, req: Value) -> Result<Value> {
        self.invoke(GeoMethod::AddGeoLocation, req, "adding geo location").await
    }

    pub async fn get_geo(&self, req: Value) -> Result<Value> {
        self.invoke(GeoMethod::GetGeoLocation, req, "fetching geo location").await
    }

    pub async fn get_geos(&self, req: Value) -> Result<Value> {
        self.invoke(GeoMethod::GetGeoLocations, req, "fetching geo locations").await
    }

    pub async fn delete_geo(&self, req: Value) -> Result<Value> {
        self.invoke(GeoMethod::DeleteGeoLocation, req, "deleting geo location").await
    }

    pub async fn add_address(&self, req: Value) -> Result<Value> {
        self.invoke(GeoMethod::AddAddress, req, "adding address").await
    }

    pub async fn update_address(&self, req: Value) -> Result<Value> {
        self.invoke(GeoMethod::UpdateAddress, req, "updating address").await
    }

    pub async fn get_address(&self, req: Value) -> Result<Value> {
        self.invoke(GeoMethod::GetAddress, req, "fetching address").await
    }

    pub async fn get_addresses(&self, req: Value) -> Result<Value> {
        self.invoke(GeoMethod::GetAddresses, req, "fetching addresses").await
    }

    pub async fn get_addresses_by_ids(&self, req: Value) -> Result<Value> {
        self.invoke(GeoMethod::GetAddressesByIds, req, "fetching addresses").await
    }

    pub async fn delete_address(&self, req: Value) -> Result<Value> {
        self.invoke(GeoMethod::DeleteAddress, req, "deleting address").await
    }

    pub async fn get_servers(&self) -> Result<GetServersResponse> {
        let args = serde_json::to_value(GetServersRequest::default())?;
        let result = self.invoke(GeoMethod::GetServers, args, "getting server list").await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Stops the refresh task and closes every connection.
    pub async fn close(&self) {
        self.refresh_task.abort();
        self.manager.close().await;
        info!(client = self.option.caller(), "geo client closed");
    }

    async fn invoke(&self, method: GeoMethod, args: Value, action: &str) -> Result<Value> {
        let timeout = self.option.dial_timeout;
        let request = Request::new(method.full_name(), args)
            .with_timeout(timeout.as_millis() as u64)
            .with_metadata(SERVICE_CLIENT_KEY, self.option.caller());

        let result = self.forward(&request, timeout).await;
        if let Err(e) = &result {
            error!(
                client = self.option.caller(),
                method = %method,
                retryable = e.is_retryable(),
                error = %e,
                "error {}",
                action
            );
        }
        result
    }

    /// Picks a channel for the request and sends it, waiting up to `timeout`
    /// for the response.
    ///
    /// A lost connection or a node that does not answer in time is reported
    /// to the manager, which drops it from the ready set and triggers an
    /// early topology refresh.
    async fn forward(&self, request: &Request, timeout: Duration) -> Result<Value> {
        let channel = self.picker.pick(&request.method)?;
        debug!(method = %request.method, node = %channel.address(), "call routed");

        let response = match channel.call(request, timeout).await {
            Ok(response) => response,
            Err(e) => {
                if matches!(e, GeoRpcError::Connection(_) | GeoRpcError::Timeout(_)) {
                    self.manager.report_failure(&channel).await;
                }
                return Err(e);
            }
        };

        if !response.success {
            return Err(GeoRpcError::Remote(
                response.error.unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        response.result.ok_or_else(|| {
            GeoRpcError::InvalidResponse("Missing result in success response".to_string())
        })
    }
}

impl Drop for GeoClient {
    fn drop(&mut self) {
        self.refresh_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::ResolvedTopology;
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl Discovery for Unreachable {
        async fn discover(&self) -> Result<ResolvedTopology> {
            Err(GeoRpcError::DiscoveryUnavailable("bootstrap down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_client_starts_without_topology() {
        let client = GeoClient::with_discovery(
            Arc::new(Unreachable),
            ResolverConfig::default(),
            ClientOption::default(),
        )
        .await
        .unwrap();

        assert!(client.resolver().last_published().is_none());
        let err = client.get_address(serde_json::json!({"id": "a1"})).await.unwrap_err();
        assert!(matches!(err, GeoRpcError::NoConnectionAvailable));
        assert!(err.is_retryable());

        let err = client.add_address(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, GeoRpcError::NoConnectionAvailable));

        client.close().await;
    }

    #[tokio::test]
    async fn test_zero_refresh_interval_rejected() {
        let result = GeoClient::with_discovery(
            Arc::new(Unreachable),
            ResolverConfig {
                refresh_interval: Duration::ZERO,
                ..Default::default()
            },
            ClientOption::default(),
        )
        .await;
        assert!(matches!(result, Err(GeoRpcError::Config(_))));
    }

    #[tokio::test]
    async fn test_refresh_reports_discovery_unavailable() {
        let client = GeoClient::with_discovery(
            Arc::new(Unreachable),
            ResolverConfig::default(),
            ClientOption::default(),
        )
        .await
        .unwrap();

        assert!(matches!(
            client.refresh_topology().await,
            Err(GeoRpcError::DiscoveryUnavailable(_))
        ));
    }
}
