use std::time::Duration;

use georpc_common::{GeoRpcError, Result};

use crate::classifier::OperationIntent;
use crate::manager::ManagerConfig;
use crate::picker::ReadFallback;
use crate::resolver::ResolverConfig;

pub const DEFAULT_SERVICE_HOST: &str = "127.0.0.1";
pub const DEFAULT_SERVICE_PORT: u16 = 62051;
pub const DEFAULT_CLIENT_NAME: &str = "comfforts-geo-client";

pub const ENV_SERVICE_HOST: &str = "GEO_SERVICE_HOST";
pub const ENV_SERVICE_PORT: &str = "GEO_SERVICE_PORT";
pub const ENV_REFRESH_INTERVAL_SECS: &str = "GEO_REFRESH_INTERVAL_SECS";

/// Where to find the geo service and how often to re-discover it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub service_host: String,
    pub service_port: u16,
    pub refresh_interval: Duration,
    pub discovery_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let resolver = ResolverConfig::default();
        Self {
            service_host: DEFAULT_SERVICE_HOST.to_string(),
            service_port: DEFAULT_SERVICE_PORT,
            refresh_interval: resolver.refresh_interval,
            discovery_timeout: resolver.discovery_timeout,
        }
    }
}

impl ClientConfig {
    /// Reads `GEO_SERVICE_HOST`, `GEO_SERVICE_PORT` and
    /// `GEO_REFRESH_INTERVAL_SECS`; unset or empty variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(host) = var(ENV_SERVICE_HOST) {
            config.service_host = host;
        }
        if let Some(port) = var(ENV_SERVICE_PORT) {
            config.service_port = port
                .trim()
                .parse()
                .map_err(|e| GeoRpcError::Config(format!("{}={:?}: {}", ENV_SERVICE_PORT, port, e)))?;
        }
        if let Some(secs) = var(ENV_REFRESH_INTERVAL_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|e| {
                GeoRpcError::Config(format!("{}={:?}: {}", ENV_REFRESH_INTERVAL_SECS, secs, e))
            })?;
            config.refresh_interval = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval.is_zero() {
            return Err(GeoRpcError::Config("refresh interval must be non-zero".to_string()));
        }
        Ok(())
    }

    /// The bootstrap address discovery calls go to.
    pub fn bootstrap_addr(&self) -> String {
        format!("{}:{}", self.service_host, self.service_port)
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            refresh_interval: self.refresh_interval,
            discovery_timeout: self.discovery_timeout,
        }
    }
}

/// Per-client call options.
#[derive(Debug, Clone)]
pub struct ClientOption {
    /// Dial timeout, also used as the deadline of every call.
    pub dial_timeout: Duration,
    /// How long an idle stream may be kept for reuse.
    pub keep_alive: Duration,
    /// Sent as `service-client` metadata and used in log lines.
    /// Empty means [`DEFAULT_CLIENT_NAME`].
    pub caller: String,
    pub read_fallback: ReadFallback,
    /// Intent assumed for method names the classifier does not know.
    pub unknown_method_intent: OperationIntent,
}

impl Default for ClientOption {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(5),
            keep_alive: Duration::from_secs(30),
            caller: String::new(),
            read_fallback: ReadFallback::Leader,
            unknown_method_intent: OperationIntent::Write,
        }
    }
}

impl ClientOption {
    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = caller.into();
        self
    }

    pub fn caller(&self) -> &str {
        if self.caller.is_empty() {
            DEFAULT_CLIENT_NAME
        } else {
            &self.caller
        }
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            dial_timeout: self.dial_timeout,
            idle_timeout: self.keep_alive,
            ..ManagerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.bootstrap_addr(), "127.0.0.1:62051");
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.discovery_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_from_lookup() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_SERVICE_HOST, "geo.internal"),
            (ENV_SERVICE_PORT, "7000"),
            (ENV_REFRESH_INTERVAL_SECS, "10"),
        ]))
        .unwrap();
        assert_eq!(config.bootstrap_addr(), "geo.internal:7000");
        assert_eq!(config.resolver_config().refresh_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_empty_vars_keep_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_SERVICE_HOST, ""),
            (ENV_SERVICE_PORT, "  "),
        ]))
        .unwrap();
        assert_eq!(config.bootstrap_addr(), "127.0.0.1:62051");
    }

    #[test]
    fn test_invalid_port_is_config_error() {
        let err = ClientConfig::from_lookup(lookup(&[(ENV_SERVICE_PORT, "http")])).unwrap_err();
        assert!(matches!(err, GeoRpcError::Config(ref m) if m.contains(ENV_SERVICE_PORT)));
    }

    #[test]
    fn test_zero_refresh_interval_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[(ENV_REFRESH_INTERVAL_SECS, "0")])).unwrap_err();
        assert!(matches!(err, GeoRpcError::Config(_)));
    }

    #[test]
    fn test_client_option_default() {
        let option = ClientOption::default();
        assert_eq!(option.dial_timeout, Duration::from_secs(5));
        assert_eq!(option.keep_alive, Duration::from_secs(30));
        assert_eq!(option.caller(), DEFAULT_CLIENT_NAME);
        assert_eq!(option.read_fallback, ReadFallback::Leader);
        assert_eq!(option.unknown_method_intent, OperationIntent::Write);
    }

    #[test]
    fn test_client_option_caller_and_manager_config() {
        let option = ClientOption {
            keep_alive: Duration::from_secs(60),
            ..ClientOption::default()
        }
        .with_caller("billing");
        assert_eq!(option.caller(), "billing");

        let manager = option.manager_config();
        assert_eq!(manager.dial_timeout, Duration::from_secs(5));
        assert_eq!(manager.idle_timeout, Duration::from_secs(60));
    }
}
