use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoRpcError {
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The bootstrap `GetServers` call failed or timed out.
    #[error("Discovery unavailable: {0}")]
    DiscoveryUnavailable(String),

    /// A freshly discovered topology broke the single-leader or unique-address rule.
    #[error("Inconsistent topology: {0}")]
    TopologyInconsistent(String),

    /// No ready connection can serve the call's intent.
    #[error("No connection available")]
    NoConnectionAvailable,
}

impl GeoRpcError {
    /// Whether the caller may re-attempt after the next topology update.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GeoRpcError::NoConnectionAvailable
                | GeoRpcError::Connection(_)
                | GeoRpcError::Timeout(_)
                | GeoRpcError::DiscoveryUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GeoRpcError>;
