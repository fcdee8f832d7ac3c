//! Control-plane messages used to discover the backend topology.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GetServersRequest {}

/// One backend process as reported by `GetServers`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    pub id: String,
    pub rpc_addr: String,
    #[serde(default)]
    pub is_leader: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GetServersResponse {
    #[serde(default)]
    pub servers: Vec<Server>,
}

impl Server {
    pub fn new(id: impl Into<String>, rpc_addr: impl Into<String>, is_leader: bool) -> Self {
        Self {
            id: id.into(),
            rpc_addr: rpc_addr.into(),
            is_leader,
        }
    }
}
