use anyhow::Result;
use georpc_client::{ClientConfig, ClientOption, GeoClient};
use georpc_common::transport::TcpServer;
use georpc_common::{GeoRpcError, GetServersResponse, Request, Response, Server};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Starts one in-process geo node that answers `GetServers` from `servers`
/// and echoes everything else with its own address.
async fn start_node(servers: Arc<Mutex<Vec<Server>>>) -> Result<String> {
    let server = TcpServer::new("127.0.0.1:0").await?;
    let addr = server.local_addr()?.to_string();
    let node = addr.clone();

    tokio::spawn(async move {
        let result = server
            .run_with_handler(move |req: Request| {
                let node = node.clone();
                let servers = servers.clone();
                async move {
                    if req.method.ends_with("/GetServers") {
                        let list = GetServersResponse {
                            servers: servers.lock().map(|s| s.clone()).unwrap_or_default(),
                        };
                        return Ok::<_, GeoRpcError>(Response::success(req.id, serde_json::to_value(list)?));
                    }
                    Ok(Response::success(req.id, json!({"node": node, "method": req.method})))
                }
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "node stopped");
        }
    });

    Ok(addr)
}

fn set_leader(servers: &Mutex<Vec<Server>>, addrs: &[String], leader: usize) {
    if let Ok(mut servers) = servers.lock() {
        *servers = addrs
            .iter()
            .enumerate()
            .map(|(i, addr)| Server::new(format!("geo-{}", i), addr.clone(), i == leader))
            .collect();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Three-node cluster, node 0 leads
    let servers = Arc::new(Mutex::new(Vec::new()));
    let mut addrs = Vec::new();
    for _ in 0..3 {
        addrs.push(start_node(servers.clone()).await?);
    }
    set_leader(&servers, &addrs, 0);

    let (host, port) = addrs[0]
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("bad node address {}", addrs[0]))?;
    let config = ClientConfig {
        service_host: host.to_string(),
        service_port: port.parse()?,
        refresh_interval: Duration::from_secs(2),
        ..ClientConfig::default()
    };
    let client = GeoClient::connect(config, ClientOption::default().with_caller("routing-demo")).await?;

    println!("Leader is {}", addrs[0]);
    for i in 0..3 {
        let result = client.add_address(json!({"street": format!("{} Main St", i)})).await?;
        println!("AddAddress  -> {}", result["node"]);
    }
    for i in 0..4 {
        let result = client.get_address(json!({"id": format!("a{}", i)})).await?;
        println!("GetAddress  -> {}", result["node"]);
    }

    // Move leadership and let the client pick it up
    set_leader(&servers, &addrs, 2);
    client.refresh_topology().await?;

    println!("Leader is now {}", addrs[2]);
    for i in 0..2 {
        let result = client.update_address(json!({"id": format!("a{}", i)})).await?;
        println!("UpdateAddress -> {}", result["node"]);
    }
    for i in 0..4 {
        let result = client.get_address(json!({"id": format!("a{}", i)})).await?;
        println!("GetAddress  -> {}", result["node"]);
    }

    let servers = client.get_servers().await?;
    println!("Cluster reports {} servers", servers.servers.len());

    client.close().await;
    Ok(())
}
