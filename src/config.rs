use std::collections::BTreeMap;
use std::env;

use serde::{Deserialize, Serialize};

use crate::membership::Membership;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node_id: String,
    pub peers: BTreeMap<String, String>,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Reads `NODE_ID`, `PEERS` and `SERVER_HOST`/`SERVER_PORT` from the
    /// environment. `PEERS` is `node_id=http://host:port` pairs separated
    /// by commas, and must include an entry for `NODE_ID` itself (§6).
    pub fn from_env() -> anyhow::Result<Self> {
        let node_id =
            env::var("NODE_ID").map_err(|_| anyhow::anyhow!("NODE_ID must be set"))?;

        let peers_raw =
            env::var("PEERS").map_err(|_| anyhow::anyhow!("PEERS must be set"))?;
        let peers = parse_peer_map(&peers_raw)?;

        Ok(Self {
            node_id,
            peers,
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn membership(&self) -> anyhow::Result<Membership> {
        Membership::new(self.node_id.clone(), self.peers.clone())
    }
}

fn parse_peer_map(raw: &str) -> anyhow::Result<BTreeMap<String, String>> {
    let mut peers = BTreeMap::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (node_id, url) = entry
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("malformed PEERS entry {entry:?}, expected id=url"))?;
        peers.insert(node_id.to_string(), url.to_string());
    }
    anyhow::ensure!(!peers.is_empty(), "PEERS must name at least one node");
    Ok(peers)
}
