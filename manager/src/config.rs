//! JSON configuration for the warden binary.

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

fn default_poll_interval() -> u64 {
    30
}

/// One managed game server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub address: SocketAddr,
    pub rcon_password: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl ServerConfig {
    /// Display name, falling back to the address.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.address.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WardenConfig {
    pub servers: Vec<ServerConfig>,
    /// Seconds between status polls per server.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl WardenConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
