//! TCP-based chat relay server with JSON serialization
//!
//! This library provides a channel-based text-chat relay: clients log in
//! with a unique username, join named channels, and exchange messages and
//! presence notifications that are routed only to channel co-members.

pub mod error;
pub mod protocol;
pub mod server;

pub use error::{RelayError, Result};
pub use server::RelayServer;

/// Channels that exist for the lifetime of the server, occupied or not.
pub const DEFAULT_CHANNELS: &[&str] = &["general", "python"];

/// Relay server configuration
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Server listen address
    pub bind_addr: std::net::SocketAddr,
    /// Channels seeded at startup that are never retired
    pub default_channels: Vec<String>,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9000".parse().unwrap(),
            default_channels: DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect(),
            max_connections: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.default_channels, vec!["general", "python"]);
    }
}
