//! Node configuration from the environment.
//!
//! - `PEER`       comma-separated WebSocket URLs of gossip peers
//! - `PEER_HTTP`  HTTP base URL of the seed peer (bootstrap + watchdog)
//! - `PORT`       gossip listen port
//! - `HTTP_PORT`  read API listen port
//! - `DATA_DIR`   chain data directory

use std::path::PathBuf;

use cinder_core::{Error, Result};

/// Default gossip port.
const DEFAULT_PORT: u16 = 7070;
/// Default read API port.
const DEFAULT_HTTP_PORT: u16 = 7071;
/// Default data directory.
const DEFAULT_DATA_DIR: &str = "data";

/// Typed node configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub peers: Vec<String>,
    pub peer_http: Option<String>,
    pub port: u16,
    pub http_port: u16,
    pub data_dir: PathBuf,
}

impl Config {
    /// Read configuration from the environment, applying defaults.
    pub fn from_env() -> Result<Self> {
        let peers = std::env::var("PEER")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let peer_http = std::env::var("PEER_HTTP")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            peers,
            peer_http,
            port: parse_port("PORT", DEFAULT_PORT)?,
            http_port: parse_port("HTTP_PORT", DEFAULT_HTTP_PORT)?,
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR)),
        })
    }
}

fn parse_port(var: &str, default: u16) -> Result<u16> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::storage(format!("{var} is not a valid port: {raw}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        // Environment-dependent; only check the defaults are sane.
        assert_eq!(DEFAULT_PORT, 7070);
        assert_ne!(DEFAULT_PORT, DEFAULT_HTTP_PORT);
    }

    #[test]
    fn test_parse_port_rejects_garbage() {
        std::env::set_var("CINDER_TEST_PORT", "not-a-port");
        assert!(parse_port("CINDER_TEST_PORT", 1).is_err());
        std::env::remove_var("CINDER_TEST_PORT");
        assert_eq!(parse_port("CINDER_TEST_PORT", 9).unwrap(), 9);
    }
}
