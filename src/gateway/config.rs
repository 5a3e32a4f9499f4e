/*
 * ==========================================================================
 * RELAY - runtime core
 * ==========================================================================
 *
 * Author:   Sam Wilcox
 * Github:   https://github.com/samwilcox/pawx
 *
 * License: dual MIT / Apache-2.0, see LICENSE files.
 * ==========================================================================
 */

//! Gateway configuration.
//!
//! The core has no CLI of its own; the host binary (`src/bin/gateway.rs`)
//! is expected to build one of these, from flags, environment variables, or
//! a config file, however that host chooses.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub custom_headers: HashMap<String, String>,
    /// 16 hex characters; auto-generated when left empty.
    pub node_id: String,
    pub peer_discovery_interval: Option<Duration>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            host: "0.0.0.0".to_string(),
            port: 7878,
            enable_cors: true,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            custom_headers: HashMap::new(),
            node_id: generate_node_id(),
            peer_discovery_interval: None,
        }
    }
}

impl GatewayConfig {
    /// Fills in an empty `node_id` with a fresh random one; a caller that
    /// deserializes a config with `node_id: ""` still ends up with a valid id.
    pub fn with_node_id_default(mut self) -> Self {
        if self.node_id.is_empty() {
            self.node_id = generate_node_id();
        }
        self
    }
}

fn generate_node_id() -> String {
    let mut rng = rand::thread_rng();
    (0..16).map(|_| std::char::from_digit(rng.gen_range(0..16), 16).unwrap()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_node_id_is_sixteen_hex_chars() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.node_id.len(), 16);
        assert!(cfg.node_id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
