use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Relay service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Whether to accept connections from the local network
    /// - false: loopback only, 127.0.0.1 (default)
    /// - true: all interfaces, 0.0.0.0
    #[serde(default)]
    pub allow_lan_access: bool,

    /// Listening port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public hostname this relay is served under. Requests addressed to it
    /// without an `Origin` header are treated as same-origin.
    #[serde(default)]
    pub public_host: Option<String>,

    /// Host fragments that mark a request as local/same-origin
    #[serde(default = "default_trusted_hosts")]
    pub trusted_hosts: Vec<String>,

    /// Upstream request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Outbound proxy configuration
    #[serde(default)]
    pub upstream_proxy: UpstreamProxyConfig,

    /// Where API keys are looked up
    #[serde(default)]
    pub key_store: KeyStoreConfig,
}

/// Outbound proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpstreamProxyConfig {
    /// Whether enabled
    pub enabled: bool,
    /// Proxy address (http://, https://, socks5://)
    pub url: String,
}

/// API key backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyStoreConfig {
    /// Keys listed inline. A payload may be a JSON object with `origins` /
    /// `urls` lists or any bare marker value.
    Memory {
        #[serde(default)]
        keys: HashMap<String, serde_json::Value>,
    },
    /// Keys read from a SQLite table with `key` and `value` text columns
    Sqlite {
        path: String,
        #[serde(default = "default_table")]
        table: String,
    },
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        KeyStoreConfig::Memory {
            keys: HashMap::new(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            allow_lan_access: false,
            port: default_port(),
            public_host: None,
            trusted_hosts: default_trusted_hosts(),
            request_timeout: default_request_timeout(),
            upstream_proxy: UpstreamProxyConfig::default(),
            key_store: KeyStoreConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    8787
}

fn default_trusted_hosts() -> Vec<String> {
    vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
        "[::1]".to_string(),
    ]
}

fn default_request_timeout() -> u64 {
    120
}

fn default_table() -> String {
    "api_keys".to_string()
}

impl ProxyConfig {
    /// Get the actual listening address
    pub fn get_bind_address(&self) -> &str {
        if self.allow_lan_access {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        }
    }

    /// Trusted host fragments, including the public hostname when set
    pub fn same_origin_hosts(&self) -> Vec<String> {
        let mut hosts = self.trusted_hosts.clone();
        if let Some(public) = self.public_host.as_ref().filter(|h| !h.is_empty()) {
            hosts.push(public.clone());
        }
        hosts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config: ProxyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.port, 8787);
        assert_eq!(config.get_bind_address(), "127.0.0.1");
        assert_eq!(config.request_timeout, 120);
        assert!(matches!(config.key_store, KeyStoreConfig::Memory { ref keys } if keys.is_empty()));
    }

    #[test]
    fn test_key_store_tagging() {
        let config: ProxyConfig = serde_json::from_str(
            r#"{"key_store": {"type": "sqlite", "path": "/var/lib/fcors/keys.db"}}"#,
        )
        .unwrap();
        match config.key_store {
            KeyStoreConfig::Sqlite { path, table } => {
                assert_eq!(path, "/var/lib/fcors/keys.db");
                assert_eq!(table, "api_keys");
            }
            other => panic!("unexpected store config: {:?}", other),
        }
    }

    #[test]
    fn test_public_host_is_trusted() {
        let config = ProxyConfig {
            public_host: Some("cors.example.dev".to_string()),
            ..ProxyConfig::default()
        };
        let hosts = config.same_origin_hosts();
        assert!(hosts.contains(&"localhost".to_string()));
        assert!(hosts.contains(&"cors.example.dev".to_string()));
    }
}
