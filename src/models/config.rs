use crate::proxy::ProxyConfig;
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Directory for rolling log files; defaults to `<data dir>/logs`
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }
}
