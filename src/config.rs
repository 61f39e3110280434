use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::poller::PollIntervals;

const CONFIG_FILE: &str = "haki-chat.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Base URL of the marketplace backend.
    pub api_base_url: String,
    /// Push channel endpoint. Derived from `api_base_url` when empty.
    pub ws_url: String,
    /// Base URL that uploaded chat files are served from. Derived from
    /// `api_base_url` when empty.
    pub asset_base_url: String,
    /// Poll cadence while the push channel is down.
    pub poll_interval_ms: u64,
    /// Relaxed poll cadence while the push channel is up. Polling keeps
    /// running either way as a delivery backstop.
    pub poll_interval_connected_ms: u64,
    pub reconnect_delay_ms: u64,
    pub max_upload_bytes: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:5000".to_string(),
            ws_url: String::new(),
            asset_base_url: String::new(),
            poll_interval_ms: 2_000,
            poll_interval_connected_ms: 15_000,
            reconnect_delay_ms: 2_000,
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

impl ChatConfig {
    fn config_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if let Ok(text) = fs::read_to_string(&path) {
                match toml::from_str::<ChatConfig>(&text) {
                    Ok(config) => return config,
                    Err(err) => log::warn!("ignoring malformed config {}: {err}", path.display()),
                }
            }
        }
        Self::default()
    }

    pub fn save(&self) -> std::io::Result<()> {
        if let Some(path) = Self::config_path() {
            if let Some(parent) = path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            let toml = toml::to_string_pretty(self)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
            fs::write(path, toml)
        } else {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "No config dir"))
        }
    }

    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    /// Push endpoint, falling back to the API base with the scheme swapped.
    pub fn ws_endpoint(&self) -> String {
        if !self.ws_url.is_empty() {
            return self.ws_url.clone();
        }
        let base = self.api_base();
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("ws://{base}")
        }
    }

    /// Where `FILE:`-referenced uploads are served from.
    pub fn asset_base(&self) -> String {
        if !self.asset_base_url.is_empty() {
            return self.asset_base_url.trim_end_matches('/').to_string();
        }
        format!("{}/chat/uploads", self.api_base())
    }

    pub fn poll_intervals(&self) -> PollIntervals {
        PollIntervals {
            connected: Duration::from_millis(self.poll_interval_connected_ms),
            disconnected: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_endpoint_swaps_scheme() {
        let mut config = ChatConfig::default();
        config.api_base_url = "https://api.haki.example/".to_string();
        assert_eq!(config.ws_endpoint(), "wss://api.haki.example");

        config.api_base_url = "http://127.0.0.1:5000".to_string();
        assert_eq!(config.ws_endpoint(), "ws://127.0.0.1:5000");

        config.ws_url = "ws://push.haki.example/socket".to_string();
        assert_eq!(config.ws_endpoint(), "ws://push.haki.example/socket");
    }

    #[test]
    fn asset_base_defaults_to_upload_route() {
        let config = ChatConfig::default();
        assert_eq!(config.asset_base(), "http://127.0.0.1:5000/chat/uploads");

        let mut config = ChatConfig::default();
        config.asset_base_url = "https://cdn.haki.example/files/".to_string();
        assert_eq!(config.asset_base(), "https://cdn.haki.example/files");
    }

    #[test]
    fn parses_partial_toml() {
        let config: ChatConfig =
            toml::from_str("api_base_url = \"https://api.haki.example\"\npoll_interval_ms = 500\n")
                .expect("partial config should parse");
        assert_eq!(config.api_base_url, "https://api.haki.example");
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
    }
}
