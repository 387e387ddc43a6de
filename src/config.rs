//! Configuration management for whatsapp-console.
//!
//! Configuration is loaded from `~/.config/whatsapp-console/config.toml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Gateway connection settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// User preferences.
    #[serde(default)]
    pub preferences: Preferences,
}

/// How to reach the gateway that hosts the messaging session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GatewayConfig {
    /// REST gateway over HTTP.
    Http {
        /// Base URL (default: http://127.0.0.1:8080).
        #[serde(default = "default_http_url")]
        url: String,
        /// Bearer token (prefer WHATSAPP_GATEWAY_TOKEN env var).
        #[serde(default)]
        token: Option<String>,
    },
    /// Gateway listening on a Unix domain socket.
    Socket {
        /// Socket path (default: $XDG_RUNTIME_DIR/whatsapp-gateway.sock).
        #[serde(default)]
        path: Option<PathBuf>,
    },
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig::Http {
            url: default_http_url(),
            token: None,
        }
    }
}

fn default_http_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

/// User preferences for the console.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    /// How many contacts a plain `list` shows.
    #[serde(default = "default_contact_limit")]
    pub contact_limit: usize,
    /// How long to wait for the gateway to report a live connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            contact_limit: default_contact_limit(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_contact_limit() -> usize {
    20
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Preferences {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Config {
    /// Get the config directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("whatsapp-console"))
            .context("Could not determine config directory")
    }

    /// Get the config file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Default socket path for the socket gateway.
    pub fn default_socket_path() -> Result<PathBuf> {
        // Prefer XDG_RUNTIME_DIR, fall back to ~/.local/run
        if let Some(runtime_dir) = std::env::var_os("XDG_RUNTIME_DIR") {
            Ok(PathBuf::from(runtime_dir).join("whatsapp-gateway.sock"))
        } else {
            dirs::home_dir()
                .map(|p| p.join(".local/run/whatsapp-gateway.sock"))
                .context("Could not determine home directory")
        }
    }

    /// Load configuration from file, using defaults if not found.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}
