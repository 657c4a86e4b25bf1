use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::connection::SessionConfig;

/// Application configuration
///
/// Loaded from a TOML file, then overridden by `TRANSLATE_CHAT__SECTION__KEY`
/// environment variables. Every field has a default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub connection: ConnectionConfig,
    pub audio: AudioConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL for the REST endpoints
    pub http_url: String,
    /// WebSocket endpoint for the chat session
    pub ws_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            http_url: "http://localhost:8000".to_string(),
            ws_url: "ws://localhost:8000/ws".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub reconnect_delay_ms: u64,
    /// 0 disables the handshake timeout
    pub connect_timeout_ms: u64,
    pub close_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 2000,
            connect_timeout_ms: 10_000,
            close_timeout_ms: 2000,
        }
    }
}

impl ConnectionConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            connect_timeout: (self.connect_timeout_ms > 0)
                .then(|| Duration::from_millis(self.connect_timeout_ms)),
            close_timeout: Duration::from_millis(self.close_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Play synthesized speech from the service
    pub enabled: bool,
    pub volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub default_language: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
        }
    }
}

impl Config {
    /// Load `path` (extension optional) layered under environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("TRANSLATE_CHAT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to read config from {path}"))?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }
}
