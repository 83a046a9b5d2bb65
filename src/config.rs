use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::session::SessionConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/client.json";

pub const ENV_API_URL: &str = "SOCIAL_API_URL";
pub const ENV_WS_URL: &str = "SOCIAL_WS_URL";
pub const ENV_TOKEN: &str = "SOCIAL_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    /// Raw WebSocket endpoint of the STOMP broker (the SockJS `/websocket` leg).
    pub ws_url: String,
    pub token: Option<String>,
    /// 0 disables client heart-beats.
    pub heartbeat_ms: u64,
    pub ack_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8081/api".to_string(),
            ws_url: "ws://localhost:8081/ws/websocket".to_string(),
            token: None,
            heartbeat_ms: 10_000,
            ack_timeout_ms: 10_000,
            connect_timeout_ms: 10_000,
        }
    }
}

impl AppConfig {
    /// Environment wins over the file.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Ok(url) = env::var(ENV_WS_URL) {
            self.ws_url = url;
        }
        if let Ok(token) = env::var(ENV_TOKEN) {
            if !token.trim().is_empty() {
                self.token = Some(token);
            }
        }
        self
    }

    pub fn session_config(&self, token: &str) -> SessionConfig {
        let mut session = SessionConfig::new(self.ws_url.clone(), token);
        session.heartbeat = match self.heartbeat_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        session.ack_timeout = Duration::from_millis(self.ack_timeout_ms);
        session.connect_timeout = Duration::from_millis(self.connect_timeout_ms);
        session
    }
}

/// Reads the client config, falling back to the built-in endpoints when the
/// file is absent or unreadable.
pub fn load_config(path: &str) -> AppConfig {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            log::info!("No client config at {path} ({err}); using built-in endpoints");
            return AppConfig::default();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|err| {
        log::warn!("Client config {path} is not valid JSON ({err}); using built-in endpoints");
        AppConfig::default()
    })
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    let dir = Path::new(path).parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, serde_json::to_string_pretty(config)?)
}

/// Stores a fresh bearer token, keeping the rest of the file intact.
pub fn persist_token(path: &str, token: &str) {
    let mut config = load_config(path);
    config.token = Some(token.to_string());

    if let Err(err) = save_config(path, &config) {
        log::error!("Could not store the session token in {path}: {err}");
    } else {
        log::info!("Session token stored in {path}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert_eq!(load_config(path.to_str().unwrap()), AppConfig::default());
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        fs::write(&path, "{ nope").unwrap();
        assert_eq!(load_config(path.to_str().unwrap()), AppConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        fs::write(&path, r#"{"ws_url":"ws://chat:9000/ws/websocket","heartbeat_ms":0}"#).unwrap();

        let config = load_config(path.to_str().unwrap());
        assert_eq!(config.ws_url, "ws://chat:9000/ws/websocket");
        assert_eq!(config.api_base_url, AppConfig::default().api_base_url);
        assert!(config.session_config("t").heartbeat.is_none());
    }

    #[test]
    fn token_is_persisted_into_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/client.json");
        let path = path.to_str().unwrap();

        persist_token(path, "abc.def.ghi");
        let config = load_config(path);
        assert_eq!(config.token.as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn session_config_carries_timeouts() {
        let config = AppConfig {
            ack_timeout_ms: 1500,
            ..AppConfig::default()
        };
        let session = config.session_config("tok");
        assert_eq!(session.token, "tok");
        assert_eq!(session.ack_timeout, Duration::from_millis(1500));
        assert_eq!(session.heartbeat, Some(Duration::from_secs(10)));
    }
}
