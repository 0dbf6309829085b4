//! Application configuration management.
//!
//! Configuration covers the backend endpoints, request timeout, keepalive
//! interval and reconnect policy. It is stored at
//! `~/.config/catsync/config.json`; missing fields fall back to defaults and
//! a few `CATSYNC_*` environment variables override the file.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::channel::ReconnectPolicy;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "catsync";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Push channel path on the backend host
const WS_PATH: &str = "/ws/category-updates/";

/// Default API base, matching the development backend
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Same timeout the storefront's axios client used.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

const DEFAULT_KEEPALIVE_SECS: u64 = 30;

const ENV_API_URL: &str = "CATSYNC_API_URL";
const ENV_WS_URL: &str = "CATSYNC_WS_URL";
const ENV_SESSION_ID: &str = "CATSYNC_SESSION_ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    /// Explicit push channel URL; derived from `api_base_url` when unset.
    pub ws_url: Option<String>,
    pub request_timeout_secs: u64,
    pub keepalive_secs: u64,
    pub reconnect: ReconnectPolicy,
    /// Fixed session id. Unset means every process starts a new session.
    pub session_id: Option<String>,
    pub log_to_file: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            ws_url: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            keepalive_secs: DEFAULT_KEEPALIVE_SECS,
            reconnect: ReconnectPolicy::default(),
            session_id: None,
            log_to_file: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `CATSYNC_*` environment overrides. Call after `dotenvy::dotenv()`.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(url) = non_empty(ENV_WS_URL) {
            self.ws_url = Some(url);
        }
        if let Some(id) = non_empty(ENV_SESSION_ID) {
            self.session_id = Some(id);
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Long-lived cache directory, shared across sessions.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Parent of every per-session directory.
    pub fn sessions_root(&self) -> PathBuf {
        std::env::temp_dir().join(APP_NAME).join("sessions")
    }

    /// Per-session directory for the fallback snapshot.
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.sessions_root().join(session_id)
    }

    /// Whether the session id is made up per process, so its directory
    /// should not outlive the process.
    pub fn has_ephemeral_session(&self) -> bool {
        self.session_id.is_none()
    }

    /// The configured session id, or a fresh one for this process.
    pub fn resolve_session_id(&self) -> String {
        self.session_id.clone().unwrap_or_else(|| {
            format!("{}-{}", std::process::id(), Utc::now().timestamp_millis())
        })
    }

    pub fn ws_url(&self) -> String {
        self.ws_url
            .clone()
            .unwrap_or_else(|| derive_ws_url(&self.api_base_url))
    }
}

/// Map the API base onto the push channel URL: same host and port,
/// `wss` for `https`, `ws` otherwise.
pub fn derive_ws_url(api_base: &str) -> String {
    let (scheme, rest) = match api_base.split_once("://") {
        Some(("https", rest)) | Some(("wss", rest)) => ("wss", rest),
        Some((_, rest)) => ("ws", rest),
        None => ("ws", api_base),
    };
    let host = rest.split('/').next().unwrap_or(rest);
    format!("{}://{}{}", scheme, host, WS_PATH)
}
