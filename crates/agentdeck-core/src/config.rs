use std::path::{Path, PathBuf};
use std::time::Duration;

use agentdeck_wire::Mode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::fs;

use crate::error::{DeckError, Result};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub default_mode: Mode,
    pub request_timeout_ms: u64,
    /// Unset keeps the original behavior: a stalled stream holds the turn open.
    pub stream_stall_timeout_ms: Option<u64>,
    pub log_retention_days: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_mode: Mode::Autonomy,
            request_timeout_ms: 30_000,
            stream_stall_timeout_ms: None,
            log_retention_days: 14,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stream_stall_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(DeckError::InvalidConfig("base_url is empty".to_string()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(DeckError::InvalidConfig(format!(
                "base_url must be http(s): {base}"
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(DeckError::InvalidConfig(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.stream_stall_timeout_ms == Some(0) {
            return Err(DeckError::InvalidConfig(
                "stream_stall_timeout_ms must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Config sources, lowest precedence first.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayers {
    pub file: Value,
    pub env: Value,
    pub cli: Value,
}

impl ConfigLayers {
    pub fn resolve(&self) -> Result<ClientConfig> {
        let mut merged = serde_json::to_value(ClientConfig::default())?;
        deep_merge(&mut merged, &self.file);
        deep_merge(&mut merged, &self.env);
        deep_merge(&mut merged, &self.cli);
        let config: ClientConfig = serde_json::from_value(merged)
            .map_err(|e| DeckError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Loads the effective client config. An explicit `path` must exist; the default
/// location is optional.
pub async fn load_client_config(
    path: Option<&Path>,
    cli_overrides: Option<Value>,
) -> Result<ClientConfig> {
    let file = match path {
        Some(path) => {
            if !path.exists() {
                return Err(DeckError::InvalidConfig(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            read_json_file(path).await?
        }
        None => match default_config_path() {
            Some(path) if path.exists() => read_json_file(&path).await.unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                empty_object()
            }),
            _ => empty_object(),
        },
    };

    let layers = ConfigLayers {
        file,
        env: env_layer(),
        cli: cli_overrides.unwrap_or_else(empty_object),
    };
    layers.resolve()
}

pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("AGENTDECK_CONFIG") {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir().map(|dir| dir.join("agentdeck").join("config.json"))
}

async fn read_json_file(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path).await?;
    serde_json::from_str::<Value>(&raw)
        .map_err(|e| DeckError::InvalidConfig(format!("{}: {}", path.display(), e)))
}

fn env_layer() -> Value {
    env_layer_from(|key| std::env::var(key).ok())
}

fn env_layer_from(lookup: impl Fn(&str) -> Option<String>) -> Value {
    let mut root = empty_object();

    if let Some(url) = lookup("AGENTDECK_BASE_URL") {
        if !url.trim().is_empty() {
            deep_merge(&mut root, &json!({ "base_url": url.trim() }));
        }
    }
    if let Some(mode) = lookup("AGENTDECK_MODE") {
        match mode.parse::<Mode>() {
            Ok(mode) => deep_merge(&mut root, &json!({ "default_mode": mode })),
            Err(e) => tracing::warn!("Ignoring AGENTDECK_MODE: {}", e),
        }
    }
    if let Some(ms) = lookup("AGENTDECK_STALL_TIMEOUT_MS").and_then(|v| parse_millis(&v)) {
        deep_merge(&mut root, &json!({ "stream_stall_timeout_ms": ms }));
    }
    if let Some(ms) = lookup("AGENTDECK_REQUEST_TIMEOUT_MS").and_then(|v| parse_millis(&v)) {
        deep_merge(&mut root, &json!({ "request_timeout_ms": ms }));
    }

    root
}

fn parse_millis(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok()
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

pub(crate) fn deep_merge(base: &mut Value, overlay: &Value) {
    if overlay.is_null() {
        return;
    }
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if value.is_null() {
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value.clone();
        }
    }
}
