use crate::error::{ChatError, Result};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub chat: ChatBehaviorConfig,
}

/// Portal backend: the session store and the inference endpoint share a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token for the account store. Absent means anonymous.
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_token: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Custom path for the local session cache.
    /// Defaults to `~/.config/lodgechat/sessions.json`.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { path: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatBehaviorConfig {
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
}

impl Default for ChatBehaviorConfig {
    fn default() -> Self {
        Self {
            max_message_len: default_max_message_len(),
        }
    }
}

fn default_base_url() -> String {
    "https://portal.lodgechat.app".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_max_message_len() -> usize {
    crate::model::MAX_MESSAGE_LENGTH
}

/// Default config file: `~/.config/lodgechat/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join("lodgechat").join("config.toml"))
        .ok_or_else(|| ChatError::Config("cannot determine config directory".to_string()))
}

/// Load configuration from the given file, or from the default location.
/// A missing file yields the defaults; a malformed file is an error.
pub fn load(path: Option<&Path>) -> Result<ChatConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    if !path.exists() {
        return Ok(ChatConfig::default());
    }

    let settings = Config::builder()
        .add_source(File::from(path.as_path()))
        .build()
        .map_err(|e| ChatError::Config(format!("failed to read config: {e}")))?;

    settings
        .try_deserialize()
        .map_err(|e| ChatError::Config(format!("invalid config: {e}")))
}

/// Write a commented default config to the given path (for `lodgechat init`).
pub fn save_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ChatError::Config(format!("failed to create config dir: {e}")))?;
    }
    let rendered = toml::to_string_pretty(&ChatConfig::default())
        .map_err(|e| ChatError::Config(format!("failed to render config: {e}")))?;
    std::fs::write(path, rendered)
        .map_err(|e| ChatError::Config(format!("failed to write config: {e}")))
}
