// Local configuration for creatio-fs.
//
// Global config: `~/.creatio-fs/config.toml`
// Default cache root: `~/.creatio-fs/cache/`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use creatio_fs_common::types::SchemaType;

use crate::notify::DebounceConfig;
use crate::session::RetryPolicy;

/// Root directory for creatio-fs global state: `~/.creatio-fs/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".creatio-fs"))
}

/// Path to the global config file: `~/.creatio-fs/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

/// Default disk cache root: `~/.creatio-fs/cache/`.
pub fn default_cache_dir() -> Option<PathBuf> {
    global_dir().map(|d| d.join("cache"))
}

// ── Global config ──────────────────────────────────────────────────

/// Configuration at `~/.creatio-fs/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Cache root override (defaults to `~/.creatio-fs/cache`).
    pub cache_dir: Option<PathBuf>,
    /// Default remote endpoint.
    pub connection: ConnectionConfig,
    /// Transient network failure policy.
    pub retry: RetryConfig,
    /// Background verification of cached bodies.
    pub careful_mode: CarefulModeConfig,
    /// Change-notification coalescing.
    pub notifications: NotificationConfig,
    /// Which schema kinds appear in the virtual tree.
    pub schema_types: SchemaTypesConfig,
}

impl GlobalConfig {
    /// Load from `~/.creatio-fs/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to `~/.creatio-fs/config.toml`.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = global_config_path().ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine home directory",
            ))
        })?;
        self.save_to(&path)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    /// Effective cache root.
    pub fn resolved_cache_dir(&self) -> Result<PathBuf, ConfigError> {
        self.cache_dir.clone().or_else(default_cache_dir).ok_or_else(|| {
            ConfigError::Invalid("could not determine a cache directory".to_string())
        })
    }
}

/// Remote endpoint defaults.
///
/// Passwords are never read from config files; supply them through the
/// `CREATIO_PASSWORD` environment variable or the command line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Platform base URL (e.g. `https://crm.example.com`).
    pub url: Option<String>,
    /// Login name.
    pub login: Option<String>,
}

/// Retry policy for transient network failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first one.
    pub attempts: u32,
    /// Fixed delay between attempts in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { attempts: 3, delay_ms: 500 }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, Duration::from_millis(self.delay_ms))
    }
}

/// Careful mode: re-check cached bodies against the server once they are
/// older than `verify_after_secs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CarefulModeConfig {
    pub enabled: bool,
    pub verify_after_secs: u64,
}

impl Default for CarefulModeConfig {
    fn default() -> Self {
        Self { enabled: false, verify_after_secs: 300 }
    }
}

impl CarefulModeConfig {
    pub fn verify_after(&self) -> Duration {
        Duration::from_secs(self.verify_after_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotificationConfig {
    /// Coalescing window in milliseconds (clamped to 50–500).
    pub debounce_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { debounce_ms: 100 }
    }
}

impl NotificationConfig {
    pub fn debounce(&self) -> DebounceConfig {
        DebounceConfig::with_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchemaTypesConfig {
    /// Enabled kinds by config name, e.g. `client_unit`, `sql_script`.
    pub enabled: Vec<String>,
}

impl Default for SchemaTypesConfig {
    fn default() -> Self {
        Self { enabled: SchemaType::EDITABLE.iter().map(|kind| kind.to_string()).collect() }
    }
}

impl SchemaTypesConfig {
    pub fn resolve(&self) -> Result<Vec<SchemaType>, ConfigError> {
        let mut kinds = Vec::with_capacity(self.enabled.len());
        for name in &self.enabled {
            let kind = name.parse::<SchemaType>().map_err(|e| ConfigError::Invalid(e.to_string()))?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}
