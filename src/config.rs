use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

pub const ENV_CONFIG_PATH: &str = "MACRO_CHAT_CONFIG";
pub const ENV_BACKEND: &str = "MACRO_CHAT_BACKEND";
pub const ENV_BACKEND_URL: &str = "MACRO_CHAT_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "MACRO_CHAT_ANON_KEY";

const APP_DIR: &str = "macro-chat";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const MIN_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_TABLE_MAX_ROWS: usize = 10;
const DEFAULT_NOTIFICATION_TTL_SECS: u64 = 5;
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Rest,
    Memory,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// Messages produced while loading, before logging is installed.
    #[serde(skip)]
    notes: Vec<(Level, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_kind")]
    pub kind: BackendKind,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub anon_key: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_table_max_rows")]
    pub table_max_rows: usize,
    #[serde(default = "default_notification_ttl_secs")]
    pub notification_ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            url: String::new(),
            anon_key: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            table_max_rows: default_table_max_rows(),
            notification_ttl_secs: default_notification_ttl_secs(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_backend_kind() -> BackendKind {
    BackendKind::Rest
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_table_max_rows() -> usize {
    DEFAULT_TABLE_MAX_ROWS
}

fn default_notification_ttl_secs() -> u64 {
    DEFAULT_NOTIFICATION_TTL_SECS
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

pub fn default_log_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("macro-chat.log")
}

impl AppConfig {
    /// Loads the config file named by `MACRO_CHAT_CONFIG` or the default
    /// location, then applies environment overrides and validates.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(default_config_path);
        let mut config = Self::from_path(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// A missing file yields defaults; an unreadable or malformed one is an error.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let mut config = Self::default();
            config.note(
                Level::INFO,
                format!("no config file at {}, using defaults", path.display()),
            );
            return Ok(config);
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(kind) = non_empty(ENV_BACKEND) {
            match kind.as_str() {
                "rest" => self.backend.kind = BackendKind::Rest,
                "memory" => self.backend.kind = BackendKind::Memory,
                other => self.note(Level::WARN, format!("ignoring unknown {ENV_BACKEND} {other:?}")),
            }
        }
        if let Some(url) = non_empty(ENV_BACKEND_URL) {
            self.backend.url = url;
        }
        if let Some(key) = non_empty(ENV_ANON_KEY) {
            self.backend.anon_key = key;
        }
    }

    fn note(&mut self, level: Level, message: String) {
        self.notes.push((level, message));
    }

    /// Notes gathered by [`AppConfig::load`], drained once a subscriber exists.
    pub fn take_notes(&mut self) -> Vec<(Level, String)> {
        std::mem::take(&mut self.notes)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.kind == BackendKind::Rest {
            if self.backend.url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "backend.url is empty. Set it in the config file or export {ENV_BACKEND_URL}."
                )));
            }
            if self.backend.anon_key.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "backend.anon_key is empty. Set it in the config file or export {ENV_ANON_KEY}."
                )));
            }
        }
        if self.backend.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "backend.request_timeout_secs must be greater than zero.".to_string(),
            ));
        }
        if self.realtime.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "realtime.poll_interval_ms must be at least {MIN_POLL_INTERVAL_MS}."
            )));
        }
        if self.ui.table_max_rows == 0 {
            return Err(ConfigError::Invalid(
                "ui.table_max_rows must be greater than zero.".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.realtime.poll_interval_ms)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_secs(self.ui.notification_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.backend.kind = BackendKind::Memory;
        config
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = AppConfig::from_path(&dir.path().join("absent.toml")).expect("defaults");
        let notes = config.take_notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, Level::INFO);
        assert!(notes[0].1.contains("absent.toml"));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.ui.table_max_rows, 10);
        assert_eq!(config.realtime.poll_interval_ms, 1000);
        assert_eq!(config.backend.kind, BackendKind::Rest);
    }

    #[test]
    fn partial_file_keeps_field_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[backend]
url = "https://project.example.co"
anon_key = "anon"

[ui]
table_max_rows = 25
"#,
        )
        .expect("write config");

        let config = AppConfig::from_path(&path).expect("config should parse");
        assert_eq!(config.backend.url, "https://project.example.co");
        assert_eq!(config.backend.request_timeout_secs, 20);
        assert_eq!(config.ui.table_max_rows, 25);
        assert_eq!(config.ui.notification_ttl_secs, 5);
        assert_eq!(config.log.filter, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[backend\nurl = 1").expect("write config");
        assert!(matches!(
            AppConfig::from_path(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn env_overrides_win_and_blank_values_are_ignored() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_BACKEND, "memory"),
            (ENV_BACKEND_URL, "https://override.example.co"),
            (ENV_ANON_KEY, "   "),
        ]);
        let mut config = AppConfig::default();
        config.backend.anon_key = "from-file".to_string();
        config.apply_env_overrides(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert_eq!(config.backend.url, "https://override.example.co");
        assert_eq!(config.backend.anon_key, "from-file");
        assert!(config.take_notes().is_empty());
    }

    #[test]
    fn unknown_backend_override_is_kept_as_a_warning() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| (key == ENV_BACKEND).then(|| "sqlite".to_string()));
        assert_eq!(config.backend.kind, BackendKind::Rest);
        let notes = config.take_notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, Level::WARN);
        assert!(notes[0].1.contains("sqlite"));
        assert!(config.take_notes().is_empty());
    }

    #[test]
    fn rest_backend_requires_url_and_key() {
        let error = AppConfig::default().validate().expect_err("empty url");
        assert!(error.to_string().contains("backend.url"));

        assert!(memory_config().validate().is_ok());
    }

    #[test]
    fn zero_limits_are_rejected() {
        let mut config = memory_config();
        config.ui.table_max_rows = 0;
        assert!(config.validate().is_err());

        let mut config = memory_config();
        config.realtime.poll_interval_ms = 10;
        assert!(config.validate().is_err());
    }
}
