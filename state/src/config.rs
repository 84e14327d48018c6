//! Playground configuration loading
//!
//! Loads configuration from `~/.config/playground/playground.toml` (or the
//! path in `PLAYGROUND_CONFIG`). Every field has a default, so a missing file
//! yields the default configuration.

use crate::errors::Result;
use crate::errors::StateError;
use serde::Deserialize;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

/// Env var that overrides the config file location
pub const CONFIG_ENV_VAR: &str = "PLAYGROUND_CONFIG";

/// Root configuration for the playground state layer
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct PlaygroundConfig {
    /// Remote service settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Property editor settings
    #[serde(default)]
    pub editor: EditorConfig,

    /// Scenario table pagination settings
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// User-visible notification settings
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Remote service configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ApiConfig {
    /// Base URL of the backend (no trailing slash required)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Project scope for every request; pagination is disabled without it
    #[serde(default)]
    pub project_id: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            project_id: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Property editor configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EditorConfig {
    /// Quiet window before a debounced edit reaches the cache
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    300
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl EditorConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Pagination configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PaginationConfig {
    /// Rows requested per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    50
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

/// Notification configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct NotificationConfig {
    /// Number of recent notifications retained
    #[serde(default = "default_notification_capacity")]
    pub capacity: usize,
}

fn default_notification_capacity() -> usize {
    32
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            capacity: default_notification_capacity(),
        }
    }
}

impl PlaygroundConfig {
    /// Load from `PLAYGROUND_CONFIG` or the default location.
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load_from_path(Path::new(&path)),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load_from_path(&path),
                _ => {
                    tracing::debug!("no playground config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Load from an explicit path; the file must exist.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StateError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        let cfg = Self::from_toml_str(&contents)?;
        tracing::info!(path = %path.display(), "loaded playground config");
        Ok(cfg)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(contents)
            .map_err(|e| StateError::config(format!("invalid playground config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.pagination.page_size == 0 {
            return Err(StateError::config("pagination.page_size must be > 0"));
        }
        if self.notifications.capacity == 0 {
            return Err(StateError::config("notifications.capacity must be > 0"));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(StateError::config("api.base_url must not be empty"));
        }
        Ok(())
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("playground").join("playground.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = PlaygroundConfig::default();
        assert_eq!(cfg.editor.debounce_window(), Duration::from_millis(300));
        assert_eq!(cfg.pagination.page_size, 50);
        assert_eq!(cfg.notifications.capacity, 32);
        assert_eq!(cfg.api.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.api.project_id, None);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg = PlaygroundConfig::from_toml_str(
            r#"
            [api]
            base_url = "https://cloud.example.com"
            project_id = "proj-1"

            [pagination]
            page_size = 25
            "#,
        )
        .unwrap();

        assert_eq!(cfg.api.base_url, "https://cloud.example.com");
        assert_eq!(cfg.api.project_id.as_deref(), Some("proj-1"));
        assert_eq!(cfg.pagination.page_size, 25);
        assert_eq!(cfg.editor.debounce_ms, 300);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let err = PlaygroundConfig::from_toml_str("[pagination]\npage_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn load_from_path_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[editor]\ndebounce_ms = 120").unwrap();

        let cfg = PlaygroundConfig::load_from_path(file.path()).unwrap();
        assert_eq!(cfg.editor.debounce_ms, 120);
    }

    #[test]
    fn missing_explicit_path_is_config_error() {
        let err = PlaygroundConfig::load_from_path(Path::new("/definitely/not/here.toml"))
            .unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::ConfigError);
    }
}
