//! Configuration management for roomcraft

use crate::session::Style;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding `gateway.base_url`
pub const BASE_URL_ENV: &str = "ROOMCRAFT_BASE_URL";
/// Environment variable overriding `gateway.timeout_secs`
pub const TIMEOUT_ENV: &str = "ROOMCRAFT_TIMEOUT_SECS";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub session: SessionConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Origin every endpoint is resolved against
    pub base_url: String,
    /// Per-request timeout, applied by the HTTP client
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Pin the initial style instead of picking one at random
    pub default_style: Option<Style>,
    /// Fetch a designer quote while a request is loading
    pub quotes_while_loading: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_style: None,
            quotes_while_loading: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub character_name: String,
    /// Oldest turns are dropped beyond this many
    pub max_history: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            character_name: "Aria".to_string(),
            max_history: 20,
        }
    }
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "roomcraft") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Ok(PathBuf::from("config.toml"))
        }
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply `ROOMCRAFT_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(
            std::env::var(BASE_URL_ENV).ok(),
            std::env::var(TIMEOUT_ENV).ok(),
        )
    }

    fn apply_overrides(&mut self, base_url: Option<String>, timeout: Option<String>) -> Result<()> {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.gateway.base_url = url;
        }
        if let Some(secs) = timeout {
            self.gateway.timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds", TIMEOUT_ENV))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [gateway]
            base_url = "https://rooms.example"

            [session]
            default_style = "coastal"
            "#,
        )
        .unwrap();

        assert_eq!(config.gateway.base_url, "https://rooms.example");
        assert_eq!(config.gateway.timeout_secs, 120);
        assert_eq!(config.session.default_style, Some(Style::Coastal));
        assert!(config.session.quotes_while_loading);
        assert_eq!(config.chat.character_name, "Aria");
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(Some("http://10.0.0.2:9000".into()), Some(" 30 ".into()))
            .unwrap();
        assert_eq!(config.gateway.base_url, "http://10.0.0.2:9000");
        assert_eq!(config.gateway.timeout_secs, 30);

        assert!(config.apply_overrides(None, Some("soon".into())).is_err());
    }

    #[test]
    fn test_blank_base_url_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(Some("  ".into()), None).unwrap();
        assert_eq!(config.gateway.base_url, "http://127.0.0.1:8000");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.chat.character_name = "Milo".into();
        config.session.default_style = Some(Style::Industrial);
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
