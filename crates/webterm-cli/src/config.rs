//! Client configuration at `~/.webterm/config.toml`.
//!
//! Provides the default server URL and reconnect delay.
//! CLI flags always override config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub default: DefaultConfig,
}

/// Default connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultConfig {
    /// Server base URL, including any route prefix.
    #[serde(default = "default_server")]
    pub server: String,

    /// Delay between reconnect attempts.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

fn default_server() -> String {
    "http://localhost:4001".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

impl DefaultConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Config {
    /// `~/.webterm/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".webterm").join("config.toml"))
    }

    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.default.server, "http://localhost:4001");
        assert_eq!(cfg.default.reconnect_delay(), Duration::from_secs(1));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg.default.reconnect_delay_ms, 1000);
    }

    #[test]
    fn parse_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[default]
server = "https://example.com/terminal"
"#,
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.default.server, "https://example.com/terminal");
        assert_eq!(cfg.default.reconnect_delay_ms, 1000);
    }

    #[test]
    fn parse_full_file() {
        let cfg: Config = toml::from_str(
            r#"
[default]
server = "http://box:9000"
reconnect_delay_ms = 250
"#,
        )
        .unwrap();
        assert_eq!(cfg.default.server, "http://box:9000");
        assert_eq!(cfg.default.reconnect_delay(), Duration::from_millis(250));
    }

    #[test]
    fn bad_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[default\nserver = 1").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config"));
    }
}
