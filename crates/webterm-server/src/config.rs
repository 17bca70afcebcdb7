//! Server configuration: TOML file + CLI overrides.

use crate::session::pty::ShellSpec;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;
use webterm_core::{TermError, TermResult};

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub shell: ShellSection,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub base_path: String,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_path: String::new(),
            max_sessions: default_max_sessions(),
        }
    }
}

/// `[shell]` section of the config TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShellSection {
    pub program: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub start_dir: Option<String>,
    pub term: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
pub(crate) fn default_port() -> u16 {
    4001
}
fn default_max_sessions() -> usize {
    100
}

/// Values given on the command line. `None` means "use the file".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub base_path: Option<String>,
    pub max_sessions: Option<usize>,
    pub shell: Option<String>,
    pub start_dir: Option<String>,
}

/// Resolved server configuration (paths expanded, CLI overrides applied).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Route prefix, either empty or `/segment[/segment...]` without a trailing slash.
    pub base_path: String,
    pub max_sessions: usize,
    pub shell: ShellSpec,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_file(ConfigFile::default(), CliOverrides::default())
    }
}

impl ServerConfig {
    /// Load config from TOML file, then apply CLI overrides.
    pub fn load(config_path: Option<&Path>, cli: CliOverrides) -> TermResult<Self> {
        let file_config = match config_path {
            Some(path) => {
                let expanded = expand_tilde(path);
                if expanded.exists() {
                    info!(path = %expanded.display(), "loading config file");
                    let content = std::fs::read_to_string(&expanded)?;
                    toml::from_str::<ConfigFile>(&content)
                        .map_err(|e| TermError::Other(format!("config parse error: {e}")))?
                } else {
                    info!(path = %expanded.display(), "config file not found, using defaults");
                    ConfigFile::default()
                }
            }
            None => ConfigFile::default(),
        };

        Ok(Self::from_file(file_config, cli))
    }

    fn from_file(file: ConfigFile, cli: CliOverrides) -> Self {
        let ConfigFile { server, shell } = file;

        let program = cli
            .shell
            .or(shell.program)
            .or_else(|| std::env::var("SHELL").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| "bash".to_string());
        let start_dir = cli
            .start_dir
            .or(shell.start_dir)
            .unwrap_or_else(|| "/app".to_string());

        Self {
            host: cli.host.unwrap_or(server.host),
            port: cli.port.unwrap_or(server.port),
            base_path: normalize_base_path(&cli.base_path.unwrap_or(server.base_path)),
            max_sessions: cli.max_sessions.unwrap_or(server.max_sessions),
            shell: ShellSpec {
                program,
                args: shell.args,
                start_dir: expand_tilde_str(&start_dir),
                term: shell.term.unwrap_or_else(|| "xterm-256color".to_string()),
                env: shell.env,
            },
        }
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Turn `"terminal/"`, `"/terminal"` or `"/"` into `"/terminal"` / `""`.
pub fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    expand_tilde_str(&s)
}

fn expand_tilde_str(s: &str) -> PathBuf {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let cfg = ServerConfig::load(None, CliOverrides::default()).unwrap();
        assert_eq!(cfg.port, 4001);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.max_sessions, 100);
        assert_eq!(cfg.base_path, "");
        assert_eq!(cfg.shell.term, "xterm-256color");
        assert_eq!(cfg.shell.start_dir, PathBuf::from("/app"));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ServerConfig::load(
            Some(&dir.path().join("nope.toml")),
            CliOverrides::default(),
        )
        .unwrap();
        assert_eq!(cfg.port, 4001);
    }

    #[test]
    fn file_values_then_cli_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 5000
base_path = "terminal/"
max_sessions = 3

[shell]
program = "/bin/sh"
args = ["-i"]
start_dir = "/tmp"

[shell.env]
LANG = "C.UTF-8"
"#
        )
        .unwrap();

        let cfg = ServerConfig::load(Some(file.path()), CliOverrides::default()).unwrap();
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.base_path, "/terminal");
        assert_eq!(cfg.max_sessions, 3);
        assert_eq!(cfg.shell.program, "/bin/sh");
        assert_eq!(cfg.shell.args, vec!["-i".to_string()]);
        assert_eq!(cfg.shell.start_dir, PathBuf::from("/tmp"));
        assert_eq!(cfg.shell.env.get("LANG").map(String::as_str), Some("C.UTF-8"));

        let cfg = ServerConfig::load(
            Some(file.path()),
            CliOverrides {
                port: Some(6000),
                max_sessions: Some(7),
                shell: Some("/bin/bash".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(cfg.port, 6000);
        assert_eq!(cfg.max_sessions, 7);
        assert_eq!(cfg.shell.program, "/bin/bash");
    }

    #[test]
    fn bad_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = \"not a number\"").unwrap();
        assert!(ServerConfig::load(Some(file.path()), CliOverrides::default()).is_err());
    }

    #[test]
    fn base_path_normalization() {
        assert_eq!(normalize_base_path(""), "");
        assert_eq!(normalize_base_path("/"), "");
        assert_eq!(normalize_base_path("terminal"), "/terminal");
        assert_eq!(normalize_base_path("/terminal/"), "/terminal");
        assert_eq!(normalize_base_path("/a/b"), "/a/b");
    }
}
