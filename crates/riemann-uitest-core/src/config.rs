//! Persistent runner configuration.
//!
//! Stored in `~/.riemann-uitest/config.json`. Every field has a default, so a
//! partial file is fine and a missing one means "all defaults".
//!
//! # Example
//!
//! ```no_run
//! use riemann_uitest_core::config::RunnerConfig;
//!
//! let config = RunnerConfig::load();
//! println!("agent at {}:{}", config.agent_host, config.agent_port);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runner::RunnerOptions;

const CONFIG_FILENAME: &str = "config.json";
const LOGS_DIRNAME: &str = "logs";

pub const DEFAULT_AGENT_HOST: &str = "localhost";
pub const DEFAULT_AGENT_PORT: u16 = 9800;

/// `~/.riemann-uitest`, or a directory under the temp dir when there is no home.
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".riemann-uitest")
}

/// Directory for JSONL run logs and tracing output. Created on demand.
pub fn logs_dir() -> std::io::Result<PathBuf> {
    let dir = config_dir().join(LOGS_DIRNAME);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn default_host() -> String {
    DEFAULT_AGENT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_AGENT_PORT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_host")]
    pub agent_host: String,

    #[serde(default = "default_port")]
    pub agent_port: u16,

    /// Bundle id to bring to the foreground before the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_bundle_id: Option<String>,

    /// Pause after each typing step, in milliseconds.
    #[serde(default)]
    pub settle_delay_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            agent_host: default_host(),
            agent_port: default_port(),
            target_bundle_id: None,
            settle_delay_ms: 0,
        }
    }
}

impl RunnerConfig {
    /// Load from `~/.riemann-uitest/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&config_dir().join(CONFIG_FILENAME))
    }

    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }

    pub fn to_options(&self) -> RunnerOptions {
        RunnerOptions {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            target_bundle_id: self.target_bundle_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("riemann_uitest_config_{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.agent_host, "localhost");
        assert_eq!(config.agent_port, 9800);
        assert!(config.target_bundle_id.is_none());
        assert_eq!(config.settle_delay_ms, 0);
    }

    #[test]
    fn deserialize_partial_json() {
        let loaded: RunnerConfig = serde_json::from_str(r#"{"agent_port": 9000}"#).unwrap();
        assert_eq!(loaded.agent_port, 9000);
        assert_eq!(loaded.agent_host, "localhost");
    }

    #[test]
    fn save_then_load() {
        let path = temp_path();
        let config = RunnerConfig {
            agent_host: "10.0.0.5".to_string(),
            agent_port: 8100,
            target_bundle_id: Some("com.example.RiemannSum".to_string()),
            settle_delay_ms: 250,
        };
        config.save_to(&path).unwrap();
        let loaded = RunnerConfig::load_from(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn unparseable_file_gives_defaults() {
        let path = temp_path();
        std::fs::write(&path, "not json").unwrap();
        let loaded = RunnerConfig::load_from(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, RunnerConfig::default());
    }

    #[test]
    fn missing_file_gives_defaults() {
        assert_eq!(RunnerConfig::load_from(&temp_path()), RunnerConfig::default());
    }

    #[test]
    fn options_carry_delay_and_target() {
        let config = RunnerConfig {
            settle_delay_ms: 40,
            target_bundle_id: Some("com.example.RiemannSum".to_string()),
            ..RunnerConfig::default()
        };
        let options = config.to_options();
        assert_eq!(options.settle_delay, Duration::from_millis(40));
        assert_eq!(options.target_bundle_id.as_deref(), Some("com.example.RiemannSum"));
    }
}
