//! autoad configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::prompt::MAX_TURNS_PER_ITERATION;

/// Main autoad configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Wrapped tool configuration
    pub agent: AgentConfig,

    /// Git tagging and sync configuration
    pub git: GitConfig,

    /// Session logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .autoad.yml
        let local_config = PathBuf::from(".autoad.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/autoad/autoad.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("autoad").join("autoad.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Wrapped tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Program name of the wrapped coding-assistant CLI
    pub command: String,

    /// Default turn budget per invocation
    #[serde(rename = "max-turns")]
    pub max_turns: u32,

    /// Default tool allowlist passed through
    #[serde(rename = "allowed-tools")]
    pub allowed_tools: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            max_turns: MAX_TURNS_PER_ITERATION,
            allowed_tools: vec![
                "Bash".to_string(),
                "Read".to_string(),
                "Edit".to_string(),
                "Write".to_string(),
            ],
        }
    }
}

/// Git tagging and sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Prefix for per-iteration tags
    #[serde(rename = "tag-prefix")]
    pub tag_prefix: String,

    /// Fetch/push all branches and tags around the run
    #[serde(rename = "sync-remote")]
    pub sync_remote: bool,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            tag_prefix: "autoad".to_string(),
            sync_remote: false,
        }
    }
}

/// Session logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether the logging subsystem is constructed at all
    pub enabled: bool,

    /// Log root override (CLI --log-dir still wins)
    pub dir: Option<PathBuf>,

    /// Diagnostic log level written to the autoad log file
    pub level: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            level: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.agent.command, "claude");
        assert_eq!(config.agent.max_turns, MAX_TURNS_PER_ITERATION);
        assert_eq!(config.git.tag_prefix, "autoad");
        assert!(!config.git.sync_remote);
        assert!(config.logging.enabled);
        assert!(config.logging.dir.is_none());
    }

    #[test]
    fn test_parse_kebab_case_yaml() {
        let yaml = r#"
agent:
  command: my-agent
  max-turns: 50
  allowed-tools:
    - Bash
git:
  tag-prefix: experiment
  sync-remote: true
logging:
  enabled: false
  dir: /tmp/logs
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.agent.command, "my-agent");
        assert_eq!(config.agent.max_turns, 50);
        assert_eq!(config.agent.allowed_tools, vec!["Bash"]);
        assert_eq!(config.git.tag_prefix, "experiment");
        assert!(config.git.sync_remote);
        assert!(!config.logging.enabled);
        assert_eq!(config.logging.dir, Some(PathBuf::from("/tmp/logs")));
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "agent:\n  command: other\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.agent.command, "other");
        assert_eq!(config.agent.max_turns, MAX_TURNS_PER_ITERATION);
        assert_eq!(config.git.tag_prefix, "autoad");
    }

    #[test]
    fn test_load_from_explicit_path() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("autoad.yml");
        fs::write(&path, "git:\n  tag-prefix: from-file\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.git.tag_prefix, "from-file");
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let result = Config::load(Some(&PathBuf::from("/nonexistent/autoad.yml")));
        assert!(result.is_err());
    }
}
