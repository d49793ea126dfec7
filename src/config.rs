//! Runtime configuration
//!
//! Layered as: built-in defaults, then an optional YAML file, then
//! `AUTONOMY_*` environment variables. Command-line flags are applied last
//! by the binary.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// File picked up from the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "autonomy.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value '{value}' for {var}")]
    InvalidEnv { var: String, value: String },
}

/// Sampling parameters forwarded verbatim as the request `options`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub num_ctx: u32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            num_ctx: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Base address of the Ollama-compatible endpoint.
    pub endpoint: String,
    /// Candidate models, most preferred first. Empty means the built-in list.
    pub models: Vec<String>,
    pub sampling: SamplingOptions,
    pub request_timeout_secs: u64,
    pub package_manager: String,
    pub install_timeout_secs: u64,
    pub vcs_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub dev_server_port: u16,
    /// How long the dev server must survive before it counts as started.
    pub dev_server_check_secs: u64,
    pub shutdown_grace_secs: u64,
    pub memory_path: PathBuf,
    pub snapshot_ignore: Vec<String>,
    pub git_user_name: String,
    pub git_user_email: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            models: Vec::new(),
            sampling: SamplingOptions::default(),
            request_timeout_secs: 120,
            package_manager: "npm".to_string(),
            install_timeout_secs: 600,
            vcs_timeout_secs: 60,
            probe_timeout_secs: 15,
            dev_server_port: 3000,
            dev_server_check_secs: 3,
            shutdown_grace_secs: 5,
            memory_path: PathBuf::from(".autonomy/memory.json"),
            snapshot_ignore: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                ".next".to_string(),
            ],
            git_user_name: "AutonomyBot".to_string(),
            git_user_email: "autonomybot@localhost".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads defaults overlaid with a YAML file.
    ///
    /// An explicit path must exist; otherwise [`DEFAULT_CONFIG_FILE`] is used
    /// when present in the working directory.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_yaml_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Overlays `AUTONOMY_*` variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("AUTONOMY_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = lookup("AUTONOMY_MODELS") {
            self.models = crate::data::split_list(&v);
        }
        if let Some(v) = lookup("AUTONOMY_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_secs("AUTONOMY_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("AUTONOMY_PACKAGE_MANAGER") {
            self.package_manager = v;
        }
        if let Some(v) = lookup("AUTONOMY_MEMORY_PATH") {
            self.memory_path = PathBuf::from(v);
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    pub fn vcs_timeout(&self) -> Duration {
        Duration::from_secs(self.vcs_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn parse_secs(var: &str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.endpoint, "http://localhost:11434");
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
        assert_eq!(config.sampling.top_k, 40);
        assert_eq!(config.sampling.num_ctx, 4096);
        assert_eq!(config.package_manager, "npm");
        assert!(config.snapshot_ignore.contains(&"node_modules".to_string()));
    }

    #[test]
    fn yaml_overrides_only_given_fields() {
        let yaml = r#"
endpoint: http://gpu-box:11434
models:
  - deepseek-coder:6.7b
sampling:
  temperature: 0.2
install_timeout_secs: 900
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.endpoint, "http://gpu-box:11434");
        assert_eq!(config.models, vec!["deepseek-coder:6.7b".to_string()]);
        assert_eq!(config.sampling.temperature, 0.2);
        assert_eq!(config.sampling.top_p, 0.9);
        assert_eq!(config.install_timeout_secs, 900);
        assert_eq!(config.vcs_timeout_secs, 60);
    }

    #[test]
    fn empty_yaml_is_defaults() {
        assert_eq!(AppConfig::from_yaml_str("  \n").unwrap(), AppConfig::default());
    }

    #[test]
    fn unknown_yaml_keys_are_rejected() {
        assert!(AppConfig::from_yaml_str("endpont: http://x").is_err());
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.yml");
        fs::write(&path, "package_manager: pnpm\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.package_manager, "pnpm");
    }

    #[test]
    fn load_fails_for_missing_explicit_file() {
        let dir = tempdir().unwrap();
        let err = AppConfig::load(Some(&dir.path().join("nope.yml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yml");
        fs::write(&path, "request_timeout_secs: [1, 2]\n").unwrap();

        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.yml"));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("AUTONOMY_ENDPOINT", "http://other:11434"),
                ("AUTONOMY_MODELS", "a:1, b:2"),
                ("AUTONOMY_TIMEOUT_SECS", "30"),
                ("AUTONOMY_MEMORY_PATH", "/tmp/mem.json"),
            ]))
            .unwrap();

        assert_eq!(config.endpoint, "http://other:11434");
        assert_eq!(config.models, vec!["a:1".to_string(), "b:2".to_string()]);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.memory_path, PathBuf::from("/tmp/mem.json"));
        assert_eq!(config.package_manager, "npm");
    }

    #[test]
    fn invalid_timeout_in_environment_is_an_error() {
        let mut config = AppConfig::default();
        for bad in ["abc", "0", "-5"] {
            let err = config
                .apply_env(env(&[("AUTONOMY_TIMEOUT_SECS", bad)]))
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidEnv { .. }));
        }
    }
}
