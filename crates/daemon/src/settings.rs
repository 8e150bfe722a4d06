// Daemon configuration: defaults, optional TOML file, OVERSEER__ environment

use anyhow::{Context, Result};
use overseer_core::config::JobsConfig;
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "~/.overseer/overseer.toml";
const DEFAULT_DB_PATH: &str = "~/.overseer/overseer.db";
const ENV_PREFIX: &str = "OVERSEER";
const ENV_SEPARATOR: &str = "__";

/// Storage backend for job records and job meta
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Memory,
    Sqlite {
        #[serde(default = "default_db_path")]
        path: String,
    },
    Redis {
        url: String,
        #[serde(default = "default_key_prefix")]
        key_prefix: String,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Sqlite {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

fn default_key_prefix() -> String {
    overseer_infra_redis::DEFAULT_KEY_PREFIX.to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Development: pretty formatting with colors
    #[default]
    Pretty,
    /// Production: JSON structured logging
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub backend: BackendConfig,
    pub log_format: LogFormat,
    pub jobs: JobsConfig,
}

impl DaemonConfig {
    /// Load from `OVERSEER_CONFIG` (or the default path) and the environment
    pub fn load() -> Result<Self> {
        let path = std::env::var("OVERSEER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = shellexpand::tilde(&path).into_owned();
        Self::build(&path, config::Environment::with_prefix(ENV_PREFIX))
    }

    fn build(path: &str, env: config::Environment) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(env.separator(ENV_SEPARATOR).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        let mut daemon_config: DaemonConfig = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        daemon_config.jobs.validate()?;

        if let BackendConfig::Sqlite { path } = &mut daemon_config.backend {
            *path = shellexpand::tilde(path.as_str()).into_owned();
        }
        Ok(daemon_config)
    }
}
