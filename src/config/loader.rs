//! Configuration Loader
//!
//! Environment-aware loading: base TOML file, optional per-environment
//! override file, then prefixed environment variables, merged with the
//! `config` crate and validated.

use super::error::{ConfigResult, ConfigurationError};
use super::NotifierConfig;
use config::{Config, Environment, File};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Prefix for environment variable overrides (`ASSEMBLY_NOTIFIER__SOURCE__PAGE_SIZE`)
pub const ENV_PREFIX: &str = "ASSEMBLY_NOTIFIER";
const ENV_SEPARATOR: &str = "__";
const BASE_FILE: &str = "notifier.toml";

/// Loaded configuration plus the environment it was resolved for
#[derive(Debug)]
pub struct ConfigManager {
    config: NotifierConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment,
    /// reading overrides from the process environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_variables(config_dir, environment, None)
    }

    /// Load configuration with an explicit override variable map instead of
    /// the process environment. Useful for tests.
    pub fn load_with_variables(
        config_dir: Option<PathBuf>,
        environment: &str,
        variables: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        if !config_directory.is_dir() {
            return Err(ConfigurationError::DirectoryNotFound {
                path: config_directory,
            });
        }

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading notifier configuration"
        );

        let config = Self::load_and_merge_config(&config_directory, environment, variables)?;
        config.validate()?;

        crate::log_config!(info, "Configuration loaded successfully",
            environment: environment,
            location_id: config.source.location_id.clone(),
            page_size: config.source.page_size,
            recipients: config.notification.recipients.len()
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON with the database password masked
    pub fn debug_config(&self) -> serde_json::Value {
        let mut sanitized = self.config.clone();
        sanitized.database.url = sanitized.database.url.as_deref().map(sanitize_url);
        serde_json::to_value(&sanitized).unwrap_or(serde_json::Value::Null)
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
        variables: Option<HashMap<String, String>>,
    ) -> ConfigResult<NotifierConfig> {
        let base_path = config_directory.join(BASE_FILE);
        let env_path = config_directory.join(format!("notifier.{environment}.toml"));

        debug!(
            base = %base_path.display(),
            base_present = base_path.is_file(),
            override_file = %env_path.display(),
            override_present = env_path.is_file(),
            "Resolving configuration layers"
        );

        let mut environment_source = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true);
        if variables.is_some() {
            environment_source = environment_source.source(variables);
        }

        let merged = Config::builder()
            .add_source(File::from(base_path).required(false))
            .add_source(File::from(env_path).required(false))
            .add_source(environment_source)
            .build()
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        merged
            .try_deserialize::<NotifierConfig>()
            .map_err(ConfigurationError::deserialize_error)
    }

    fn detect_environment() -> String {
        env::var("ASSEMBLY_NOTIFIER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn default_config_directory() -> PathBuf {
        env::var("ASSEMBLY_NOTIFIER_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}

/// Mask the password component of a connection URL
fn sanitize_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
        None => url.to_string(),
    }
}
