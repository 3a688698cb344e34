use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::model_catalog::{CatalogTables, DEFAULT_CATALOG_PREFIX};

pub const DEFAULT_DATABASE_URL: &str = "postgresql://postgres@localhost/postgres";

lazy_static! {
    static ref CATALOG_PREFIX: Regex = Regex::new(r"^[a-z_][a-z0-9_]{0,15}$").unwrap();
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Store configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// PostgreSQL connection target
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub database_url: String,

    /// Prefix of the catalog relations (`<prefix>ugi`, `<prefix>ag`, `<prefix>pg`)
    #[validate(custom(function = "validate_catalog_prefix"))]
    #[serde(default = "default_catalog_prefix")]
    pub catalog_prefix: String,

    /// YAML file with model definitions
    #[serde(default)]
    pub model_config_path: Option<PathBuf>,
}

fn default_catalog_prefix() -> String {
    DEFAULT_CATALOG_PREFIX.to_string()
}

fn validate_catalog_prefix(prefix: &str) -> Result<(), ValidationError> {
    if CATALOG_PREFIX.is_match(prefix) {
        Ok(())
    } else {
        let mut err = ValidationError::new("catalog_prefix");
        err.message = Some(
            "Catalog prefix must be a lower-case identifier of at most 16 characters".into(),
        );
        Err(err)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            catalog_prefix: default_catalog_prefix(),
            model_config_path: None,
        }
    }
}

impl StoreConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            database_url: env::var("RMTGRAPH_DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            catalog_prefix: parse_env_var("RMTGRAPH_CATALOG_PREFIX", DEFAULT_CATALOG_PREFIX)?,
            model_config_path: env::var("RMTGRAPH_MODELS").ok().map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply command line overrides on top of this configuration
    pub fn merge_cli(mut self, cli: CliConfig) -> Result<Self, ConfigError> {
        if let Some(url) = cli.database_url {
            self.database_url = url;
        }
        if let Some(prefix) = cli.catalog_prefix {
            self.catalog_prefix = prefix;
        }
        if let Some(path) = cli.model_config_path {
            self.model_config_path = Some(path);
        }

        self.validate()?;
        Ok(self)
    }

    pub fn catalog_tables(&self) -> CatalogTables {
        CatalogTables::with_prefix(&self.catalog_prefix)
    }
}

/// CLI overrides (parsed from command line arguments)
#[derive(Clone, Debug, Default)]
pub struct CliConfig {
    pub database_url: Option<String>,
    pub catalog_prefix: Option<String>,
    pub model_config_path: Option<PathBuf>,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
