use crate::sync::{FailurePolicy, OverwritePolicy, SyncOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration for glossary sync
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GlossaryConfig {
    /// Remote catalog endpoint
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Credentials used against the catalog
    #[serde(default)]
    pub auth: AuthConfig,

    /// Synchronization policies
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// API root, e.g. https://api.azuredatacatalog.com
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Catalog name ("DefaultCatalog" selects the tenant's catalog)
    #[serde(default = "default_catalog_name")]
    pub catalog_name: String,

    /// Glossary name; the catalog name when unset
    #[serde(default)]
    pub glossary_name: Option<String>,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Redirect hops followed per request
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Retries for throttled, 5xx and transport failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            catalog_name: default_catalog_name(),
            glossary_name: None,
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
            max_redirects: default_max_redirects(),
            max_retries: default_max_retries(),
        }
    }
}

impl CatalogConfig {
    pub fn glossary(&self) -> &str {
        self.glossary_name.as_deref().unwrap_or(&self.catalog_name)
    }
}

/// Either a pre-acquired bearer token or client credentials for a token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Static bearer token, wins over client credentials when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// OAuth2 token endpoint for the client credentials grant
    #[serde(default)]
    pub token_url: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Resource the token is requested for
    #[serde(default = "default_resource")]
    pub resource: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            token_url: None,
            client_id: None,
            client_secret: None,
            resource: default_resource(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// "always", "never" or "prompt"
    #[serde(default)]
    pub overwrite: OverwritePolicy,

    /// "continue" or "abort"
    #[serde(default)]
    pub on_error: FailurePolicy,

    /// Sibling terms published concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            overwrite: OverwritePolicy::default(),
            on_error: FailurePolicy::default(),
            concurrency: default_concurrency(),
        }
    }
}

impl SyncConfig {
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            overwrite: self.overwrite,
            on_error: self.on_error,
            concurrency: self.concurrency,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://api.azuredatacatalog.com".to_string()
}
fn default_catalog_name() -> String {
    "DefaultCatalog".to_string()
}
fn default_api_version() -> String {
    "2016-03-30".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_redirects() -> usize {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_resource() -> String {
    "https://api.azuredatacatalog.com".to_string()
}
fn default_concurrency() -> usize {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration manager with layered sources
pub struct ConfigManager {
    config: GlossaryConfig,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (`explicit_path`, ./.glossary.toml, ~/.glossary/config.toml)
    /// 3. Sensible defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_dotenv();

        let (config, config_path) = match explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.display().to_string()));
                }
                (Self::read_toml_file(path)?, Some(path.to_path_buf()))
            }
            None => Self::load_config_file()?,
        };

        let config = Self::apply_env_overrides(config, |key| std::env::var(key).ok())?;
        Self::validate_config(&config)?;

        match &config_path {
            Some(path) => info!("Loaded configuration from {}", path.display()),
            None => info!("No config file found, using defaults"),
        }

        Ok(Self { config })
    }

    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".glossary.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .glossary.env: {}", e);
                }
            }
        }
    }

    /// Search order:
    /// 1. ./.glossary.toml
    /// 2. ~/.glossary/config.toml
    fn load_config_file() -> Result<(GlossaryConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".glossary.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".glossary").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((GlossaryConfig::default(), None))
    }

    fn read_toml_file(path: &Path) -> Result<GlossaryConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Applies `GLOSSARY_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(
        mut config: GlossaryConfig,
        lookup: F,
    ) -> Result<GlossaryConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Catalog
        if let Some(url) = lookup("GLOSSARY_CATALOG_URL") {
            config.catalog.base_url = url;
        }
        if let Some(name) = lookup("GLOSSARY_CATALOG_NAME") {
            config.catalog.catalog_name = name;
        }
        if let Some(name) = lookup("GLOSSARY_GLOSSARY_NAME") {
            config.catalog.glossary_name = Some(name);
        }
        if let Some(version) = lookup("GLOSSARY_API_VERSION") {
            config.catalog.api_version = version;
        }

        // Auth
        if let Some(token) = lookup("GLOSSARY_ACCESS_TOKEN") {
            config.auth.access_token = Some(token);
        }
        if let Some(url) = lookup("GLOSSARY_TOKEN_URL") {
            config.auth.token_url = Some(url);
        }
        if let Some(id) = lookup("GLOSSARY_CLIENT_ID") {
            config.auth.client_id = Some(id);
        }
        if let Some(secret) = lookup("GLOSSARY_CLIENT_SECRET") {
            config.auth.client_secret = Some(secret);
        }
        if let Some(resource) = lookup("GLOSSARY_RESOURCE") {
            config.auth.resource = resource;
        }

        // Sync
        if let Some(policy) = lookup("GLOSSARY_OVERWRITE") {
            config.sync.overwrite = policy.parse().map_err(ConfigError::ValidationError)?;
        }
        if let Some(policy) = lookup("GLOSSARY_ON_ERROR") {
            config.sync.on_error = policy.parse().map_err(ConfigError::ValidationError)?;
        }
        if let Some(concurrency) = lookup("GLOSSARY_CONCURRENCY") {
            config.sync.concurrency = concurrency.parse().map_err(|_| {
                ConfigError::ValidationError(format!("Invalid concurrency: {concurrency}"))
            })?;
        }

        // Logging
        if let Some(level) = lookup("RUST_LOG") {
            if is_plain_level(&level) {
                config.logging.level = level;
            }
        }

        Ok(config)
    }

    pub fn validate_config(config: &GlossaryConfig) -> Result<(), ConfigError> {
        if config.catalog.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "catalog.base_url must not be empty".to_string(),
            ));
        }

        if config.catalog.catalog_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "catalog.catalog_name must not be empty".to_string(),
            ));
        }

        if config.sync.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "sync.concurrency must be at least 1".to_string(),
            ));
        }

        if !is_plain_level(&config.logging.level) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                config.logging.level
            )));
        }

        match config.logging.format.as_str() {
            "pretty" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, compact",
                    other
                )))
            }
        }

        Ok(())
    }

    pub fn config(&self) -> &GlossaryConfig {
        &self.config
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = GlossaryConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            }
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}

fn is_plain_level(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = GlossaryConfig::default();
        assert_eq!(config.catalog.catalog_name, "DefaultCatalog");
        assert_eq!(config.catalog.glossary(), "DefaultCatalog");
        assert_eq!(config.sync.overwrite, OverwritePolicy::Always);
        assert_eq!(config.sync.concurrency, 1);
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad_config = GlossaryConfig::default();
        bad_config.sync.concurrency = 0;
        assert!(ConfigManager::validate_config(&bad_config).is_err());

        let mut bad_config = GlossaryConfig::default();
        bad_config.logging.format = "json".to_string();
        assert!(ConfigManager::validate_config(&bad_config).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = ConfigManager::apply_env_overrides(
            GlossaryConfig::default(),
            env(&[
                ("GLOSSARY_CATALOG_NAME", "contoso"),
                ("GLOSSARY_OVERWRITE", "prompt"),
                ("GLOSSARY_ON_ERROR", "abort"),
                ("GLOSSARY_CONCURRENCY", "4"),
                ("RUST_LOG", "glossary_core=trace"),
            ]),
        )
        .unwrap();

        assert_eq!(config.catalog.catalog_name, "contoso");
        assert_eq!(config.sync.overwrite, OverwritePolicy::Prompt);
        assert_eq!(config.sync.on_error, FailurePolicy::Abort);
        assert_eq!(config.sync.options().concurrency, 4);
        // Directive-style filters are left to the subscriber
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_env_override() {
        let result = ConfigManager::apply_env_overrides(
            GlossaryConfig::default(),
            env(&[("GLOSSARY_OVERWRITE", "sometimes")]),
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
