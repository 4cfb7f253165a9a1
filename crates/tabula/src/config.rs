//! Configuration loading

use anyhow::{Context, Result};
use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Environment variable prefix, e.g. `TABULA__SERVER__PORT`
const ENV_PREFIX: &str = "TABULA";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Remote endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub skip_tls_verify: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "https://miusage.com/v1/challenge/1/".to_string(),
            timeout_secs: 5,
            user_agent: concat!("tabula/", env!("CARGO_PKG_VERSION")).to_string(),
            skip_tls_verify: false,
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Transient key the record set is stored under
    pub key: String,
    pub ttl_secs: u64,
    /// "sqlite" or "memory"
    pub backend: String,
    pub purge_interval_secs: u64,
    pub sqlite: SqliteConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key: "tabula_record_set".to_string(),
            ttl_secs: 3600,
            backend: "sqlite".to_string(),
            purge_interval_secs: 600,
            sqlite: SqliteConfig::default(),
        }
    }
}

/// SQLite store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: "./data/tabula.db".to_string(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    /// Signs session tokens and nonces
    pub secret: String,
    pub session_hours: i64,
    pub nonce_lifetime_secs: u64,
    pub admin: AdminConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            secret: "change-me-in-production".to_string(),
            session_hours: 24,
            nonce_lifetime_secs: 86_400,
            admin: AdminConfig::default(),
        }
    }
}

/// Admin account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub username: String,
    /// argon2 PHC string from `tabula hash-password`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password_hash: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration from an optional TOML file overlaid with `TABULA__*` variables
    pub fn load(path: &str) -> Result<Self> {
        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true);

        Self::load_with(path, environment)
    }

    fn load_with(path: &str, environment: Environment) -> Result<Self> {
        if Path::new(path).exists() {
            info!("Loading configuration from {}", path);
        } else {
            info!("Config file not found at {}, using defaults", path);
        }

        let config: Config = config::Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(environment)
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse configuration from {}", path))?;

        Ok(config)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env() -> Environment {
        Environment::default().source(Some(HashMap::new()))
    }

    #[test]
    fn test_defaults_without_file() {
        let config = Config::load_with("/nonexistent/tabula.toml", no_env()).unwrap();

        assert_eq!(config.upstream.url, "https://miusage.com/v1/challenge/1/");
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.cache.backend, "sqlite");
        assert_eq!(config.cache.sqlite.path, "./data/tabula.db");
        assert!(config.auth.enabled);
        assert!(config.auth.admin.password_hash.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 9000\n\n[cache]\nbackend = \"memory\"\nttl_secs = 60\n\n[logging]\nformat = \"json\""
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        let config = Config::load_with(path, no_env()).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.cache.backend, "memory");
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.key, "tabula_record_set");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server]\nport = 9000").unwrap();

        let env = HashMap::from([
            ("TABULA__SERVER__PORT".to_string(), "9100".to_string()),
            ("TABULA__AUTH__ENABLED".to_string(), "false".to_string()),
            ("TABULA__UPSTREAM__URL".to_string(), "http://localhost:1234/".to_string()),
        ]);
        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .source(Some(env));

        let config = Config::load_with(file.path().to_str().unwrap(), environment).unwrap();

        assert_eq!(config.server.port, 9100);
        assert!(!config.auth.enabled);
        assert_eq!(config.upstream.url, "http://localhost:1234/");
    }

    #[test]
    fn test_to_toml_round_trip() {
        let config = Config::default();
        let rendered = config.to_toml().unwrap();

        assert!(rendered.contains("[cache.sqlite]"));
        assert!(!rendered.contains("password_hash"));

        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.cache.ttl_secs, config.cache.ttl_secs);
    }
}
