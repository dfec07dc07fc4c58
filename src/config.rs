//! Configuration management

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub geoip: GeoIpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file, or `:memory:`. Empty means the
    /// datastore is not configured and visitor routes answer with an error.
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoIpConfig {
    /// Base URL of the IP geolocation service (ip-api.com compatible)
    #[serde(default = "default_geoip_endpoint")]
    pub endpoint: String,
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            endpoint: default_geoip_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `gcp` for structured Cloud Logging output, anything else for plain text
    #[serde(default)]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: String::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_geoip_endpoint() -> String {
    "http://ip-api.com/json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `ANALYTICS_<SECTION>__<KEY>`, e.g. `ANALYTICS_DATABASE__URL`
fn environment() -> config::Environment {
    config::Environment::with_prefix("ANALYTICS")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_with(environment())
    }

    /// `config.toml` (optional) overridden by `env`
    fn load_with(env: config::Environment) -> Result<Self> {
        let config_path = "config.toml";

        let builder = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(env);

        let settings = builder.build()?;
        let config: Config = settings.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Invalid port: 0 is not allowed");
        }
        if self.server.host.is_empty() {
            anyhow::bail!("Server host cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }

        if self.geoip.endpoint.trim().is_empty() {
            anyhow::bail!("GeoIP endpoint cannot be empty");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid logging level '{}'. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        Ok(())
    }
}
