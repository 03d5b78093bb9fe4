//! Configuration management for the Trading House back office
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with TH_ prefix

use chrono::NaiveTime;
use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Due-date sweeper schedule
    pub sweeper: SweeperConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SweeperConfig {
    /// Run the daily overdue sweep
    pub enabled: bool,

    /// Hour of day (UTC) the sweep runs at
    pub run_at_hour: u32,

    /// Minute of the hour the sweep runs at
    pub run_at_minute: u32,
}

impl SweeperConfig {
    pub fn run_at(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.run_at_hour, self.run_at_minute, 0)
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("TH_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("sweeper.enabled", true)?
            .set_default("sweeper.run_at_hour", 0)?
            .set_default("sweeper.run_at_minute", 5)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (TH_ prefix)
            .add_source(
                Environment::with_prefix("TH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        if config.sweeper.run_at().is_none() {
            return Err(ConfigError::Message(format!(
                "sweeper.run_at {:02}:{:02} is not a valid time of day",
                config.sweeper.run_at_hour, config.sweeper.run_at_minute
            )));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweeper_run_at() {
        let sweeper = SweeperConfig {
            enabled: true,
            run_at_hour: 0,
            run_at_minute: 5,
        };
        assert_eq!(sweeper.run_at(), NaiveTime::from_hms_opt(0, 5, 0));

        let invalid = SweeperConfig {
            run_at_hour: 24,
            ..sweeper
        };
        assert!(invalid.run_at().is_none());
    }
}
