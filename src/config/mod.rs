//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Lobby tuning
    pub lobby: LobbyConfig,
}

/// Lobby and match settings
#[derive(Clone, Debug)]
pub struct LobbyConfig {
    /// How often stale connections are reaped
    pub sweep_interval: Duration,
    /// Max unmatched players seated at once
    pub capacity: usize,
    /// Word shown when a match starts
    pub opening_word: String,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(10),
            capacity: 2,
            opening_word: "First".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR when both are set
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let defaults = LobbyConfig::default();
        let sweep_secs: u64 = parse_var("SWEEP_INTERVAL_SECS", defaults.sweep_interval.as_secs())?;
        if sweep_secs == 0 {
            return Err(ConfigError::Invalid("SWEEP_INTERVAL_SECS"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            lobby: LobbyConfig {
                sweep_interval: Duration::from_secs(sweep_secs),
                capacity: parse_var("LOBBY_CAPACITY", defaults.capacity)?,
                opening_word: env::var("OPENING_WORD").unwrap_or(defaults.opening_word),
            },
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
