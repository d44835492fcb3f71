//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

use crate::sim::SeekerTuning;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Relay server binding address
    pub relay_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Relay URL a peer connects to (ws://host:port)
    pub relay_url: String,
    /// Display name announced by the peer
    pub username: String,
    /// Seeker gains, deliberately tunable rather than baked in
    pub seeker: SeekerTuning,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let relay_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("RELAY_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let relay_addr: SocketAddr = relay_addr
            .parse()
            .map_err(|_| ConfigError::InvalidAddress)?;

        let mut seeker = SeekerTuning::default();
        if let Some(v) = parse_f64("SEEKER_CONE")? {
            seeker.sensor_cone = v;
        }
        if let Some(v) = parse_f64("SEEKER_MAX_BEARING")? {
            seeker.max_bearing = v;
        }
        if let Some(v) = parse_f64("SEEKER_HEAD_RATE")? {
            seeker.head_rate_multiplier = v;
        }
        if let Some(v) = parse_f64("SEEKER_COMMAND_MULTIPLIER")? {
            seeker.command_multiplier = v;
        }
        if let Some(v) = parse_f64("SEEKER_MAX_OMEGA")? {
            seeker.maximum_omega = v;
        }

        Ok(Self {
            relay_addr,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            relay_url: env::var("RELAY_URL")
                .unwrap_or_else(|_| format!("ws://{}/ws", relay_addr)),
            username: env::var("USERNAME").unwrap_or_else(|_| "anonymous".to_string()),
            seeker,
        })
    }
}

fn parse_f64(key: &'static str) -> Result<Option<f64>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber(key)),
        Err(_) => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid relay address format")]
    InvalidAddress,

    #[error("Invalid numeric value for {0}")]
    InvalidNumber(&'static str),
}
