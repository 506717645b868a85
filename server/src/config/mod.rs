//! Runtime configuration read from the environment

use std::env;
use std::time::Duration;

use thiserror::Error;

mod gateways;

pub use gateways::{CarrierConfig, MomoConfig, VnpayConfig};

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CACHE_TTL_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub cors_allowed_origins: Vec<String>,
    pub http_timeout: Duration,
    pub cache_ttl: Duration,
    pub momo: Option<MomoConfig>,
    pub vnpay: Option<VnpayConfig>,
    pub carrier: Option<CarrierConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let jwt_secret = var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            port: parse_or("PORT", var("PORT"), DEFAULT_PORT)?,
            database_url: var("DATABASE_URL"),
            redis_url: var("REDIS_URL"),
            jwt_secret,
            cors_allowed_origins,
            http_timeout: Duration::from_secs(parse_or(
                "HTTP_TIMEOUT_SECS",
                var("HTTP_TIMEOUT_SECS"),
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
            cache_ttl: Duration::from_secs(parse_or(
                "CACHE_TTL_SECS",
                var("CACHE_TTL_SECS"),
                DEFAULT_CACHE_TTL_SECS,
            )?),
            momo: MomoConfig::from_lookup(&var),
            vnpay: VnpayConfig::from_lookup(&var),
            carrier: CarrierConfig::from_lookup(&var),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
