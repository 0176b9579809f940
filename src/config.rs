//! Configuration loaded from environment variables with defaults.

use std::str::FromStr;
use thiserror::Error;
use crate::domain::value_objects::Money;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Absent means the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub port: u16,
    /// Absent means events are only logged.
    pub nats_url: Option<String>,
    pub nats_subject_prefix: String,
    pub delivery_charge: Money,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 10,
            port: 8083,
            nats_url: None,
            nats_subject_prefix: "marketplace".to_string(),
            delivery_charge: Money::units(50),
        }
    }
}

impl Config {
    /// Reads `.env` if present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let delivery_charge = parse(&lookup, "DELIVERY_CHARGE")?.map(Money::new).unwrap_or(defaults.delivery_charge);
        if delivery_charge.is_negative() {
            return Err(ConfigError::Invalid { key: "DELIVERY_CHARGE", value: delivery_charge.to_string() });
        }
        Ok(Self {
            database_url: non_empty(&lookup, "DATABASE_URL"),
            database_max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS")?.unwrap_or(defaults.database_max_connections),
            port: parse(&lookup, "PORT")?.unwrap_or(defaults.port),
            nats_url: non_empty(&lookup, "NATS_URL"),
            nats_subject_prefix: non_empty(&lookup, "NATS_SUBJECT_PREFIX").unwrap_or(defaults.nats_subject_prefix),
            delivery_charge,
        })
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError> {
    match non_empty(lookup, key) {
        Some(value) => value.parse().map(Some).map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.port, 8083);
        assert_eq!(config.delivery_charge, Money::units(50));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/market"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("PORT", "9000"),
            ("NATS_URL", " "),
            ("DELIVERY_CHARGE", "49.99"),
        ])
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/market"));
        assert_eq!(config.database_max_connections, 4);
        assert_eq!(config.port, 9000);
        assert!(config.nats_url.is_none());
        assert_eq!(config.delivery_charge, Money::new(Decimal::new(4999, 2)));
    }

    #[test]
    fn test_malformed_values() {
        assert_eq!(config(&[("PORT", "eighty")]).unwrap_err(), ConfigError::Invalid { key: "PORT", value: "eighty".into() });
        assert!(config(&[("DELIVERY_CHARGE", "-1")]).is_err());
        assert!(config(&[("DATABASE_MAX_CONNECTIONS", "-3")]).is_err());
    }
}
