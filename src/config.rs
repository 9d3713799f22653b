use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;
use crate::external::osrm::DEFAULT_BASE_URL;

const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_QUOTE_WINDOW_SECS: u64 = 300;
const DEFAULT_MAX_DELIVERY_ATTEMPTS: u32 = 5;

/// Process settings, read from the environment once at start-up.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub http_addr: SocketAddr,
    pub osrm_url: String,
    /// In-memory storage when unset.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub quote_window: Duration,
    pub max_delivery_attempts: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let http_addr = parse_or(&lookup, "HTTP_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?;
        let osrm_url = lookup("OSRM_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        let database_max_connections = parse_or(
            &lookup,
            "DATABASE_MAX_CONNECTIONS",
            DEFAULT_DATABASE_MAX_CONNECTIONS,
        )?;
        let quote_window_secs =
            parse_or(&lookup, "QUOTE_WINDOW_SECS", DEFAULT_QUOTE_WINDOW_SECS)?;
        let max_delivery_attempts = parse_or(
            &lookup,
            "MAX_DELIVERY_ATTEMPTS",
            DEFAULT_MAX_DELIVERY_ATTEMPTS,
        )?;

        if max_delivery_attempts == 0 {
            return Err(Error::config_error(
                "MAX_DELIVERY_ATTEMPTS must be at least 1",
            ));
        }

        Ok(Self {
            http_addr,
            osrm_url,
            database_url,
            database_max_connections,
            quote_window: Duration::from_secs(quote_window_secs),
            max_delivery_attempts,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|err: T::Err| Error::config_error(format!("invalid {}: {}", key, err))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, Error> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();

        assert_eq!(config.http_addr, SocketAddr::from(([127, 0, 0, 1], 3000)));
        assert_eq!(config.osrm_url, DEFAULT_BASE_URL);
        assert_eq!(config.database_url, None);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.quote_window, Duration::from_secs(300));
        assert_eq!(config.max_delivery_attempts, 5);
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("HTTP_ADDR", "0.0.0.0:8080"),
            ("OSRM_URL", "http://osrm:5000"),
            ("DATABASE_URL", "postgres://trips@db/trips"),
            ("QUOTE_WINDOW_SECS", "60"),
            ("MAX_DELIVERY_ATTEMPTS", "2"),
        ])
        .unwrap();

        assert_eq!(config.http_addr.port(), 8080);
        assert_eq!(config.osrm_url, "http://osrm:5000");
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://trips@db/trips")
        );
        assert_eq!(config.quote_window, Duration::from_secs(60));
        assert_eq!(config.max_delivery_attempts, 2);
    }

    #[test]
    fn rejects_malformed_values() {
        let err = config(&[("QUOTE_WINDOW_SECS", "five minutes")]).unwrap_err();
        assert_eq!(err.code, 1);

        assert!(config(&[("HTTP_ADDR", "localhost")]).is_err());
        assert!(config(&[("MAX_DELIVERY_ATTEMPTS", "0")]).is_err());
    }
}
