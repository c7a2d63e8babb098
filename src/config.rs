use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};

/// Default number of simultaneous outgoing HTTP(S) fetches.
pub const DEFAULT_MAX_HTTP_CONNECTIONS: usize = 100;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    /// Capacity of the admission gate shared by every fetch worker.
    pub max_http_connections: usize,
    pub fetch_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000),
            max_http_connections: DEFAULT_MAX_HTTP_CONNECTIONS,
            fetch_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let host = lookup("HOST").unwrap_or_else(|| defaults.server_addr.ip().to_string());
        let ip = IpAddr::from_str(&host)
            .map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;
        let port = parse_or(&lookup, "PORT", defaults.server_addr.port())?;

        let max_http_connections =
            parse_or(&lookup, "MAX_HTTP_CONNECTIONS", defaults.max_http_connections)?;
        if max_http_connections == 0 {
            return Err(AppError::ConfigError(
                "MAX_HTTP_CONNECTIONS must be greater than zero".to_string(),
            ));
        }

        let fetch_timeout =
            parse_or(&lookup, "FETCH_TIMEOUT_SECS", defaults.fetch_timeout.as_secs())?;
        let connect_timeout =
            parse_or(&lookup, "CONNECT_TIMEOUT_SECS", defaults.connect_timeout.as_secs())?;

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            max_http_connections,
            fetch_timeout: Duration::from_secs(fetch_timeout),
            connect_timeout: Duration::from_secs(connect_timeout),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::ConfigError(format!("Invalid {}: {}", key, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(
            config.server_addr,
            "127.0.0.1:8000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(config.max_http_connections, 100);
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "9000"),
            ("MAX_HTTP_CONNECTIONS", "4"),
            ("CONNECT_TIMEOUT_SECS", "1"),
        ]))
        .unwrap();
        assert_eq!(
            config.server_addr,
            "0.0.0.0:9000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(config.max_http_connections, 4);
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err =
            Config::from_lookup(lookup_from(&[("MAX_HTTP_CONNECTIONS", "0")])).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("Invalid PORT"));
    }
}
