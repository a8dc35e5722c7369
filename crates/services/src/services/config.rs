//! Runtime configuration read from the environment.

use std::{
    net::{IpAddr, SocketAddr, ToSocketAddrs},
    str::FromStr,
    time::Duration,
};

use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: SecretString,
    pub database_max_connections: u32,
    pub jwt_secret: SecretString,
    pub listen_addr: SocketAddr,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
    pub permission_cache_ttl: Duration,
    pub permission_cache_capacity: u64,
    pub overdue_sweep_interval: Duration,
    pub anthropic_api_key: Option<SecretString>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or("PORT", get("PORT"), 3001)?;
        let listen_addr = resolve_listen_addr(&host, port)?;

        let cors_origins = get("CORS_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url: SecretString::from(required("DATABASE_URL")?),
            database_max_connections: positive_or(
                "DATABASE_MAX_CONNECTIONS",
                get("DATABASE_MAX_CONNECTIONS"),
                10,
            )?,
            jwt_secret: SecretString::from(required("SUPABASE_JWT_SECRET")?),
            listen_addr,
            cors_origins,
            permission_cache_ttl: Duration::from_secs(parse_or(
                "PERMISSION_CACHE_TTL_SECS",
                get("PERMISSION_CACHE_TTL_SECS"),
                30 * 60,
            )?),
            permission_cache_capacity: 10_000,
            overdue_sweep_interval: Duration::from_secs(positive_or(
                "OVERDUE_SWEEP_INTERVAL_SECS",
                get("OVERDUE_SWEEP_INTERVAL_SECS"),
                60 * 60,
            )?),
            anthropic_api_key: get("ANTHROPIC_API_KEY").map(SecretString::from),
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

/// Like [`parse_or`] but rejects zero.
fn positive_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialEq,
{
    let value = parse_or(key, raw.clone(), default)?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: raw.unwrap_or_default(),
        });
    }
    Ok(value)
}

/// Accepts IP literals, bracketed IPv6 literals and hostnames.
fn resolve_listen_addr(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    let invalid = || ConfigError::Invalid {
        key: "HOST",
        value: host.to_string(),
    };
    let bare = host
        .trim()
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host.trim());

    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    (bare, port)
        .to_socket_addrs()
        .map_err(|_| invalid())?
        .next()
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn applies_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/haulbook"),
            ("SUPABASE_JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.listen_addr.port(), 3001);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.permission_cache_ttl, Duration::from_secs(1800));
        assert!(config.cors_origins.is_empty());
        assert!(config.anthropic_api_key.is_none());
        assert_eq!(config.jwt_secret.expose_secret(), "secret");
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/haulbook"),
            ("SUPABASE_JWT_SECRET", "secret"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("CORS_ORIGINS", "https://app.example.com, http://localhost:3000"),
            ("ANTHROPIC_API_KEY", "sk-test"),
        ]))
        .unwrap();

        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(
            config.cors_origins,
            vec!["https://app.example.com", "http://localhost:3000"]
        );
        assert!(config.anthropic_api_key.is_some());
    }

    #[test]
    fn reports_missing_and_invalid_values() {
        let err = Config::from_lookup(lookup(&[("SUPABASE_JWT_SECRET", "secret")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));

        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/haulbook"),
            ("SUPABASE_JWT_SECRET", "secret"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn rejects_zero_interval_and_pool_size() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/haulbook"),
            ("SUPABASE_JWT_SECRET", "secret"),
            ("OVERDUE_SWEEP_INTERVAL_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "OVERDUE_SWEEP_INTERVAL_SECS", ref value } if value == "0"
        ));

        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/haulbook"),
            ("SUPABASE_JWT_SECRET", "secret"),
            ("DATABASE_MAX_CONNECTIONS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DATABASE_MAX_CONNECTIONS", .. }));
    }

    #[test]
    fn listen_host_accepts_ipv6_and_names() {
        assert_eq!(resolve_listen_addr("::1", 3001).unwrap().to_string(), "[::1]:3001");
        assert_eq!(resolve_listen_addr("[::1]", 3001).unwrap().to_string(), "[::1]:3001");
        assert_eq!(resolve_listen_addr("0.0.0.0", 80).unwrap().to_string(), "0.0.0.0:80");

        let localhost = resolve_listen_addr("localhost", 8080).unwrap();
        assert!(localhost.ip().is_loopback());
        assert_eq!(localhost.port(), 8080);

        assert!(matches!(
            resolve_listen_addr("not a host!", 8080),
            Err(ConfigError::Invalid { key: "HOST", .. })
        ));
    }
}
