use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Server configuration, read from the environment (and an optional `.env` file)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_expiration_days: i64,
    /// Postgres connection string; `None` selects the in-memory store
    pub database_url: Option<String>,
    pub cors_origin: String,
    pub message_history_limit: i64,
    /// How many times disconnect cleanup retries a failed membership write
    pub cleanup_retry_attempts: u32,
    pub max_message_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            jwt_secret: "dev-secret-change-me".to_string(),
            token_expiration_days: 7,
            database_url: None,
            cors_origin: "http://localhost:3000".to_string(),
            message_history_limit: 50,
            cleanup_retry_attempts: 3,
            max_message_length: 4000,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, falling back to defaults for missing keys
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            jwt_secret: lookup("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            token_expiration_days: parse_or(
                &lookup,
                "TOKEN_EXPIRATION_DAYS",
                defaults.token_expiration_days,
            )?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            cors_origin: lookup("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            message_history_limit: parse_or(
                &lookup,
                "MESSAGE_HISTORY_LIMIT",
                defaults.message_history_limit,
            )?,
            cleanup_retry_attempts: parse_or(
                &lookup,
                "CLEANUP_RETRY_ATTEMPTS",
                defaults.cleanup_retry_attempts,
            )?,
            max_message_length: parse_or(
                &lookup,
                "MAX_MESSAGE_LENGTH",
                defaults.max_message_length,
            )?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 5001);
        assert_eq!(config.message_history_limit, 50);
        assert_eq!(config.cors_origin, "http://localhost:3000");
        assert!(config.database_url.is_none());
        assert_eq!(config.bind_address(), "0.0.0.0:5001");
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/chat"),
            ("CLEANUP_RETRY_ATTEMPTS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/chat")
        );
        assert_eq!(config.cleanup_retry_attempts, 5);
    }

    #[test]
    fn test_empty_database_url_means_in_memory() {
        let config = ServerConfig::from_lookup(lookup_from(&[("DATABASE_URL", "")])).unwrap();
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let result = ServerConfig::from_lookup(lookup_from(&[("PORT", "not-a-port")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key: "PORT", .. })
        ));
    }
}
