//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is loaded first when present.
//!
//! - `HOST`: bind address (default: `0.0.0.0`)
//! - `PORT`: listen port (default: `3000`)
//! - `RUST_LOG`: tracing filter directive (default: `info`)
//! - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
//! - `DATABASE_URL`: PostgreSQL URL; the in-memory store is used when unset
//! - `TOKEN_SECRET`: HMAC key for bearer tokens, at least 32 characters;
//!   a random key is generated per process when unset
//! - `TOKEN_TTL_SECS`: bearer token lifetime, at most 30 days (default: `3600`)
//! - `ADMIN_EMAIL` / `ADMIN_PASSWORD`: admin account seeded at startup

use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::auth::MAX_TOKEN_TTL_SECS;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected `pretty` or `json`, got `{other}`")),
        }
    }
}

/// Credentials of the admin account created at startup.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: SecretString,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<SecretString>,
    pub token_secret: SecretString,
    /// True when `TOKEN_SECRET` was unset and a random key was generated.
    pub token_secret_generated: bool,
    pub token_ttl_secs: u64,
    pub admin: Option<AdminSeed>,
}

impl Config {
    /// Loads configuration from the environment, after reading `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let (token_secret, token_secret_generated) = match lookup("TOKEN_SECRET") {
            Some(secret) => {
                if secret.len() < MIN_TOKEN_SECRET_LENGTH {
                    return Err(ConfigError::InvalidEnvVar(
                        "TOKEN_SECRET".to_string(),
                        format!("must be at least {MIN_TOKEN_SECRET_LENGTH} characters"),
                    ));
                }
                (SecretString::from(secret), false)
            }
            None => (generate_secret(), true),
        };

        let token_ttl_secs =
            parse_or("TOKEN_TTL_SECS", lookup("TOKEN_TTL_SECS"), DEFAULT_TOKEN_TTL_SECS)?;
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&token_ttl_secs) {
            return Err(ConfigError::InvalidEnvVar(
                "TOKEN_TTL_SECS".to_string(),
                format!("must be between 1 and {MAX_TOKEN_TTL_SECS}"),
            ));
        }

        let admin = match (lookup("ADMIN_EMAIL"), lookup("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed {
                email,
                password: SecretString::from(password),
            }),
            _ => None,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", lookup("PORT"), 3000)?,
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            log_format: parse_or("LOG_FORMAT", lookup("LOG_FORMAT"), LogFormat::Pretty)?,
            database_url: lookup("DATABASE_URL")
                .filter(|url| !url.is_empty())
                .map(SecretString::from),
            token_secret,
            token_secret_generated,
            token_ttl_secs,
            admin,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Raw bytes of the token signing key.
    pub fn token_key(&self) -> &[u8] {
        self.token_secret.expose_secret().as_bytes()
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn generate_secret() -> SecretString {
    let bytes: [u8; 32] = rand::random();
    SecretString::from(hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.token_ttl_secs, 3600);
        assert!(config.database_url.is_none());
        assert!(config.admin.is_none());
        assert!(config.token_secret_generated);
        assert_eq!(config.token_key().len(), 64);
    }

    #[test]
    fn test_generated_secrets_differ() {
        let a = load(&[]).unwrap();
        let b = load(&[]).unwrap();
        assert_ne!(a.token_key(), b.token_key());
    }

    #[test]
    fn test_reads_overrides() {
        let config = load(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://shop@localhost/shop"),
            ("TOKEN_SECRET", "0123456789abcdef0123456789abcdef"),
            ("TOKEN_TTL_SECS", "60"),
            ("ADMIN_EMAIL", "admin@example.com"),
            ("ADMIN_PASSWORD", "correct-horse"),
        ])
        .unwrap();

        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.unwrap().expose_secret(),
            "postgres://shop@localhost/shop"
        );
        assert!(!config.token_secret_generated);
        assert_eq!(config.token_ttl_secs, 60);
        let admin = config.admin.unwrap();
        assert_eq!(admin.email, "admin@example.com");
        assert_eq!(admin.password.expose_secret(), "correct-horse");
    }

    #[test]
    fn test_admin_needs_both_variables() {
        let config = load(&[("ADMIN_EMAIL", "admin@example.com")]).unwrap();
        assert!(config.admin.is_none());
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(load(&[("PORT", "not-a-port")]).is_err());
        assert!(load(&[("LOG_FORMAT", "xml")]).is_err());
        assert!(load(&[("TOKEN_SECRET", "short")]).is_err());
    }

    #[test]
    fn test_token_ttl_is_bounded() {
        assert!(load(&[("TOKEN_TTL_SECS", "10000000000000")]).is_err());
        assert!(load(&[("TOKEN_TTL_SECS", "0")]).is_err());
        let config = load(&[("TOKEN_TTL_SECS", &MAX_TOKEN_TTL_SECS.to_string())]).unwrap();
        assert_eq!(config.token_ttl_secs, MAX_TOKEN_TTL_SECS);
    }

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let config = load(&[("TOKEN_SECRET", "0123456789abcdef0123456789abcdef")]).unwrap();
        assert!(!format!("{config:?}").contains("0123456789abcdef"));
    }
}
