//! Runtime configuration read from the process environment.

use std::{net::IpAddr, path::PathBuf};

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://edumanage.sqlite";
pub const DEFAULT_JWT_SECRET: &str = "edumanage-development-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Credentials for the administrator created on first start.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminBootstrap {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub jwt_secret: String,
    /// Turns on the `Secure` flag of the session cookie.
    pub production: bool,
    pub static_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub admin: Option<AdminBootstrap>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            production: false,
            static_dir: PathBuf::from("public"),
            upload_dir: PathBuf::from("uploads"),
            admin: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset or blank keys fall back to
    /// the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Config::default();

        let host = match get("HOST") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { key: "HOST", value })?,
            None => defaults.host,
        };
        let port = match get("PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value })?,
            None => defaults.port,
        };
        let production = get("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production"));

        let jwt_secret = get("JWT_SECRET").unwrap_or(defaults.jwt_secret);
        if production && jwt_secret == DEFAULT_JWT_SECRET {
            warn!("JWT_SECRET is not set; using the development secret in production");
        }

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                name: get("ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
                email,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            host,
            port,
            jwt_secret,
            production,
            static_dir: get("STATIC_DIR").map(PathBuf::from).unwrap_or(defaults.static_dir),
            upload_dir: get("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.port, 3000);
        assert!(!config.production);
        assert!(config.admin.is_none());
    }

    #[test]
    fn reads_overrides_and_admin_bootstrap() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("HOST", "0.0.0.0"),
            ("APP_ENV", "production"),
            ("ADMIN_EMAIL", "admin@edumanage.com"),
            ("ADMIN_PASSWORD", "admin123"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.host.is_unspecified());
        assert!(config.production);
        let admin = config.admin.unwrap();
        assert_eq!(admin.name, "Administrator");
        assert_eq!(admin.email, "admin@edumanage.com");
    }

    #[test]
    fn rejects_unparseable_port() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
