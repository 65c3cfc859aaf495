//! Server Configuration
//!
//! Reads process configuration from the environment (after `.env` is loaded).

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use anyhow::{Context, bail};
use auth::AuthConfig;
use axum::http::HeaderValue;
use base64::Engine;
use base64::engine::general_purpose;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:31113";
const DEFAULT_FRONTEND_ORIGINS: &str = "http://localhost:40922,http://127.0.0.1:40922";
const MIN_SECRET_LEN: usize = 32;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl FromStr for AppEnv {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(AppEnv::Development),
            "production" | "prod" => Ok(AppEnv::Production),
            other => bail!("Unknown APP_ENV: {other}"),
        }
    }
}

#[derive(Debug)]
pub struct ServerConfig {
    pub app_env: AppEnv,
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub frontend_origins: Vec<HeaderValue>,
    pub auth: AuthConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let app_env = match env::var("APP_ENV") {
            Ok(value) => value.parse()?,
            Err(_) if cfg!(debug_assertions) => AppEnv::Development,
            Err(_) => AppEnv::Production,
        };

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let database_max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(value) => value
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            Err(_) => 5,
        };

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("BIND_ADDR must be host:port")?;

        let frontend_origins = parse_origins(
            &env::var("FRONTEND_ORIGINS").unwrap_or_else(|_| DEFAULT_FRONTEND_ORIGINS.to_string()),
        );

        Ok(Self {
            app_env,
            database_url,
            database_max_connections,
            bind_addr,
            frontend_origins,
            auth: auth_config(app_env)?,
        })
    }
}

fn auth_config(app_env: AppEnv) -> anyhow::Result<AuthConfig> {
    let mut config = match app_env {
        AppEnv::Development => AuthConfig::development(),
        AppEnv::Production => AuthConfig::with_random_secret(),
    };

    match (env::var("JWT_SECRET"), app_env) {
        (Ok(value), _) => config.jwt_secret = decode_secret("JWT_SECRET", &value)?,
        (Err(_), AppEnv::Production) => bail!("JWT_SECRET must be set in production"),
        (Err(_), AppEnv::Development) => {
            tracing::warn!("JWT_SECRET not set, using a random key; tokens will not survive restarts")
        }
    }

    match (env::var("AUDIT_KEY"), app_env) {
        (Ok(value), _) => config.audit_key = decode_secret("AUDIT_KEY", &value)?,
        (Err(_), AppEnv::Production) => bail!("AUDIT_KEY must be set in production"),
        (Err(_), AppEnv::Development) => {
            tracing::warn!("AUDIT_KEY not set, using a random key")
        }
    }

    if let Ok(pepper) = env::var("PASSWORD_PEPPER") {
        config.password_pepper = Some(decode_secret("PASSWORD_PEPPER", &pepper)?);
    }

    if let Ok(base) = env::var("RESET_URL_BASE") {
        config.reset_url_base = base;
    }

    if let Ok(raw) = env::var("TRUSTED_PROXIES") {
        config.trusted_proxies = parse_trusted_proxies(&raw)?;
    }

    Ok(config)
}

/// Decode a base64 secret and enforce a minimum length
fn decode_secret(name: &str, value: &str) -> anyhow::Result<Vec<u8>> {
    let bytes = general_purpose::STANDARD
        .decode(value.trim())
        .with_context(|| format!("{name} must be base64"))?;
    if bytes.len() < MIN_SECRET_LEN {
        bail!("{name} must decode to at least {MIN_SECRET_LEN} bytes");
    }
    Ok(bytes)
}

/// Comma-separated proxy IPs; any invalid entry is an error
fn parse_trusted_proxies(raw: &str) -> anyhow::Result<Vec<IpAddr>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<IpAddr>()
                .with_context(|| format!("TRUSTED_PROXIES entry is not an IP address: {entry}"))
        })
        .collect()
}

fn parse_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_env_parse() {
        assert_eq!("Production".parse::<AppEnv>().unwrap(), AppEnv::Production);
        assert_eq!("dev".parse::<AppEnv>().unwrap(), AppEnv::Development);
        assert!("staging".parse::<AppEnv>().is_err());
    }

    #[test]
    fn test_decode_secret() {
        let encoded = general_purpose::STANDARD.encode([7u8; 32]);
        assert_eq!(decode_secret("JWT_SECRET", &encoded).unwrap(), vec![7u8; 32]);

        let short = general_purpose::STANDARD.encode([7u8; 8]);
        assert!(decode_secret("JWT_SECRET", &short).is_err());
        assert!(decode_secret("JWT_SECRET", "not base64!").is_err());
    }

    #[test]
    fn test_parse_trusted_proxies() {
        let proxies = parse_trusted_proxies("10.0.0.1, ::1,").unwrap();
        assert_eq!(proxies, ["10.0.0.1".parse::<IpAddr>().unwrap(), "::1".parse().unwrap()]);
        assert!(parse_trusted_proxies("").unwrap().is_empty());
        assert!(parse_trusted_proxies("10.0.0.0/8").is_err());
    }

    #[test]
    fn test_parse_origins() {
        let origins = parse_origins(" http://a.test , ,http://b.test");
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0], "http://a.test");
    }
}
