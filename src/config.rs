//! Process-wide configuration, read once at startup from the environment.

use std::net::SocketAddr;
use std::str::FromStr;

use chrono::{Duration, Utc};
use jsonwebtoken::Algorithm;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8008";
const DEFAULT_ACCESS_TOKEN_MINUTES: i64 = 20160;
const DEFAULT_REFRESH_TOKEN_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// How a refreshed access token picks its expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshExpiry {
    /// `now + access TTL`.
    #[default]
    Fresh,
    /// Reuse the refresh token's own `exp` unchanged.
    Inherit,
}

impl FromStr for RefreshExpiry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fresh" => Ok(RefreshExpiry::Fresh),
            "inherit" => Ok(RefreshExpiry::Inherit),
            other => Err(format!("expected `fresh` or `inherit`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
    pub refresh_expiry: RefreshExpiry,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::minutes(DEFAULT_ACCESS_TOKEN_MINUTES),
            refresh: Duration::days(DEFAULT_REFRESH_TOKEN_DAYS),
            refresh_expiry: RefreshExpiry::default(),
        }
    }
}

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: Vec<u8>,
    pub algorithm: Algorithm,
    pub lifetimes: TokenLifetimes,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("lifetimes", &self.lifetimes)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub auth: AuthConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let secret = lookup("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?
            .into_bytes();

        let algorithm = match lookup("JWT_ALGORITHM") {
            Some(raw) => parse_hmac_algorithm(&raw)?,
            None => Algorithm::HS256,
        };

        let access_minutes = parse_or("ACCESS_TOKEN_EXPIRE_MINUTES", &lookup, DEFAULT_ACCESS_TOKEN_MINUTES)?;
        let refresh_days = parse_or("REFRESH_TOKEN_EXPIRE_DAYS", &lookup, DEFAULT_REFRESH_TOKEN_DAYS)?;
        if access_minutes <= 0 {
            return Err(invalid("ACCESS_TOKEN_EXPIRE_MINUTES", "must be positive"));
        }
        if refresh_days <= 0 {
            return Err(invalid("REFRESH_TOKEN_EXPIRE_DAYS", "must be positive"));
        }
        let access = Duration::try_minutes(access_minutes)
            .filter(fits_from_now)
            .ok_or_else(|| invalid("ACCESS_TOKEN_EXPIRE_MINUTES", "out of range"))?;
        let refresh = Duration::try_days(refresh_days)
            .filter(fits_from_now)
            .ok_or_else(|| invalid("REFRESH_TOKEN_EXPIRE_DAYS", "out of range"))?;

        let refresh_expiry = match lookup("REFRESH_TOKEN_EXPIRY") {
            Some(raw) => raw
                .parse()
                .map_err(|reason| ConfigError::Invalid { name: "REFRESH_TOKEN_EXPIRY", reason })?,
            None => RefreshExpiry::default(),
        };

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| invalid("BIND_ADDR", e))?;

        Ok(Self {
            database_url,
            bind_addr,
            auth: AuthConfig {
                secret,
                algorithm,
                lifetimes: TokenLifetimes {
                    access,
                    refresh,
                    refresh_expiry,
                },
            },
        })
    }
}

/// Expiries are computed as `now + ttl`, which must stay a valid timestamp.
fn fits_from_now(ttl: &Duration) -> bool {
    Utc::now().checked_add_signed(*ttl).is_some()
}

fn parse_hmac_algorithm(raw: &str) -> Result<Algorithm, ConfigError> {
    let algorithm = Algorithm::from_str(raw.trim()).map_err(|e| invalid("JWT_ALGORITHM", e))?;
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => Err(invalid(
            "JWT_ALGORITHM",
            format!("{other:?} needs an asymmetric key; only HS256/HS384/HS512 are supported"),
        )),
    }
}

fn parse_or<F>(name: &'static str, lookup: &F, default: i64) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|e| invalid(name, e)),
        None => Ok(default),
    }
}

fn invalid(name: &'static str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}
