// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup into [`Settings`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding the `auth.redb` database | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET` | HS256 signing key, at least 32 bytes | Required |
//! | `JWT_ISSUER` | `iss` claim written and required on tokens | `HealthHub API` |
//! | `TOKEN_TTL_HOURS` | Token validity window in hours (1 to 168) | `24` |
//! | `SEED_DEFAULT_ROLES` | Seed canonical roles/permissions at startup | `true` |
//! | `ARGON2_MEMORY_KIB` | Argon2id memory cost | `19456` |
//! | `ARGON2_ITERATIONS` | Argon2id time cost | `2` |
//! | `ARGON2_PARALLELISM` | Argon2id lanes | `1` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::str::FromStr;

use crate::auth::token::MIN_KEY_LEN;

/// Environment variable name for the database directory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "./data";

/// File name of the redb database inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "auth.redb";

pub const HOST_ENV: &str = "HOST";
pub const DEFAULT_HOST: &str = "0.0.0.0";

pub const PORT_ENV: &str = "PORT";
pub const DEFAULT_PORT: u16 = 8080;

/// Environment variable name for the token signing key.
///
/// There is no default: a server without a secret refuses to start.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

pub const JWT_ISSUER_ENV: &str = "JWT_ISSUER";
pub const DEFAULT_JWT_ISSUER: &str = "HealthHub API";

pub const TOKEN_TTL_HOURS_ENV: &str = "TOKEN_TTL_HOURS";
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
/// Longest accepted validity window (one week).
pub const MAX_TOKEN_TTL_HOURS: i64 = 7 * 24;

pub const SEED_DEFAULT_ROLES_ENV: &str = "SEED_DEFAULT_ROLES";

pub const ARGON2_MEMORY_KIB_ENV: &str = "ARGON2_MEMORY_KIB";
pub const ARGON2_ITERATIONS_ENV: &str = "ARGON2_ITERATIONS";
pub const ARGON2_PARALLELISM_ENV: &str = "ARGON2_PARALLELISM";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("JWT_SECRET must be at least 32 bytes (got {0})")]
    SecretTooShort(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("expected 'json' or 'pretty', got '{other}'")),
        }
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Settings {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Argon2Settings {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

/// Process configuration.
#[derive(Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub jwt_secret: Vec<u8>,
    pub jwt_issuer: String,
    pub token_ttl: chrono::Duration,
    pub seed_default_roles: bool,
    pub argon2: Argon2Settings,
    pub log_format: LogFormat,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`, which returns a variable's value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let jwt_secret = get(JWT_SECRET_ENV)
            .ok_or(ConfigError::Missing(JWT_SECRET_ENV))?
            .into_bytes();
        if jwt_secret.len() < MIN_KEY_LEN {
            return Err(ConfigError::SecretTooShort(jwt_secret.len()));
        }

        let ttl_hours: i64 = parse_or(
            get(TOKEN_TTL_HOURS_ENV),
            TOKEN_TTL_HOURS_ENV,
            DEFAULT_TOKEN_TTL_HOURS,
        )?;
        let token_ttl = chrono::Duration::try_hours(ttl_hours)
            .filter(|_| (1..=MAX_TOKEN_TTL_HOURS).contains(&ttl_hours))
            .ok_or_else(|| ConfigError::Invalid {
                name: TOKEN_TTL_HOURS_ENV,
                value: ttl_hours.to_string(),
                reason: format!("must be between 1 and {MAX_TOKEN_TTL_HOURS}"),
            })?;

        let defaults = Argon2Settings::default();
        let argon2 = Argon2Settings {
            memory_kib: parse_or(
                get(ARGON2_MEMORY_KIB_ENV),
                ARGON2_MEMORY_KIB_ENV,
                defaults.memory_kib,
            )?,
            iterations: parse_or(
                get(ARGON2_ITERATIONS_ENV),
                ARGON2_ITERATIONS_ENV,
                defaults.iterations,
            )?,
            parallelism: parse_or(
                get(ARGON2_PARALLELISM_ENV),
                ARGON2_PARALLELISM_ENV,
                defaults.parallelism,
            )?,
        };

        Ok(Self {
            data_dir: get(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(get(PORT_ENV), PORT_ENV, DEFAULT_PORT)?,
            jwt_secret,
            jwt_issuer: get(JWT_ISSUER_ENV).unwrap_or_else(|| DEFAULT_JWT_ISSUER.to_string()),
            token_ttl,
            seed_default_roles: parse_bool(
                get(SEED_DEFAULT_ROLES_ENV),
                SEED_DEFAULT_ROLES_ENV,
                true,
            )?,
            argon2,
            log_format: parse_or(get(LOG_FORMAT_ENV), LOG_FORMAT_ENV, LogFormat::Pretty)?,
        })
    }

    /// Path of the redb database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("data_dir", &self.data_dir)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("token_ttl_hours", &self.token_ttl.num_hours())
            .field("seed_default_roles", &self.seed_default_roles)
            .field("argon2", &self.argon2)
            .field("log_format", &self.log_format)
            .finish()
    }
}

fn parse_or<T>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_bool(raw: Option<String>, name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::Invalid {
            name,
            value: v,
            reason: "expected true or false".to_string(),
        }),
    }
}
