// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults and the typed configuration built
//! from them. Configuration is read once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `KEYCLOAK_URL` | Identity provider base URL | `http://localhost:8181` |
//! | `KEYCLOAK_REALM` | Realm name | `supermarket-management-system` |
//! | `KEYCLOAK_CLIENT_ID` | Public client id | `react-client` |
//! | `KEYCLOAK_REFRESH_TOKEN` | Stored session used by the silent check | unset |
//! | `APP_ORIGIN` | Origin the provider redirects back to | `http://localhost:5173` |
//! | `API_BASE_URL` | Backend API base URL | `http://localhost:9000/api` |
//! | `TOKEN_REFRESH_INTERVAL_SECS` | Refresh scheduler period | `60` |
//! | `TOKEN_MIN_VALIDITY_SECS` | Refresh when the token expires within this window | `70` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::env;
use std::time::Duration;

use url::Url;

pub const KEYCLOAK_URL_ENV: &str = "KEYCLOAK_URL";
pub const KEYCLOAK_REALM_ENV: &str = "KEYCLOAK_REALM";
pub const KEYCLOAK_CLIENT_ID_ENV: &str = "KEYCLOAK_CLIENT_ID";
pub const KEYCLOAK_REFRESH_TOKEN_ENV: &str = "KEYCLOAK_REFRESH_TOKEN";
pub const APP_ORIGIN_ENV: &str = "APP_ORIGIN";
pub const API_BASE_URL_ENV: &str = "API_BASE_URL";
pub const TOKEN_REFRESH_INTERVAL_ENV: &str = "TOKEN_REFRESH_INTERVAL_SECS";
pub const TOKEN_MIN_VALIDITY_ENV: &str = "TOKEN_MIN_VALIDITY_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_KEYCLOAK_URL: &str = "http://localhost:8181";
const DEFAULT_REALM: &str = "supermarket-management-system";
const DEFAULT_CLIENT_ID: &str = "react-client";
const DEFAULT_APP_ORIGIN: &str = "http://localhost:5173";
const DEFAULT_API_BASE_URL: &str = "http://localhost:9000/api";

/// Default period of the token refresh check.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Default safety window: refresh when the token expires sooner than this.
pub const DEFAULT_MIN_VALIDITY: Duration = Duration::from_secs(70);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("{name} must be a whole number of seconds, got {value:?}")]
    InvalidSeconds { name: &'static str, value: String },
}

/// Where the identity provider lives and who we are to it.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub base_url: Url,
    pub realm: String,
    pub client_id: String,
    /// Redirect target after login, registration and logout
    pub redirect_uri: Url,
    /// Refresh token of a previous session, probed by the silent check
    pub stored_refresh_token: Option<String>,
}

/// Timing of the background token refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSchedule {
    pub interval: Duration,
    pub min_validity: Duration,
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL,
            min_validity: DEFAULT_MIN_VALIDITY,
        }
    }
}

/// Complete session core configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub identity: IdentityConfig,
    pub api_base_url: Url,
    pub refresh: RefreshSchedule,
}

impl SessionConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str, default: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let realm = get(KEYCLOAK_REALM_ENV, DEFAULT_REALM);
        let client_id = get(KEYCLOAK_CLIENT_ID_ENV, DEFAULT_CLIENT_ID);

        let origin = parse_url(APP_ORIGIN_ENV, &get(APP_ORIGIN_ENV, DEFAULT_APP_ORIGIN))?;
        let redirect_uri = origin.join("/").map_err(|e| ConfigError::InvalidUrl {
            name: APP_ORIGIN_ENV,
            reason: e.to_string(),
        })?;

        let identity = IdentityConfig {
            base_url: parse_url(KEYCLOAK_URL_ENV, &get(KEYCLOAK_URL_ENV, DEFAULT_KEYCLOAK_URL))?,
            realm,
            client_id,
            redirect_uri,
            stored_refresh_token: lookup(KEYCLOAK_REFRESH_TOKEN_ENV).filter(|t| !t.trim().is_empty()),
        };

        let refresh = RefreshSchedule {
            interval: parse_seconds(
                TOKEN_REFRESH_INTERVAL_ENV,
                lookup(TOKEN_REFRESH_INTERVAL_ENV),
                DEFAULT_REFRESH_INTERVAL,
            )?,
            min_validity: parse_seconds(
                TOKEN_MIN_VALIDITY_ENV,
                lookup(TOKEN_MIN_VALIDITY_ENV),
                DEFAULT_MIN_VALIDITY,
            )?,
        };

        Ok(Self {
            identity,
            api_base_url: parse_url(API_BASE_URL_ENV, &get(API_BASE_URL_ENV, DEFAULT_API_BASE_URL))?,
            refresh,
        })
    }
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })
}

fn parse_seconds(
    name: &'static str,
    value: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or(ConfigError::InvalidSeconds { name, value: v }),
    }
}
