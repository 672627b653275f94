// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup. Invalid values
//! abort startup; nothing is silently defaulted except unset variables.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Root directory for token/role/audit files | `/data` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `ROUTE_GUARD_ENABLED` | Enforce service-token permissions on `/v1` | `true` |
//! | `PROXY_AUTHORIZATION_ENABLED` | Require an admin session on `/proxy` | `true` |
//! | `ADMIN_ROLE_NAME` | Role checked by the proxy | `admin` |
//! | `TOKEN_LIFETIME_SECONDS` | Session access-token lifetime | `3600` |
//! | `TOKEN_REFRESH_MARGIN_SECONDS` | Refresh this long before expiry | `60` |
//! | `SERVICE_ACCESS_TOKEN` | Signed token the proxy presents upstream | unset |
//! | `ACCESS_TOKEN_SECRET` | HS256 secret, at least 32 bytes | Required |
//! | `USERINFO_CACHE_TTL_SECONDS` | Upper bound on cached user info | `300` |
//! | `PROXY_TIMEOUT_SECONDS` | Upstream/IdP transport timeout | `30` |
//! | `SIGN_IN_PATH` | Redirect target when sign-in is required | `/auth/sign-in` |
//! | `OIDC_*` | Identity provider client, all or none | unset |
//! | `SESSION_IDLE_TIMEOUT_SECONDS` | Drop browser sessions unused this long | `28800` |
//! | `SESSION_COOKIE_SECURE` | `Secure` attribute on cookies | `true` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; serve HTTPS when both set | unset |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::auth::tokens::MIN_SECRET_LEN;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the data directory path.
///
/// Token records, roles and audit logs live under this directory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const ROUTE_GUARD_ENABLED_ENV: &str = "ROUTE_GUARD_ENABLED";
pub const PROXY_AUTHORIZATION_ENABLED_ENV: &str = "PROXY_AUTHORIZATION_ENABLED";
pub const ADMIN_ROLE_NAME_ENV: &str = "ADMIN_ROLE_NAME";
pub const TOKEN_LIFETIME_SECONDS_ENV: &str = "TOKEN_LIFETIME_SECONDS";
pub const TOKEN_REFRESH_MARGIN_SECONDS_ENV: &str = "TOKEN_REFRESH_MARGIN_SECONDS";
pub const SERVICE_ACCESS_TOKEN_ENV: &str = "SERVICE_ACCESS_TOKEN";
pub const ACCESS_TOKEN_SECRET_ENV: &str = "ACCESS_TOKEN_SECRET";
pub const USERINFO_CACHE_TTL_SECONDS_ENV: &str = "USERINFO_CACHE_TTL_SECONDS";
pub const PROXY_TIMEOUT_SECONDS_ENV: &str = "PROXY_TIMEOUT_SECONDS";
pub const SIGN_IN_PATH_ENV: &str = "SIGN_IN_PATH";
pub const SESSION_IDLE_TIMEOUT_SECONDS_ENV: &str = "SESSION_IDLE_TIMEOUT_SECONDS";
pub const SESSION_COOKIE_SECURE_ENV: &str = "SESSION_COOKIE_SECURE";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

pub const OIDC_AUTHORIZATION_URL_ENV: &str = "OIDC_AUTHORIZATION_URL";
pub const OIDC_TOKEN_URL_ENV: &str = "OIDC_TOKEN_URL";
pub const OIDC_USERINFO_URL_ENV: &str = "OIDC_USERINFO_URL";
pub const OIDC_CLIENT_ID_ENV: &str = "OIDC_CLIENT_ID";
pub const OIDC_CLIENT_SECRET_ENV: &str = "OIDC_CLIENT_SECRET";
pub const OIDC_REDIRECT_URI_ENV: &str = "OIDC_REDIRECT_URI";
pub const OIDC_SCOPE_ENV: &str = "OIDC_SCOPE";

const DEFAULT_OIDC_SCOPE: &str = "openid profile email offline_access";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("OIDC configuration is incomplete, missing {0}")]
    IncompleteOidc(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Identity provider client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcConfig {
    pub authorization_url: Url,
    pub token_url: Url,
    pub userinfo_url: Url,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Url,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub log_format: LogFormat,
    pub route_guard_enabled: bool,
    pub proxy_authorization_enabled: bool,
    pub admin_role_name: String,
    pub token_lifetime: Duration,
    pub token_refresh_margin: Duration,
    pub service_access_token: Option<String>,
    pub access_token_secret: String,
    pub userinfo_cache_ttl: Duration,
    pub proxy_timeout: Duration,
    pub sign_in_path: String,
    pub session_idle_timeout: Duration,
    pub session_cookie_secure: bool,
    pub oidc: Option<OidcConfig>,
    pub tls: Option<TlsPaths>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(&get, PORT_ENV, 8080)?;
        let bind_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: HOST_ENV,
                reason: e.to_string(),
            })?;

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    reason: format!("expected json or pretty, got {other}"),
                })
            }
        };

        let access_token_secret =
            get(ACCESS_TOKEN_SECRET_ENV).ok_or(ConfigError::Missing(ACCESS_TOKEN_SECRET_ENV))?;
        if access_token_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: ACCESS_TOKEN_SECRET_ENV,
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }

        let token_lifetime: u32 = parse_or(&get, TOKEN_LIFETIME_SECONDS_ENV, 3600)?;
        let token_refresh_margin: u32 = parse_or(&get, TOKEN_REFRESH_MARGIN_SECONDS_ENV, 60)?;
        if token_lifetime == 0 {
            return Err(ConfigError::Invalid {
                name: TOKEN_LIFETIME_SECONDS_ENV,
                reason: "must be positive".to_string(),
            });
        }
        if token_refresh_margin >= token_lifetime {
            return Err(ConfigError::Invalid {
                name: TOKEN_REFRESH_MARGIN_SECONDS_ENV,
                reason: "must be smaller than the token lifetime".to_string(),
            });
        }

        let session_idle_timeout: u32 = parse_or(&get, SESSION_IDLE_TIMEOUT_SECONDS_ENV, 28_800)?;
        if session_idle_timeout == 0 {
            return Err(ConfigError::Invalid {
                name: SESSION_IDLE_TIMEOUT_SECONDS_ENV,
                reason: "must be positive".to_string(),
            });
        }

        let sign_in_path = get(SIGN_IN_PATH_ENV).unwrap_or_else(|| "/auth/sign-in".to_string());
        if !sign_in_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                name: SIGN_IN_PATH_ENV,
                reason: "must be an absolute path".to_string(),
            });
        }

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        Ok(Self {
            bind_addr,
            data_dir: get(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(crate::storage::paths::DATA_ROOT)),
            log_format,
            route_guard_enabled: parse_bool(&get, ROUTE_GUARD_ENABLED_ENV, true)?,
            proxy_authorization_enabled: parse_bool(&get, PROXY_AUTHORIZATION_ENABLED_ENV, true)?,
            admin_role_name: get(ADMIN_ROLE_NAME_ENV).unwrap_or_else(|| "admin".to_string()),
            token_lifetime: Duration::from_secs(token_lifetime.into()),
            token_refresh_margin: Duration::from_secs(token_refresh_margin.into()),
            service_access_token: get(SERVICE_ACCESS_TOKEN_ENV),
            access_token_secret,
            userinfo_cache_ttl: Duration::from_secs(
                parse_or::<u32, _>(&get, USERINFO_CACHE_TTL_SECONDS_ENV, 300)?.into(),
            ),
            proxy_timeout: Duration::from_secs(
                parse_or::<u32, _>(&get, PROXY_TIMEOUT_SECONDS_ENV, 30)?.into(),
            ),
            sign_in_path,
            session_idle_timeout: Duration::from_secs(session_idle_timeout.into()),
            session_cookie_secure: parse_bool(&get, SESSION_COOKIE_SECURE_ENV, true)?,
            oidc: oidc_from(&get)?,
            tls,
        })
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}

fn parse_bool<G>(get: &G, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(name).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got {other}"),
        }),
    }
}

fn oidc_from<G>(get: &G) -> Result<Option<OidcConfig>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let required = [
        OIDC_AUTHORIZATION_URL_ENV,
        OIDC_TOKEN_URL_ENV,
        OIDC_USERINFO_URL_ENV,
        OIDC_CLIENT_ID_ENV,
        OIDC_CLIENT_SECRET_ENV,
        OIDC_REDIRECT_URI_ENV,
    ];
    let missing: Vec<&'static str> = required
        .into_iter()
        .filter(|name| get(*name).is_none())
        .collect();
    if missing.len() == required.len() {
        return Ok(None);
    }
    if let Some(name) = missing.first() {
        return Err(ConfigError::IncompleteOidc(*name));
    }

    let url = |name: &'static str| -> Result<Url, ConfigError> {
        let raw = get(name).ok_or(ConfigError::IncompleteOidc(name))?;
        Url::parse(&raw).map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        })
    };

    Ok(Some(OidcConfig {
        authorization_url: url(OIDC_AUTHORIZATION_URL_ENV)?,
        token_url: url(OIDC_TOKEN_URL_ENV)?,
        userinfo_url: url(OIDC_USERINFO_URL_ENV)?,
        client_id: get(OIDC_CLIENT_ID_ENV).ok_or(ConfigError::IncompleteOidc(OIDC_CLIENT_ID_ENV))?,
        client_secret: get(OIDC_CLIENT_SECRET_ENV)
            .ok_or(ConfigError::IncompleteOidc(OIDC_CLIENT_SECRET_ENV))?,
        redirect_uri: url(OIDC_REDIRECT_URI_ENV)?,
        scope: get(OIDC_SCOPE_ENV).unwrap_or_else(|| DEFAULT_OIDC_SCOPE.to_string()),
    }))
}
