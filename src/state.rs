// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use crate::auth::{AccessTokenAuthority, Hs256Codec, RoleRegistry, RouteGuard};
use crate::clock::Clock;
use crate::config::{GatewayConfig, OidcConfig};
use crate::proxy::{AuthorizingProxy, ForwardError, ProxySettings, ReqwestForwarder};
use crate::session::{
    IdpError, OidcTokenClient, OidcUserInfoClient, RefreshCredentials, SessionStore,
    SessionTokenManager, UserInfoCache, UserInfoError, UserInfoSource,
};
use crate::storage::{FileRoleRegistry, FileStorage, FileTokenRegistry, StorageError, StoragePaths};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("storage initialization failed: {0}")]
    Storage(#[from] StorageError),

    #[error("identity provider client: {0}")]
    Idp(#[from] IdpError),

    #[error("user-info client: {0}")]
    UserInfo(#[from] UserInfoError),

    #[error("proxy client: {0}")]
    Forwarder(#[from] ForwardError),
}

/// OIDC pieces, present only when the identity provider is configured.
pub struct OidcState {
    pub config: OidcConfig,
    pub manager: SessionTokenManager,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub clock: Arc<dyn Clock>,
    pub authority: Arc<AccessTokenAuthority>,
    pub guard: RouteGuard,
    pub roles: Arc<dyn RoleRegistry>,
    pub sessions: Arc<SessionStore>,
    pub userinfo_cache: Arc<UserInfoCache>,
    pub userinfo_source: Option<Arc<dyn UserInfoSource>>,
    pub oidc: Option<Arc<OidcState>>,
    pub proxy: Arc<AuthorizingProxy>,
    storage: Arc<FileStorage>,
}

impl AppState {
    /// Wire every component from configuration. Initializes the data
    /// directory.
    pub fn new(config: GatewayConfig, clock: Arc<dyn Clock>) -> Result<Self, StartupError> {
        let mut storage = FileStorage::new(StoragePaths::new(&config.data_dir));
        storage.initialize()?;
        let storage = Arc::new(storage);

        let authority = Arc::new(AccessTokenAuthority::new(
            config.access_token_secret.as_bytes().to_vec(),
            Arc::new(Hs256Codec),
            Arc::new(FileTokenRegistry::new(storage.clone())),
            clock.clone(),
        ));
        let guard = RouteGuard::new(authority.clone(), config.route_guard_enabled);
        if !config.route_guard_enabled {
            warn!("Route guard disabled, /v1 routes are open");
        }

        let roles: Arc<dyn RoleRegistry> = Arc::new(FileRoleRegistry::new(storage.clone()));
        let userinfo_cache = Arc::new(UserInfoCache::new(clock.clone()));

        let (oidc, userinfo_source) = match &config.oidc {
            Some(oidc_config) => {
                let manager = SessionTokenManager::new(
                    Arc::new(OidcTokenClient::new(config.proxy_timeout)?),
                    RefreshCredentials {
                        client_id: oidc_config.client_id.clone(),
                        client_secret: oidc_config.client_secret.clone(),
                        scope: oidc_config.scope.clone(),
                    },
                    clock.clone(),
                    to_chrono(config.token_lifetime),
                    to_chrono(config.token_refresh_margin),
                );
                let source: Arc<dyn UserInfoSource> = Arc::new(OidcUserInfoClient::new(
                    oidc_config.userinfo_url.as_str(),
                    config.proxy_timeout,
                )?);
                let oidc = OidcState {
                    config: oidc_config.clone(),
                    manager,
                };
                (Some(Arc::new(oidc)), Some(source))
            }
            None => {
                if config.proxy_authorization_enabled {
                    warn!("OIDC not configured, every proxy call will redirect to sign-in");
                }
                (None, None)
            }
        };

        if config.service_access_token.is_none() {
            warn!("SERVICE_ACCESS_TOKEN not set, proxied calls carry no backend credential");
        }

        let proxy = Arc::new(AuthorizingProxy::new(
            ProxySettings {
                authorization_enabled: config.proxy_authorization_enabled,
                admin_role_name: config.admin_role_name.clone(),
                service_access_token: config.service_access_token.clone(),
                sign_in_url: config.sign_in_path.clone(),
                userinfo_ttl: to_chrono(config.userinfo_cache_ttl),
            },
            roles.clone(),
            userinfo_cache.clone(),
            userinfo_source.clone(),
            Arc::new(ReqwestForwarder::new(config.proxy_timeout)?),
            clock.clone(),
        ));

        info!(
            data_dir = %config.data_dir.display(),
            route_guard = config.route_guard_enabled,
            proxy_authorization = config.proxy_authorization_enabled,
            oidc = oidc.is_some(),
            "Application state initialized"
        );

        let sessions = Arc::new(SessionStore::new(
            clock.clone(),
            to_chrono(config.session_idle_timeout),
        ));

        Ok(Self {
            config: Arc::new(config),
            clock,
            authority,
            guard,
            roles,
            sessions,
            userinfo_cache,
            userinfo_source,
            oidc,
            proxy,
            storage,
        })
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }
}

fn to_chrono(duration: std::time::Duration) -> Duration {
    Duration::from_std(duration).unwrap_or(Duration::MAX)
}
