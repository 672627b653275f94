// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Guarded route registration.
//!
//! Backend routes are declared through [`GuardedRouter`], which derives each
//! route's required permission (`METHOD:/path/{param}`) from its method and
//! path template and installs the [`route_guard`] in front of the handler.
//! The resulting [`RouteRegistry`] lists every guarded route so operators can
//! see which patterns a token needs.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    handler::Handler,
    http::Method,
    middleware::from_fn_with_state,
    routing::{on, MethodFilter, MethodRouter},
    Router,
};
use serde::Serialize;
use utoipa::ToSchema;

use super::middleware::{route_guard, GuardContext, RouteGuard};
use super::permissions::permission_for;

/// A guarded route and the permission it requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RouteEntry {
    pub method: String,
    pub path: String,
    pub permission: String,
}

/// All guarded routes, ordered by path then method.
#[derive(Debug, Clone, Default)]
pub struct RouteRegistry {
    entries: Arc<Vec<RouteEntry>>,
}

impl RouteRegistry {
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }
}

/// Builder that registers handlers behind the route guard.
pub struct GuardedRouter<S> {
    guard: RouteGuard,
    routes: BTreeMap<String, MethodRouter<S>>,
    entries: Vec<RouteEntry>,
}

impl<S> GuardedRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(guard: RouteGuard) -> Self {
        Self {
            guard,
            routes: BTreeMap::new(),
            entries: Vec::new(),
        }
    }

    /// Register `handler` for `method` on `path`.
    ///
    /// # Panics
    ///
    /// On a method axum cannot route, or when the same method and path are
    /// registered twice. Both are programming errors in route declarations.
    pub fn route<H, T>(mut self, method: Method, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        let permission = permission_for(&method, path);
        let filter = MethodFilter::try_from(method.clone())
            .unwrap_or_else(|_| panic!("unsupported method {method} for {path}"));

        let ctx = GuardContext {
            guard: self.guard.clone(),
            permission: Arc::from(permission.as_str()),
        };
        let method_router =
            on(filter, handler).route_layer(from_fn_with_state(ctx, route_guard));

        let merged = match self.routes.remove(path) {
            Some(existing) => existing.merge(method_router),
            None => method_router,
        };
        self.routes.insert(path.to_string(), merged);

        self.entries.push(RouteEntry {
            method: method.as_str().to_string(),
            path: path.to_string(),
            permission,
        });
        self
    }

    /// Build the router and the registry describing it.
    pub fn finish(self) -> (Router<S>, RouteRegistry) {
        let router = self
            .routes
            .into_iter()
            .fold(Router::new(), |router, (path, method_router)| {
                router.route(&path, method_router)
            });

        let mut entries = self.entries;
        entries.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.method.cmp(&b.method)));

        (
            router,
            RouteRegistry {
                entries: Arc::new(entries),
            },
        )
    }
}
