// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HttpOnly cookies carrying the session id and the sign-in `state`.

use axum::http::{header::COOKIE, HeaderMap, HeaderValue};
use cookie::{time::Duration, Cookie, SameSite};

/// Opaque session id.
pub const SESSION_COOKIE_NAME: &str = "console_session";

/// OAuth `state` between `/auth/sign-in` and `/auth/callback`.
pub const STATE_COOKIE_NAME: &str = "console_oauth_state";

const STATE_COOKIE_MAX_AGE_SECS: i64 = 600;

/// Builds the gateway's cookies. `secure` should only be off for local HTTP.
#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    pub secure: bool,
}

impl CookieSettings {
    /// Browser-session cookie without `Max-Age`. The server-side record's
    /// idle timeout bounds its life, so token refreshes never strand it.
    pub fn session(&self, session_id: &str) -> Cookie<'static> {
        self.build(SESSION_COOKIE_NAME, session_id.to_string(), None)
    }

    pub fn state(&self, state: &str) -> Cookie<'static> {
        self.build(
            STATE_COOKIE_NAME,
            state.to_string(),
            Some(STATE_COOKIE_MAX_AGE_SECS),
        )
    }

    /// Expired cookie that removes `name` from the browser.
    pub fn clear(&self, name: &'static str) -> Cookie<'static> {
        self.build(name, String::new(), Some(0))
    }

    fn build(
        &self,
        name: &'static str,
        value: String,
        max_age_secs: Option<i64>,
    ) -> Cookie<'static> {
        let mut cookie = Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            // /auth/callback arrives as a cross-site top-level navigation
            .same_site(SameSite::Lax);
        if let Some(secs) = max_age_secs {
            cookie = cookie.max_age(Duration::seconds(secs));
        }
        cookie.build()
    }
}

/// `Set-Cookie` header value for `cookie`.
pub fn header_value(cookie: &Cookie<'_>) -> Option<HeaderValue> {
    HeaderValue::from_str(&cookie.to_string()).ok()
}

/// Value of the first cookie called `name` in the request.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}
