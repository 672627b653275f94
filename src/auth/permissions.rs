// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Permission patterns and the wildcard matcher.
//!
//! A permission is the string `METHOD:/path` derived from a route's HTTP
//! method and path template. A service access token carries a list of
//! patterns; a route is allowed when any pattern grants its permission.
//!
//! ## Pattern forms
//!
//! | Pattern          | Grants                                              |
//! |------------------|-----------------------------------------------------|
//! | `GET:/v1/tokens` | exactly that method and path                        |
//! | `*`              | everything                                          |
//! | `GET:*`          | every path for `GET`                                |
//! | `*:/v1/tokens`   | every method for that exact path                    |
//! | `*:/v1/*`        | every method for paths whose first segment is `v1`  |
//!
//! The last form only looks at the *first* path segment, so `*:/v1/tokens/*`
//! grants the same set as `*:/v1/*`. There is no regex matching.

use axum::http::Method;

/// Pattern granting every permission.
pub const UNIVERSAL: &str = "*";

/// Build the permission string for a route.
pub fn permission_for(method: &Method, path: &str) -> String {
    format!("{}:{}", method.as_str(), path)
}

/// Check whether `required` (`METHOD:/path`) is granted by any pattern.
///
/// Pure and allocation-free; safe to call from any thread.
pub fn is_granted<S: AsRef<str>>(required: &str, granted: &[S]) -> bool {
    granted
        .iter()
        .any(|pattern| pattern_grants(pattern.as_ref(), required))
}

fn pattern_grants(pattern: &str, required: &str) -> bool {
    if pattern == required || pattern == UNIVERSAL {
        return true;
    }

    let (Some((pattern_method, pattern_path)), Some((method, path))) =
        (pattern.split_once(':'), required.split_once(':'))
    else {
        return false;
    };

    if pattern_path == "*" {
        return pattern_method == method;
    }

    if pattern_method != "*" {
        return false;
    }

    if pattern_path == path {
        return true;
    }

    match pattern_path.strip_suffix("/*") {
        Some(prefix) => first_segment(prefix).is_some_and(|seg| first_segment(path) == Some(seg)),
        None => false,
    }
}

/// First non-empty segment of an absolute path (`/a/b/c` -> `a`).
fn first_segment(path: &str) -> Option<&str> {
    path.strip_prefix('/')?
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

/// Reason a pattern was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid permission pattern '{pattern}': {reason}")]
pub struct InvalidPattern {
    pub pattern: String,
    pub reason: &'static str,
}

/// Validate a pattern before it is attached to a token.
pub fn validate_pattern(pattern: &str) -> Result<(), InvalidPattern> {
    let invalid = |reason| InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    };

    if pattern == UNIVERSAL {
        return Ok(());
    }

    let (method, path) = pattern
        .split_once(':')
        .ok_or_else(|| invalid("expected METHOD:/path"))?;

    if method != "*" && Method::from_bytes(method.as_bytes()).is_err() {
        return Err(invalid("unknown HTTP method"));
    }
    if method != "*" && method != method.to_ascii_uppercase() {
        return Err(invalid("method must be upper case"));
    }

    if path == "*" {
        if method == "*" {
            return Err(invalid("use '*' to grant everything"));
        }
        return Ok(());
    }

    if !path.starts_with('/') {
        return Err(invalid("path must start with '/'"));
    }

    if let Some(prefix) = path.strip_suffix("/*") {
        if method != "*" {
            return Err(invalid("subtree wildcards require '*' as method"));
        }
        if first_segment(prefix).is_none() {
            return Err(invalid("subtree wildcard needs a first segment"));
        }
    } else if path.contains('*') {
        return Err(invalid("'*' is only allowed as a trailing '/*'"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universal_wildcard_grants_everything() {
        for required in ["GET:/a", "POST:/a/b/c", "DELETE:/v1/tokens/{token_id}"] {
            assert!(is_granted(required, &["*"]));
        }
    }

    #[test]
    fn exact_match() {
        assert!(is_granted("GET:/v1/tokens", &["GET:/v1/tokens"]));
        assert!(!is_granted("GET:/v1/tokens", &["POST:/v1/tokens"]));
    }

    #[test]
    fn method_wildcard() {
        assert!(is_granted("GET:/a/b", &["GET:*"]));
        assert!(!is_granted("GET:/a/b", &["POST:*"]));
    }

    #[test]
    fn exact_path_any_method() {
        assert!(is_granted("GET:/a/b", &["*:/a/b"]));
        assert!(is_granted("DELETE:/a/b", &["*:/a/b"]));
        assert!(!is_granted("GET:/a/b", &["*:/a/c"]));
    }

    #[test]
    fn first_segment_subtree() {
        assert!(is_granted("GET:/a/b/c", &["*:/a/*"]));
        assert!(is_granted("GET:/a/b/c", &["*:/a/b/*"]));
        assert!(is_granted("PUT:/a/x/y/z", &["*:/a/b/*"]));
        assert!(!is_granted("GET:/a/b/c", &["*:/x/*"]));
        assert!(!is_granted("GET:/ab/c", &["*:/a/*"]));
    }

    #[test]
    fn empty_grant_denies() {
        let none: [&str; 0] = [];
        assert!(!is_granted("GET:/a", &none));
    }

    #[test]
    fn any_pattern_in_the_list_is_enough() {
        let granted = vec!["POST:/a".to_string(), "GET:*".to_string()];
        assert!(is_granted("GET:/z", &granted));
    }

    #[test]
    fn permission_for_joins_method_and_path() {
        assert_eq!(
            permission_for(&Method::DELETE, "/v1/tokens/{token_id}"),
            "DELETE:/v1/tokens/{token_id}"
        );
    }

    #[test]
    fn validate_accepts_all_documented_forms() {
        for pattern in ["*", "GET:*", "GET:/v1/tokens", "*:/v1/tokens", "*:/v1/*"] {
            assert!(validate_pattern(pattern).is_ok(), "{pattern}");
        }
    }

    #[test]
    fn validate_rejects_garbage() {
        for pattern in ["", "GET", "get:/a", "GET:a", "GET:/a/*", "*:/a*b", "*:*", "*:/*"] {
            assert!(validate_pattern(pattern).is_err(), "{pattern}");
        }
    }
}
