//! Cross-origin policy
//!
//! Origins are configured as patterns. A pattern is an exact origin, `*`
//! (any origin), or an origin with a single `*` standing for one or more
//! host characters, e.g. `https://*.vercel.app`. Requests from other
//! origins get no CORS headers, which makes the browser reject them.

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPattern {
    Any,
    Exact(String),
    Wildcard { prefix: String, suffix: String },
}

impl OriginPattern {
    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim().trim_end_matches('/').to_ascii_lowercase();
        if pattern == "*" {
            return OriginPattern::Any;
        }
        match pattern.split_once('*') {
            Some((prefix, suffix)) => OriginPattern::Wildcard {
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            },
            None => OriginPattern::Exact(pattern),
        }
    }

    pub fn matches(&self, origin: &str) -> bool {
        let origin = origin.to_ascii_lowercase();
        match self {
            OriginPattern::Any => true,
            OriginPattern::Exact(exact) => origin == *exact,
            OriginPattern::Wildcard { prefix, suffix } => {
                if origin.len() <= prefix.len() + suffix.len() {
                    return false;
                }
                if !origin.starts_with(prefix.as_str()) || !origin.ends_with(suffix.as_str()) {
                    return false;
                }
                let middle = &origin[prefix.len()..origin.len() - suffix.len()];
                !middle.contains('/')
            }
        }
    }
}

/// Parsed set of allowed origins
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    patterns: Vec<OriginPattern>,
}

impl OriginPolicy {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .map(|p| OriginPattern::parse(p.as_ref()))
                .collect(),
        }
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(origin))
    }
}

/// Build the CORS layer applied to every route of both services
pub fn cors_layer<S: AsRef<str>>(allowed_origins: &[S]) -> CorsLayer {
    let policy = OriginPolicy::new(allowed_origins);

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts| {
                origin
                    .to_str()
                    .map(|o| policy.allows(o))
                    .unwrap_or(false)
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
