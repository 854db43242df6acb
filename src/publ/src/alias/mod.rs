//! Path aliases
//!
//! Maps request paths to redirects or renders of entries and categories.
//! Every lookup passes through the authorization gate before a disposition
//! is produced, so a stale alias never reveals a gated entry or its target.

pub mod disposition;
pub mod resolver;
pub mod routes;

#[cfg(test)]
mod tests;

use crate::error::{PublError, Result};
use crate::types::EntryId;
use tracing::warn;

pub use disposition::{Disposition, Redirect, RedirectStatus};
pub use resolver::AliasResolver;
pub use routes::{
    DefaultRoutes, NoPathRules, PathMatcher, PathRedirect, PathRuleSpec, RegexPathMatcher,
    UrlBuilder,
};

/// What a new alias points at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasDestination {
    pub entry: Option<EntryId>,
    pub category: Option<String>,
    pub redirect_url: Option<String>,
}

impl AliasDestination {
    pub fn entry(id: EntryId) -> Self {
        Self {
            entry: Some(id),
            ..Self::default()
        }
    }

    pub fn category(path: impl Into<String>) -> Self {
        Self {
            category: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self {
            redirect_url: Some(url.into()),
            ..Self::default()
        }
    }
}

/// Force a leading `/`, then URL-unescape
pub fn normalize_path(path: &str) -> String {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    let decoded = urlencoding::decode_binary(path.as_bytes());
    String::from_utf8_lossy(&decoded).into_owned()
}

/// Split an alias specification `path [template]` on whitespace.
///
/// Tokens after the template are ignored.
pub fn parse_alias_spec(spec: &str) -> Result<(String, Option<String>)> {
    let mut parts = spec.split_whitespace();

    let path = parts
        .next()
        .ok_or_else(|| PublError::InvalidInput("Empty alias specification".to_string()))?;
    let template = parts.next().map(str::to_string);

    if parts.next().is_some() {
        warn!("Ignoring extra tokens in alias specification '{}'", spec);
    }

    Ok((normalize_path(path), template))
}
