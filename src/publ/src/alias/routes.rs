//! Routing collaborators: path rules and endpoint URLs

use crate::error::{PublError, Result};
use crate::types::EntryId;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Redirect target produced by a path rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRedirect {
    pub url: String,
    pub permanent: bool,
}

/// Tests request paths against dynamic route rules
pub trait PathMatcher: Send + Sync {
    fn test_path(&self, path: &str) -> Option<PathRedirect>;
}

/// Matcher with no rules
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPathRules;

impl PathMatcher for NoPathRules {
    fn test_path(&self, _path: &str) -> Option<PathRedirect> {
        None
    }
}

/// Serializable path rule definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRuleSpec {
    /// Regular expression matched from the start of the path
    pub pattern: String,

    /// Target URL; `$1`, `${name}` expand to captures
    pub target: String,

    #[serde(default)]
    pub permanent: bool,
}

#[derive(Debug, Clone)]
struct PathRule {
    pattern: Regex,
    target: String,
    permanent: bool,
}

/// Ordered regex path rules; the first match wins
#[derive(Debug, Clone, Default)]
pub struct RegexPathMatcher {
    rules: Vec<PathRule>,
}

impl RegexPathMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a matcher from rule definitions
    pub fn from_specs(specs: &[PathRuleSpec]) -> Result<Self> {
        let mut matcher = Self::new();
        for spec in specs {
            matcher.add_rule(&spec.pattern, &spec.target, spec.permanent)?;
        }
        Ok(matcher)
    }

    /// Append a rule
    pub fn add_rule(&mut self, pattern: &str, target: &str, permanent: bool) -> Result<()> {
        let pattern = Regex::new(&format!("^(?:{})", pattern))
            .map_err(|e| PublError::InvalidInput(format!("Invalid path rule '{}': {}", pattern, e)))?;

        self.rules.push(PathRule {
            pattern,
            target: target.to_string(),
            permanent,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl PathMatcher for RegexPathMatcher {
    fn test_path(&self, path: &str) -> Option<PathRedirect> {
        self.rules.iter().find_map(|rule| {
            let captures = rule.pattern.captures(path)?;
            let mut url = String::new();
            captures.expand(&rule.target, &mut url);
            Some(PathRedirect {
                url,
                permanent: rule.permanent,
            })
        })
    }
}

/// Builds URLs for the category and entry endpoints
pub trait UrlBuilder: Send + Sync {
    /// URL of a category view, optionally with a template and a focused entry
    fn category_url(&self, category: &str, template: Option<&str>, entry_id: Option<EntryId>) -> String;

    /// URL of an entry
    fn entry_url(&self, category: &str, entry_id: EntryId) -> String;
}

/// The default site layout: `/{category}/{template}` and `/{category}/{id}`
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRoutes;

impl DefaultRoutes {
    fn category_prefix(category: &str) -> String {
        let mut prefix = String::from("/");
        for segment in category.split('/').filter(|s| !s.is_empty()) {
            prefix.push_str(&urlencoding::encode(segment));
            prefix.push('/');
        }
        prefix
    }
}

impl UrlBuilder for DefaultRoutes {
    fn category_url(&self, category: &str, template: Option<&str>, entry_id: Option<EntryId>) -> String {
        let mut url = Self::category_prefix(category);
        if let Some(template) = template {
            url.push_str(&urlencoding::encode(template));
        }
        if let Some(id) = entry_id {
            url.push_str(&format!("?id={}", id));
        }
        url
    }

    fn entry_url(&self, category: &str, entry_id: EntryId) -> String {
        format!("{}{}", Self::category_prefix(category), entry_id)
    }
}
