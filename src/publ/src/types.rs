//! Core content types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique entry identifier
pub type EntryId = i64;

/// Publication status of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PublishStatus {
    /// Entry should not be rendered
    Draft,
    /// Entry is reachable by direct link but not listed
    Hidden,
    /// Entry is visible
    Published,
    /// Entry becomes visible once its date passes
    Scheduled,
}

impl PublishStatus {
    /// Database representation
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Draft => 0,
            Self::Hidden => 1,
            Self::Published => 2,
            Self::Scheduled => 3,
        }
    }

    /// Parse the database representation
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Draft),
            1 => Some(Self::Hidden),
            2 => Some(Self::Published),
            3 => Some(Self::Scheduled),
            _ => None,
        }
    }
}

/// Indexed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Entry identifier
    pub id: EntryId,

    /// Category path the entry lives in ("" for the root)
    pub category: String,

    /// Publication status
    pub status: PublishStatus,

    /// UTC-normalized entry date
    pub entry_date: DateTime<Utc>,

    /// Optional title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// The entry's own redirect target, if it is a redirection entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,

    /// Whether access to the entry is group-gated
    #[serde(default)]
    pub auth: bool,

    /// Group required to view a gated entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_group: Option<String>,
}

impl Entry {
    /// Create a published, ungated entry
    pub fn new(id: EntryId, category: impl Into<String>) -> Self {
        Self {
            id,
            category: category.into(),
            status: PublishStatus::Published,
            entry_date: Utc::now(),
            title: None,
            redirect_url: None,
            auth: false,
            auth_group: None,
        }
    }

    pub fn with_status(mut self, status: PublishStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_date(mut self, entry_date: DateTime<Utc>) -> Self {
        self.entry_date = entry_date;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    /// Gate the entry behind membership in `group`
    pub fn with_auth_group(mut self, group: impl Into<String>) -> Self {
        self.auth = true;
        self.auth_group = Some(group.into());
        self
    }

    /// Whether the entry can be rendered at `now`
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            PublishStatus::Draft => false,
            PublishStatus::Hidden | PublishStatus::Published => true,
            PublishStatus::Scheduled => self.entry_date <= now,
        }
    }
}

/// Content category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category path ("" for the root)
    pub path: String,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Category {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The implicit root category
    pub fn root() -> Self {
        Self::new("")
    }
}

/// How a path alias is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AliasType {
    /// Redirect to the canonical location
    Redirect,
    /// Render the target in place
    Render,
}

impl AliasType {
    /// Database representation
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Redirect => 0,
            Self::Render => 1,
        }
    }

    /// Parse the database representation
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Redirect),
            1 => Some(Self::Render),
            _ => None,
        }
    }
}

/// Path alias mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathAlias {
    /// Normalized request path (unique)
    pub path: String,

    pub alias_type: AliasType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Referenced entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryId>,

    /// Referenced category path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl PathAlias {
    pub fn new(path: impl Into<String>, alias_type: AliasType) -> Self {
        Self {
            path: path.into(),
            alias_type,
            redirect_url: None,
            template: None,
            entry: None,
            category: None,
        }
    }
}

/// Values written by an alias upsert.
///
/// `None` fields keep whatever an existing record already holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasUpdate {
    pub path: String,
    pub alias_type: AliasType,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub entry: Option<EntryId>,
    #[serde(default)]
    pub category: Option<String>,
}

impl AliasUpdate {
    /// Merge into the existing record for the same path, if any
    pub fn apply(self, existing: Option<PathAlias>) -> PathAlias {
        let base = existing.unwrap_or_else(|| PathAlias::new(self.path.clone(), self.alias_type));
        PathAlias {
            path: self.path,
            alias_type: self.alias_type,
            redirect_url: self.redirect_url.or(base.redirect_url),
            template: self.template.or(base.template),
            entry: self.entry.or(base.entry),
            category: self.category.or(base.category),
        }
    }
}

/// Destination of a path alias
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasTarget {
    Entry(EntryId),
    Category(String),
}

/// Authenticated user, identified by a federated identity URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    me: String,
}

impl User {
    pub fn new(me: impl Into<String>) -> Self {
        Self { me: me.into() }
    }

    /// The federated identity name of the user
    pub fn name(&self) -> &str {
        &self.me
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.me)
    }
}
