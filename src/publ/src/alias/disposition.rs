//! Alias dispositions

use crate::types::{Entry, User};
use serde::{Deserialize, Serialize};

/// HTTP redirect status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectStatus {
    /// 301 Moved Permanently
    Permanent,
    /// 302 Found
    Temporary,
}

impl RedirectStatus {
    pub fn code(self) -> u16 {
        match self {
            Self::Permanent => 301,
            Self::Temporary => 302,
        }
    }
}

/// A redirect response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub location: String,
    pub status: RedirectStatus,
}

impl Redirect {
    pub fn permanent(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            status: RedirectStatus::Permanent,
        }
    }

    pub fn temporary(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            status: RedirectStatus::Temporary,
        }
    }
}

/// How the caller should respond to an aliased path.
///
/// Resolution yields `Option<Disposition>`; `None` means not found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum Disposition {
    /// Respond directly
    Response(Redirect),

    /// Render an entry
    RenderEntry {
        entry: Entry,
        category: String,
        template: Option<String>,
    },

    /// Render a category view
    RenderCategory {
        category: String,
        template: Option<String>,
    },

    /// The alias points at an entry the user may not see
    AuthFailed {
        user: Option<User>,
        entry: Entry,
        category: String,
    },
}
