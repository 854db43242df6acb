//! Parser for the user list configuration
//!
//! The format is INI-like: every `[section]` names a group and every line
//! inside it names one member. Keys carry no value; the key delimiter is NUL,
//! which never appears in a well-formed text file, so identity URLs
//! containing `=` or `:` are taken whole.
//!
//! ```text
//! [friends]
//! https://alice.example/
//! https://bob.example/
//!
//! [family]
//! friends
//! ```

use crate::error::{PublError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Section whose members belong to every group.
///
/// Matched as written. Every other group name is compared case-insensitively
/// once the config is inverted into a `GroupMap`.
pub const DEFAULT_SECTION: &str = "DEFAULT";

const KEY_DELIMITER: char = '\0';

/// Parsed user list: group name -> member names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupConfig {
    groups: BTreeMap<String, BTreeSet<String>>,
}

impl GroupConfig {
    /// Members listed directly under `group`
    pub fn members(&self, group: &str) -> Option<&BTreeSet<String>> {
        self.groups.get(group)
    }

    /// Iterate over `(group, members)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.groups.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Parse user list text into a group -> members mapping.
///
/// Member names are case-folded to lowercase. Group names are kept as written
/// here and folded by `GroupMap`.
/// Members of `[DEFAULT]` are added to every other group as well.
pub fn parse_group_config(text: &str) -> Result<GroupConfig> {
    let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut current: Option<String> = None;

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let name = header.strip_suffix(']').ok_or_else(|| {
                PublError::Config(format!("line {}: unterminated section header", index + 1))
            })?;
            let name = name.trim().to_string();
            groups.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }

        let Some(group) = current.as_ref() else {
            return Err(PublError::Config(format!(
                "line {}: member '{}' appears before any section header",
                index + 1,
                line
            )));
        };

        let key = line
            .split_once(KEY_DELIMITER)
            .map_or(line, |(key, _)| key)
            .trim()
            .to_lowercase();
        if key.is_empty() {
            continue;
        }

        if let Some(members) = groups.get_mut(group) {
            members.insert(key);
        }
    }

    if let Some(defaults) = groups.get(DEFAULT_SECTION).cloned() {
        for (name, members) in groups.iter_mut() {
            if name != DEFAULT_SECTION {
                members.extend(defaults.iter().cloned());
            }
        }
    }

    Ok(GroupConfig { groups })
}
