//! Member -> group mapping and transitive closure
//!
//! Group names may themselves appear as members of other groups, so the
//! mapping forms a directed graph. The closure of an identity is every node
//! reachable from it, computed breadth-first with a visited set so that
//! cycles terminate.
//!
//! Names are compared case-insensitively: group names are folded to
//! lowercase here, matching the member names the parser already folds.

use super::config::GroupConfig;
use std::collections::{HashMap, HashSet, VecDeque};

/// Inverted group configuration: member name -> groups it directly belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMap {
    memberships: HashMap<String, HashSet<String>>,
}

impl GroupMap {
    /// Invert a parsed configuration
    pub fn from_config(config: &GroupConfig) -> Self {
        let mut memberships: HashMap<String, HashSet<String>> = HashMap::new();

        for (group, members) in config.iter() {
            for member in members {
                memberships
                    .entry(member.clone())
                    .or_default()
                    .insert(group.to_lowercase());
            }
        }

        Self { memberships }
    }

    /// Groups `member` belongs to directly
    pub fn direct_groups(&self, member: &str) -> Option<&HashSet<String>> {
        self.memberships.get(&member.to_lowercase())
    }

    /// Number of distinct members
    pub fn len(&self) -> usize {
        self.memberships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memberships.is_empty()
    }

    /// Transitive closure of `identity`, including `identity` itself.
    ///
    /// Every name in the result is lowercase.
    pub fn closure(&self, identity: &str) -> HashSet<String> {
        let mut visited = HashSet::new();
        let mut pending = VecDeque::from([identity.to_lowercase()]);

        while let Some(name) = pending.pop_front() {
            if visited.contains(&name) {
                continue;
            }

            if let Some(groups) = self.memberships.get(&name) {
                pending.extend(groups.iter().filter(|g| !visited.contains(*g)).cloned());
            }
            visited.insert(name);
        }

        visited
    }
}
