//! Group directory with memoized closures

use super::config::parse_group_config;
use super::graph::GroupMap;
use crate::cache::{memo_key, CacheConfig, Clock, MemoCache};
use crate::error::{PublError, Result};
use crate::types::User;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Where the user list comes from
#[derive(Debug, Clone)]
pub enum GroupSource {
    /// A user list file; a missing file is an empty list
    File(PathBuf),
    /// User list text held in memory
    Inline(String),
}

impl GroupSource {
    fn read(&self) -> Result<GroupMap> {
        let text = match self {
            Self::Inline(text) => text.clone(),
            Self::File(path) => match std::fs::read_to_string(path) {
                Ok(text) => text,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    info!("User list {} not found; no groups defined", path.display());
                    String::new()
                }
                Err(e) => {
                    return Err(PublError::Config(format!(
                        "Failed to read user list {}: {}",
                        path.display(),
                        e
                    )))
                }
            },
        };

        Ok(GroupMap::from_config(&parse_group_config(&text)?))
    }
}

/// A loaded user list, tagged with the reload that produced it
#[derive(Debug, Clone)]
struct Snapshot {
    generation: u64,
    map: Arc<GroupMap>,
}

/// Resolves the transitive group memberships of users.
///
/// The parsed mapping is held until [`GroupDirectory::reload`]; per-user
/// closures are memoized in a TTL cache keyed by reload generation and
/// identity string, so a closure computed against a replaced map is never
/// served again.
pub struct GroupDirectory {
    source: GroupSource,
    groups: RwLock<Snapshot>,
    closures: MemoCache<Arc<HashSet<String>>>,
}

impl GroupDirectory {
    /// Load the user list from `source`
    pub fn load(source: GroupSource, cache: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let groups = source.read()?;
        info!("Loaded user list with {} members", groups.len());

        Ok(Self {
            source,
            groups: RwLock::new(Snapshot {
                generation: 0,
                map: Arc::new(groups),
            }),
            closures: MemoCache::new(cache, clock),
        })
    }

    /// Re-read the user list and forget every memoized closure
    pub fn reload(&self) -> Result<()> {
        let groups = self.source.read()?;

        let generation = {
            let mut snapshot = self.groups.write().unwrap_or_else(PoisonError::into_inner);
            snapshot.generation += 1;
            snapshot.map = Arc::new(groups);
            snapshot.generation
        };
        self.closures.clear();

        info!("Reloaded user list (generation {})", generation);
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current member -> groups mapping
    pub fn group_map(&self) -> Arc<GroupMap> {
        self.snapshot().map
    }

    /// Transitive group memberships of `user`, including its own identity.
    ///
    /// The anonymous user belongs to no groups. Names are lowercase.
    pub fn groups_of(&self, user: Option<&User>) -> Arc<HashSet<String>> {
        let Some(user) = user else {
            return Arc::new(HashSet::new());
        };

        self.closure_in(&self.snapshot(), user)
    }

    fn closure_in(&self, snapshot: &Snapshot, user: &User) -> Arc<HashSet<String>> {
        let key = memo_key(&format!("groups@{}", snapshot.generation), Some(user));
        self.closures.get_or_insert_with(&key, || {
            let closure = snapshot.map.closure(user.name());
            debug!("Computed {} groups for {}", closure.len(), user);
            Arc::new(closure)
        })
    }

    /// Whether `user` is transitively a member of `group`, ignoring case
    pub fn is_member(&self, user: Option<&User>, group: &str) -> bool {
        self.groups_of(user).contains(&group.to_lowercase())
    }
}
