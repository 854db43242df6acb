//! Entry authorization

use crate::groups::GroupDirectory;
use crate::types::{Entry, User};
use std::sync::Arc;
use tracing::debug;

/// Decides whether users may see gated entries
pub struct Authorizer {
    directory: Arc<GroupDirectory>,

    /// Members of this group may see every entry
    admin_group: Option<String>,
}

impl Authorizer {
    pub fn new(directory: Arc<GroupDirectory>, admin_group: Option<String>) -> Self {
        Self {
            directory,
            admin_group,
        }
    }

    pub fn directory(&self) -> &Arc<GroupDirectory> {
        &self.directory
    }

    /// Whether `user` belongs to the configured admin group
    pub fn is_admin(&self, user: Option<&User>) -> bool {
        match &self.admin_group {
            Some(group) => self.directory.is_member(user, group),
            None => false,
        }
    }

    /// Whether `user` may see `entry`.
    ///
    /// Ungated entries are visible to everyone, including the anonymous user.
    /// Admins pass every gate regardless of the entry's group.
    pub fn is_authorized(&self, user: Option<&User>, entry: &Entry) -> bool {
        if !entry.auth {
            return true;
        }

        if self.is_admin(user) {
            debug!("Admin access to entry {}", entry.id);
            return true;
        }

        match &entry.auth_group {
            Some(group) => self.directory.is_member(user, group),
            None => false,
        }
    }

    /// Split entries into those `user` may and may not see
    pub fn partition<I>(&self, user: Option<&User>, entries: I) -> AccessPartition
    where
        I: IntoIterator<Item = Entry>,
    {
        let mut partition = AccessPartition::default();

        for entry in entries {
            if self.is_authorized(user, &entry) {
                partition.authorized.push(entry);
            } else {
                partition.unauthorized.push(entry);
            }
        }

        // an anonymous visitor could see more after logging in
        partition.needs_auth = user.is_none() && !partition.unauthorized.is_empty();
        partition
    }
}

/// Result of [`Authorizer::partition`]
#[derive(Debug, Clone, Default)]
pub struct AccessPartition {
    pub authorized: Vec<Entry>,
    pub unauthorized: Vec<Entry>,

    /// Set when an anonymous user was denied something
    pub needs_auth: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, SystemClock};
    use crate::groups::GroupSource;

    fn authorizer(text: &str, admin_group: Option<&str>) -> Authorizer {
        let directory = GroupDirectory::load(
            GroupSource::Inline(text.to_string()),
            CacheConfig::default(),
            Arc::new(SystemClock),
        )
        .unwrap();
        Authorizer::new(Arc::new(directory), admin_group.map(str::to_string))
    }

    const USERS: &str = "[staff]\nalice\n[readers]\nbob\n[admin]\nroot\n";

    #[test]
    fn test_ungated_entry_is_public() {
        let auth = authorizer(USERS, Some("admin"));
        let entry = Entry::new(1, "blog");

        assert!(auth.is_authorized(None, &entry));
        assert!(auth.is_authorized(Some(&User::new("bob")), &entry));
    }

    #[test]
    fn test_gated_entry_requires_group() {
        let auth = authorizer(USERS, Some("admin"));
        let entry = Entry::new(7, "blog").with_auth_group("staff");

        assert!(auth.is_authorized(Some(&User::new("alice")), &entry));
        assert!(!auth.is_authorized(Some(&User::new("bob")), &entry));
        assert!(!auth.is_authorized(None, &entry));
    }

    #[test]
    fn test_admin_bypasses_every_gate() {
        let auth = authorizer(USERS, Some("admin"));
        let root = User::new("root");

        assert!(auth.is_admin(Some(&root)));
        assert!(auth.is_authorized(Some(&root), &Entry::new(7, "blog").with_auth_group("staff")));
        assert!(auth.is_authorized(Some(&root), &Entry::new(8, "blog").with_auth_group("nobody")));
    }

    #[test]
    fn test_no_admin_group_means_no_admins() {
        let auth = authorizer(USERS, None);
        let root = User::new("root");

        assert!(!auth.is_admin(Some(&root)));
        assert!(!auth.is_authorized(Some(&root), &Entry::new(7, "blog").with_auth_group("staff")));
    }

    #[test]
    fn test_gate_without_group_is_admin_only() {
        let auth = authorizer(USERS, Some("admin"));
        let mut entry = Entry::new(9, "blog");
        entry.auth = true;

        assert!(!auth.is_authorized(Some(&User::new("alice")), &entry));
        assert!(auth.is_authorized(Some(&User::new("root")), &entry));
    }

    #[test]
    fn test_partition_flags_anonymous_denials() {
        let auth = authorizer(USERS, Some("admin"));
        let entries = vec![
            Entry::new(1, "blog"),
            Entry::new(2, "blog").with_auth_group("staff"),
        ];

        let anonymous = auth.partition(None, entries.clone());
        assert_eq!(anonymous.authorized.len(), 1);
        assert_eq!(anonymous.unauthorized.len(), 1);
        assert!(anonymous.needs_auth);

        let bob = auth.partition(Some(&User::new("bob")), entries);
        assert_eq!(bob.unauthorized.len(), 1);
        assert!(!bob.needs_auth);
    }
}
