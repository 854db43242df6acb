//! User groups
//!
//! Loads the user list and computes transitive group membership.
//!
//! # Features
//!
//! - **Pure parsing**: user list text -> group/member mapping
//! - **Nested groups**: a group can be a member of another group
//! - **Cycle safe**: breadth-first closure with a visited set
//! - **Memoized closures**: per-identity TTL cache, cleared on reload
//!
//! # Example
//!
//! ```rust
//! use publ::cache::{CacheConfig, SystemClock};
//! use publ::groups::{GroupDirectory, GroupSource};
//! use publ::User;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = GroupSource::Inline("[staff]\nalice\n[admins]\nstaff\n".to_string());
//! let directory = GroupDirectory::load(source, CacheConfig::default(), Arc::new(SystemClock))?;
//!
//! let groups = directory.groups_of(Some(&User::new("alice")));
//! assert!(groups.contains("admins"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod directory;
pub mod graph;


pub use config::{parse_group_config, GroupConfig};
pub use directory::{GroupDirectory, GroupSource};
pub use graph::GroupMap;
