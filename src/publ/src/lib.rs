//! # Publ
//!
//! Path resolution and entry authorization for a content publishing engine.
//!
//! ## Features
//!
//! - **Path aliases** resolved to redirects, entry renders or category renders
//! - **Group closure** over a nested user/group configuration
//! - **Per-entry gating** with an optional admin group bypass
//! - **TTL memoization** of group closures and alias lookups
//! - **Async store** with in-memory and PostgreSQL backends
//! - **Signed bearer tokens** for identities
//!
//! ## Example
//!
//! ```rust
//! use publ::alias::{AliasDestination, AliasResolver, Disposition};
//! use publ::auth::Authorizer;
//! use publ::cache::{CacheConfig, SystemClock};
//! use publ::groups::{GroupDirectory, GroupSource};
//! use publ::store::{InMemoryStore, Store};
//! use publ::{AliasType, Entry, User};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryStore::new());
//!     store.put_entry(Entry::new(7, "private").with_auth_group("staff")).await?;
//!
//!     let groups = GroupDirectory::load(
//!         GroupSource::Inline("[staff]\nalice\n".to_string()),
//!         CacheConfig::default(),
//!         Arc::new(SystemClock),
//!     )?;
//!     let authorizer = Arc::new(Authorizer::new(Arc::new(groups), None));
//!
//!     let resolver = AliasResolver::new(store, authorizer);
//!     resolver
//!         .set_alias("/secret", AliasType::Render, AliasDestination::entry(7))
//!         .await?;
//!
//!     let alice = User::new("alice");
//!     let disposition = resolver.get_alias("/secret", Some(&alice)).await?;
//!     assert!(matches!(disposition, Some(Disposition::RenderEntry { .. })));
//!
//!     Ok(())
//! }
//! ```

pub mod alias;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod groups;
pub mod store;
pub mod tokens;
pub mod types;

// Re-export commonly used types
pub use alias::{AliasDestination, AliasResolver, Disposition, Redirect, RedirectStatus};
pub use auth::{AccessPartition, Authorizer};
pub use cache::{CacheConfig, Clock, MemoCache, SystemClock};
pub use config::PublConfig;
pub use error::{PublError, Result, TokenError};
pub use groups::{GroupDirectory, GroupSource};
pub use store::{InMemoryStore, Store, SCHEMA_VERSION};
pub use tokens::{TokenClaims, TokenSigner};
pub use types::{
    AliasTarget, AliasType, AliasUpdate, Category, Entry, EntryId, PathAlias, PublishStatus, User,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
