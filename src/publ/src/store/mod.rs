//! Content index storage
//!
//! The index holds entries, categories, path aliases and a small key-value
//! table for the index's own bookkeeping. Alias mutations are applied
//! atomically: the in-memory store holds its write lock for the whole
//! mutation, the PostgreSQL store runs each one inside a transaction.

use crate::error::Result;
use crate::types::{AliasTarget, AliasUpdate, Category, Entry, EntryId, PathAlias};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

/// Schema version; bump this whenever an existing table changes
pub const SCHEMA_VERSION: i64 = 4;

/// Global key holding the schema version
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Key-value record for the index itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalValue {
    pub int_value: Option<i64>,
    pub str_value: Option<String>,
}

impl GlobalValue {
    pub fn int(value: i64) -> Self {
        Self {
            int_value: Some(value),
            str_value: None,
        }
    }
}

/// Outcome of [`Store::prepare_schema`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Stored version matched; nothing was touched
    Current,
    /// Every table was dropped and recreated
    Rebuilt { previous: Option<i64> },
}

/// Content store trait
#[async_trait]
pub trait Store: Send + Sync {
    /// Compare the stored schema version with `version`; on mismatch or when
    /// no version is recorded, drop and recreate every table and record
    /// `version`.
    async fn prepare_schema(&self, version: i64) -> Result<SchemaStatus>;

    async fn get_global(&self, key: &str) -> Result<Option<GlobalValue>>;

    async fn set_global(&self, key: &str, value: GlobalValue) -> Result<()>;

    async fn get_entry(&self, id: EntryId) -> Result<Option<Entry>>;

    /// Insert or replace an entry
    async fn put_entry(&self, entry: Entry) -> Result<()>;

    async fn get_category(&self, path: &str) -> Result<Option<Category>>;

    /// Insert or replace a category
    async fn put_category(&self, category: Category) -> Result<()>;

    /// Get the alias for an exact, already normalized path
    async fn get_alias(&self, path: &str) -> Result<Option<PathAlias>>;

    /// List every alias
    async fn list_aliases(&self) -> Result<Vec<PathAlias>>;

    /// Insert the alias, or merge into the existing record for its path
    async fn upsert_alias(&self, update: AliasUpdate) -> Result<PathAlias>;

    /// Delete the alias for an exact path; returns the number removed
    async fn delete_alias(&self, path: &str) -> Result<u64>;

    /// Delete every alias pointing at `target`; returns the number removed
    async fn delete_aliases(&self, target: &AliasTarget) -> Result<u64>;
}

#[derive(Debug, Default)]
struct Tables {
    globals: HashMap<String, GlobalValue>,
    entries: HashMap<EntryId, Entry>,
    categories: HashMap<String, Category>,
    aliases: HashMap<String, PathAlias>,
}

/// In-memory store implementation
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn prepare_schema(&self, version: i64) -> Result<SchemaStatus> {
        let mut tables = self.tables.write().await;

        let current = tables
            .globals
            .get(SCHEMA_VERSION_KEY)
            .and_then(|value| value.int_value);
        info!("Current schema version: {:?}", current);

        let status = if current == Some(version) {
            SchemaStatus::Current
        } else {
            info!("Updating database schema");
            *tables = Tables::default();
            SchemaStatus::Rebuilt { previous: current }
        };

        tables
            .globals
            .insert(SCHEMA_VERSION_KEY.to_string(), GlobalValue::int(version));
        Ok(status)
    }

    async fn get_global(&self, key: &str) -> Result<Option<GlobalValue>> {
        Ok(self.tables.read().await.globals.get(key).cloned())
    }

    async fn set_global(&self, key: &str, value: GlobalValue) -> Result<()> {
        self.tables
            .write()
            .await
            .globals
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get_entry(&self, id: EntryId) -> Result<Option<Entry>> {
        Ok(self.tables.read().await.entries.get(&id).cloned())
    }

    async fn put_entry(&self, entry: Entry) -> Result<()> {
        self.tables.write().await.entries.insert(entry.id, entry);
        Ok(())
    }

    async fn get_category(&self, path: &str) -> Result<Option<Category>> {
        Ok(self.tables.read().await.categories.get(path).cloned())
    }

    async fn put_category(&self, category: Category) -> Result<()> {
        self.tables
            .write()
            .await
            .categories
            .insert(category.path.clone(), category);
        Ok(())
    }

    async fn get_alias(&self, path: &str) -> Result<Option<PathAlias>> {
        Ok(self.tables.read().await.aliases.get(path).cloned())
    }

    async fn list_aliases(&self) -> Result<Vec<PathAlias>> {
        let tables = self.tables.read().await;
        let mut aliases: Vec<PathAlias> = tables.aliases.values().cloned().collect();
        aliases.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(aliases)
    }

    async fn upsert_alias(&self, update: AliasUpdate) -> Result<PathAlias> {
        let mut tables = self.tables.write().await;

        let existing = tables.aliases.remove(&update.path);
        let record = update.apply(existing);
        tables.aliases.insert(record.path.clone(), record.clone());

        Ok(record)
    }

    async fn delete_alias(&self, path: &str) -> Result<u64> {
        let removed = self.tables.write().await.aliases.remove(path);
        Ok(u64::from(removed.is_some()))
    }

    async fn delete_aliases(&self, target: &AliasTarget) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.aliases.len();

        tables.aliases.retain(|_, alias| match target {
            AliasTarget::Entry(id) => alias.entry != Some(*id),
            AliasTarget::Category(path) => alias.category.as_deref() != Some(path.as_str()),
        });

        Ok((before - tables.aliases.len()) as u64)
    }
}
