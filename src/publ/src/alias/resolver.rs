//! Path alias resolution and maintenance

use super::disposition::{Disposition, Redirect};
use super::routes::{DefaultRoutes, NoPathRules, PathMatcher, UrlBuilder};
use super::{normalize_path, parse_alias_spec, AliasDestination};
use crate::auth::Authorizer;
use crate::cache::{CacheConfig, Clock, MemoCache, SystemClock};
use crate::error::Result;
use crate::store::Store;
use crate::types::{AliasTarget, AliasType, AliasUpdate, Entry, PathAlias, User};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Template name that means "no explicit template"
const INDEX_TEMPLATE: &str = "index";

fn lookup_key(path: &str) -> String {
    format!("alias/{}", path)
}

/// Resolves request paths through the alias table.
///
/// # Pipeline
///
/// 1. Normalize the path and look up its alias (memoized)
/// 2. Fall back to the path rules when there is no usable alias
/// 3. Refuse gated entries the user may not see
/// 4. Pick the category and template
/// 5. Redirect or render according to the alias type
pub struct AliasResolver {
    store: Arc<dyn Store>,
    authorizer: Arc<Authorizer>,
    matcher: Arc<dyn PathMatcher>,
    routes: Arc<dyn UrlBuilder>,
    clock: Arc<dyn Clock>,
    cache_config: CacheConfig,
    lookups: MemoCache<Option<PathAlias>>,
}

impl AliasResolver {
    /// Create a resolver with no path rules, the default routes and the wall clock
    pub fn new(store: Arc<dyn Store>, authorizer: Arc<Authorizer>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache_config = CacheConfig::default();

        Self {
            store,
            authorizer,
            matcher: Arc::new(NoPathRules),
            routes: Arc::new(DefaultRoutes),
            lookups: MemoCache::new(cache_config.clone(), clock.clone()),
            clock,
            cache_config,
        }
    }

    pub fn with_path_matcher(mut self, matcher: Arc<dyn PathMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_routes(mut self, routes: Arc<dyn UrlBuilder>) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.lookups = MemoCache::new(self.cache_config.clone(), clock.clone());
        self.clock = clock;
        self
    }

    pub fn with_cache_config(mut self, cache_config: CacheConfig) -> Self {
        self.lookups = MemoCache::new(cache_config.clone(), self.clock.clone());
        self.cache_config = cache_config;
        self
    }

    pub fn authorizer(&self) -> &Arc<Authorizer> {
        &self.authorizer
    }

    /// Resolve `path` for `user`. `Ok(None)` means not found.
    pub async fn get_alias(&self, path: &str, user: Option<&User>) -> Result<Option<Disposition>> {
        let path = normalize_path(path);

        let Some(record) = self.lookup(&path).await? else {
            debug!("No alias for {}", path);
            return Ok(self.test_path(&path));
        };

        let entry = match record.entry {
            Some(id) => match self.store.get_entry(id).await? {
                Some(entry) if entry.is_visible(self.clock.now()) => Some(entry),
                Some(_) => {
                    debug!("Alias {} points at non-visible entry {}", path, id);
                    return Ok(self.test_path(&path));
                }
                None => {
                    warn!("Alias {} points at missing entry {}", path, id);
                    return Ok(self.test_path(&path));
                }
            },
            None => None,
        };

        let category = match &record.category {
            Some(category) => match self.store.get_category(category).await? {
                Some(category) => category.path,
                None if category.is_empty() => String::new(),
                None => {
                    warn!("Alias {} points at missing category '{}'", path, category);
                    return Ok(self.test_path(&path));
                }
            },
            None => entry
                .as_ref()
                .map(|entry| entry.category.clone())
                .unwrap_or_default(),
        };

        if let Some(entry) = &entry {
            if entry.auth && !self.authorizer.is_authorized(user, entry) {
                debug!("Alias {} denied entry {} to {:?}", path, entry.id, user.map(User::name));
                return Ok(Some(Disposition::AuthFailed {
                    user: user.cloned(),
                    entry: entry.clone(),
                    category,
                }));
            }
        }

        let template = record
            .template
            .as_deref()
            .filter(|template| *template != INDEX_TEMPLATE);

        match record.alias_type {
            AliasType::Redirect => Ok(Some(Disposition::Response(self.redirect_for(
                &record,
                entry.as_ref(),
                &category,
                template,
            )))),
            AliasType::Render => Ok(Some(match entry {
                Some(entry) => Disposition::RenderEntry {
                    entry,
                    category,
                    template: template.map(str::to_string),
                },
                None => Disposition::RenderCategory {
                    category,
                    template: template.map(str::to_string),
                },
            })),
        }
    }

    /// Set a path alias.
    ///
    /// `alias` is the alias specification `path [template]`.
    pub async fn set_alias(
        &self,
        alias: &str,
        alias_type: AliasType,
        destination: AliasDestination,
    ) -> Result<PathAlias> {
        let (path, template) = parse_alias_spec(alias)?;

        let record = self
            .store
            .upsert_alias(AliasUpdate {
                path,
                alias_type,
                redirect_url: destination.redirect_url,
                template,
                entry: destination.entry,
                category: destination.category,
            })
            .await?;

        self.lookups.invalidate(&lookup_key(&record.path));
        info!("Set alias {} ({:?})", record.path, record.alias_type);
        Ok(record)
    }

    /// Remove a path alias
    pub async fn remove_alias(&self, path: &str) -> Result<()> {
        let path = normalize_path(path);
        let removed = self.store.delete_alias(&path).await?;

        self.lookups.invalidate(&lookup_key(&path));
        debug!("Removed {} alias(es) for {}", removed, path);
        Ok(())
    }

    /// Remove all aliases to a destination
    pub async fn remove_aliases(&self, target: &AliasTarget) -> Result<()> {
        let removed = self.store.delete_aliases(target).await?;

        self.lookups.clear();
        debug!("Removed {} alias(es) to {:?}", removed, target);
        Ok(())
    }

    async fn lookup(&self, path: &str) -> Result<Option<PathAlias>> {
        let key = lookup_key(path);
        if let Some(record) = self.lookups.get(&key) {
            return Ok(record);
        }

        let record = self.store.get_alias(path).await?;
        self.lookups.put(key, record.clone());
        Ok(record)
    }

    fn test_path(&self, path: &str) -> Option<Disposition> {
        let target = self.matcher.test_path(path)?;
        debug!("Path rule matched {} -> {}", path, target.url);

        Some(Disposition::Response(if target.permanent {
            Redirect::permanent(target.url)
        } else {
            Redirect::temporary(target.url)
        }))
    }

    fn redirect_for(
        &self,
        record: &PathAlias,
        entry: Option<&Entry>,
        category: &str,
        template: Option<&str>,
    ) -> Redirect {
        // an external URL only applies to aliases with no internal target
        if record.entry.is_none() && record.category.is_none() {
            if let Some(url) = &record.redirect_url {
                return Redirect::permanent(url.clone());
            }
        }

        match entry {
            Some(entry) if record.template.is_none() => match &entry.redirect_url {
                Some(url) => Redirect::permanent(url.clone()),
                None => Redirect::permanent(self.routes.entry_url(category, entry.id)),
            },
            _ => Redirect::permanent(self.routes.category_url(
                category,
                template,
                entry.map(|entry| entry.id),
            )),
        }
    }
}
