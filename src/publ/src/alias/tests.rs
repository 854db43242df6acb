//! Alias resolution tests

use super::*;
use crate::auth::Authorizer;
use crate::cache::{CacheConfig, Clock, ManualClock};
use crate::groups::{GroupDirectory, GroupSource};
use crate::store::{InMemoryStore, Store};
use crate::types::{AliasTarget, AliasType, Category, Entry, PublishStatus, User};
use chrono::{Duration as ChronoDuration, Utc};
use proptest::prelude::*;
use std::sync::Arc;

const USERS: &str = "\
[readers]
alice

[staff]
bob

[admins]
carol
";

fn authorizer(admin_group: Option<&str>) -> Arc<Authorizer> {
    let directory = GroupDirectory::load(
        GroupSource::Inline(USERS.to_string()),
        CacheConfig::default(),
        Arc::new(ManualClock::new(Utc::now())),
    )
    .unwrap();
    Arc::new(Authorizer::new(
        Arc::new(directory),
        admin_group.map(str::to_string),
    ))
}

fn resolver(store: &Arc<InMemoryStore>) -> AliasResolver {
    AliasResolver::new(store.clone(), authorizer(Some("admins")))
}

fn redirect_to(location: &str) -> Option<Disposition> {
    Some(Disposition::Response(Redirect::permanent(location)))
}

#[tokio::test]
async fn test_root_redirect_goes_to_category_endpoint() {
    let store = Arc::new(InMemoryStore::new());
    let resolver = resolver(&store);

    resolver
        .set_alias("/", AliasType::Redirect, AliasDestination::default())
        .await
        .unwrap();

    let disposition = resolver.get_alias("/", None).await.unwrap();
    assert_eq!(disposition, redirect_to("/"));
}

#[tokio::test]
async fn test_entry_redirect_url_takes_precedence() {
    let store = Arc::new(InMemoryStore::new());
    store
        .put_entry(Entry::new(42, "blog").with_redirect_url("/new-post"))
        .await
        .unwrap();
    let resolver = resolver(&store);

    resolver
        .set_alias("/old-post", AliasType::Redirect, AliasDestination::entry(42))
        .await
        .unwrap();

    let disposition = resolver.get_alias("/old-post", None).await.unwrap();
    assert_eq!(disposition, redirect_to("/new-post"));
}

#[tokio::test]
async fn test_entry_redirect_without_own_url() {
    let store = Arc::new(InMemoryStore::new());
    store.put_entry(Entry::new(42, "blog")).await.unwrap();
    let resolver = resolver(&store);

    resolver
        .set_alias("/old-post", AliasType::Redirect, AliasDestination::entry(42))
        .await
        .unwrap();

    let disposition = resolver.get_alias("old-post", None).await.unwrap();
    assert_eq!(disposition, redirect_to("/blog/42"));
}

#[tokio::test]
async fn test_templated_redirect_goes_to_category_with_entry() {
    let store = Arc::new(InMemoryStore::new());
    store
        .put_entry(Entry::new(42, "blog").with_redirect_url("/elsewhere"))
        .await
        .unwrap();
    let resolver = resolver(&store);

    resolver
        .set_alias("/feed.php rss", AliasType::Redirect, AliasDestination::entry(42))
        .await
        .unwrap();

    let disposition = resolver.get_alias("/feed.php", None).await.unwrap();
    assert_eq!(disposition, redirect_to("/blog/rss?id=42"));
}

#[tokio::test]
async fn test_gated_entry_denied_to_non_member() {
    let store = Arc::new(InMemoryStore::new());
    let secret = Entry::new(7, "private").with_auth_group("staff");
    store.put_entry(secret.clone()).await.unwrap();
    let resolver = resolver(&store);

    resolver
        .set_alias("/secret", AliasType::Redirect, AliasDestination::entry(7))
        .await
        .unwrap();

    let alice = User::new("alice");
    let disposition = resolver.get_alias("/secret", Some(&alice)).await.unwrap();
    assert_eq!(
        disposition,
        Some(Disposition::AuthFailed {
            user: Some(alice),
            entry: secret.clone(),
            category: "private".to_string(),
        })
    );

    let anonymous = resolver.get_alias("/secret", None).await.unwrap();
    assert!(matches!(
        anonymous,
        Some(Disposition::AuthFailed { user: None, .. })
    ));
}

#[tokio::test]
async fn test_gated_entry_allowed_to_member_and_admin() {
    let store = Arc::new(InMemoryStore::new());
    store
        .put_entry(Entry::new(7, "private").with_auth_group("staff"))
        .await
        .unwrap();
    let resolver = resolver(&store);

    resolver
        .set_alias("/secret", AliasType::Render, AliasDestination::entry(7))
        .await
        .unwrap();

    for name in ["bob", "carol"] {
        let user = User::new(name);
        let disposition = resolver.get_alias("/secret", Some(&user)).await.unwrap();
        assert!(
            matches!(disposition, Some(Disposition::RenderEntry { .. })),
            "{} should see the entry",
            name
        );
    }
}

#[tokio::test]
async fn test_admin_bypass_requires_configured_group() {
    let store = Arc::new(InMemoryStore::new());
    store
        .put_entry(Entry::new(7, "private").with_auth_group("staff"))
        .await
        .unwrap();
    let resolver = AliasResolver::new(store.clone(), authorizer(None));

    resolver
        .set_alias("/secret", AliasType::Render, AliasDestination::entry(7))
        .await
        .unwrap();

    let carol = User::new("carol");
    let disposition = resolver.get_alias("/secret", Some(&carol)).await.unwrap();
    assert!(matches!(disposition, Some(Disposition::AuthFailed { .. })));
}

#[tokio::test]
async fn test_denial_hides_redirect_target() {
    let store = Arc::new(InMemoryStore::new());
    store
        .put_entry(
            Entry::new(7, "private")
                .with_auth_group("staff")
                .with_redirect_url("https://example.com/hidden"),
        )
        .await
        .unwrap();
    let resolver = resolver(&store);

    resolver
        .set_alias("/secret", AliasType::Redirect, AliasDestination::entry(7))
        .await
        .unwrap();

    let disposition = resolver.get_alias("/secret", None).await.unwrap();
    assert!(!matches!(disposition, Some(Disposition::Response(_))));
}

#[tokio::test]
async fn test_alias_spec_with_template() {
    let store = Arc::new(InMemoryStore::new());
    store.put_category(Category::new("photos")).await.unwrap();
    let resolver = resolver(&store);

    let record = resolver
        .set_alias(
            "/gallery some_template",
            AliasType::Render,
            AliasDestination::category("photos"),
        )
        .await
        .unwrap();
    assert_eq!(record.path, "/gallery");
    assert_eq!(record.template.as_deref(), Some("some_template"));

    let disposition = resolver.get_alias("/gallery", None).await.unwrap();
    assert_eq!(
        disposition,
        Some(Disposition::RenderCategory {
            category: "photos".to_string(),
            template: Some("some_template".to_string()),
        })
    );
}

#[tokio::test]
async fn test_index_template_collapses() {
    let store = Arc::new(InMemoryStore::new());
    store.put_entry(Entry::new(3, "blog")).await.unwrap();
    let resolver = resolver(&store);

    resolver
        .set_alias("/post index", AliasType::Render, AliasDestination::entry(3))
        .await
        .unwrap();
    resolver
        .set_alias("/home index", AliasType::Redirect, AliasDestination::category(""))
        .await
        .unwrap();

    match resolver.get_alias("/post", None).await.unwrap() {
        Some(Disposition::RenderEntry { template, category, .. }) => {
            assert_eq!(template, None);
            assert_eq!(category, "blog");
        }
        other => panic!("unexpected disposition {:?}", other),
    }
    assert_eq!(resolver.get_alias("/home", None).await.unwrap(), redirect_to("/"));
}

#[tokio::test]
async fn test_alias_category_overrides_entry_category() {
    let store = Arc::new(InMemoryStore::new());
    store.put_entry(Entry::new(3, "blog")).await.unwrap();
    store.put_category(Category::new("archive")).await.unwrap();
    let resolver = resolver(&store);

    resolver
        .set_alias(
            "/archived-post",
            AliasType::Render,
            AliasDestination {
                entry: Some(3),
                category: Some("archive".to_string()),
                redirect_url: None,
            },
        )
        .await
        .unwrap();

    match resolver.get_alias("/archived-post", None).await.unwrap() {
        Some(Disposition::RenderEntry { entry, category, .. }) => {
            assert_eq!(entry.id, 3);
            assert_eq!(category, "archive");
        }
        other => panic!("unexpected disposition {:?}", other),
    }
}

#[tokio::test]
async fn test_external_url_alias() {
    let store = Arc::new(InMemoryStore::new());
    let resolver = resolver(&store);

    resolver
        .set_alias(
            "/mastodon",
            AliasType::Redirect,
            AliasDestination::url("https://mastodon.example/@me"),
        )
        .await
        .unwrap();

    let disposition = resolver.get_alias("/mastodon", None).await.unwrap();
    assert_eq!(disposition, redirect_to("https://mastodon.example/@me"));
}

#[tokio::test]
async fn test_url_alias_repointed_at_entry() {
    let store = Arc::new(InMemoryStore::new());
    store.put_entry(Entry::new(42, "blog")).await.unwrap();
    let resolver = resolver(&store);

    resolver
        .set_alias("/x", AliasType::Redirect, AliasDestination::url("https://old.example/"))
        .await
        .unwrap();
    let record = resolver
        .set_alias("/x", AliasType::Redirect, AliasDestination::entry(42))
        .await
        .unwrap();

    // the merged record still remembers the old URL
    assert_eq!(record.redirect_url.as_deref(), Some("https://old.example/"));
    assert_eq!(resolver.get_alias("/x", None).await.unwrap(), redirect_to("/blog/42"));
}

#[tokio::test]
async fn test_unknown_path_uses_path_rules() {
    let store = Arc::new(InMemoryStore::new());
    let mut matcher = RegexPathMatcher::new();
    matcher.add_rule(r"/blog/(\d+)\.html", "/blog/$1", true).unwrap();
    matcher.add_rule("/tmp/", "/", false).unwrap();
    let resolver = resolver(&store).with_path_matcher(Arc::new(matcher));

    assert_eq!(
        resolver.get_alias("/blog/12.html", None).await.unwrap(),
        redirect_to("/blog/12")
    );
    assert_eq!(
        resolver.get_alias("/tmp/x", None).await.unwrap(),
        Some(Disposition::Response(Redirect::temporary("/")))
    );
    assert_eq!(resolver.get_alias("/nothing", None).await.unwrap(), None);
}

#[tokio::test]
async fn test_invisible_entry_behaves_like_missing_alias() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let release = clock.now() + ChronoDuration::hours(1);

    store
        .put_entry(Entry::new(1, "blog").with_status(PublishStatus::Draft))
        .await
        .unwrap();
    store
        .put_entry(
            Entry::new(2, "blog")
                .with_status(PublishStatus::Scheduled)
                .with_date(release),
        )
        .await
        .unwrap();

    let mut matcher = RegexPathMatcher::new();
    matcher.add_rule("/scheduled", "/fallback", false).unwrap();
    let resolver = resolver(&store)
        .with_clock(clock.clone())
        .with_path_matcher(Arc::new(matcher));

    resolver
        .set_alias("/draft", AliasType::Render, AliasDestination::entry(1))
        .await
        .unwrap();
    resolver
        .set_alias("/scheduled", AliasType::Render, AliasDestination::entry(2))
        .await
        .unwrap();

    assert_eq!(resolver.get_alias("/draft", None).await.unwrap(), None);
    assert_eq!(
        resolver.get_alias("/scheduled", None).await.unwrap(),
        Some(Disposition::Response(Redirect::temporary("/fallback")))
    );

    clock.advance(std::time::Duration::from_secs(2 * 3600));
    assert!(matches!(
        resolver.get_alias("/scheduled", None).await.unwrap(),
        Some(Disposition::RenderEntry { .. })
    ));
}

#[tokio::test]
async fn test_dangling_references_fall_through() {
    let store = Arc::new(InMemoryStore::new());
    let resolver = resolver(&store);

    resolver
        .set_alias("/gone", AliasType::Render, AliasDestination::entry(99))
        .await
        .unwrap();
    resolver
        .set_alias("/nowhere", AliasType::Render, AliasDestination::category("missing"))
        .await
        .unwrap();

    assert_eq!(resolver.get_alias("/gone", None).await.unwrap(), None);
    assert_eq!(resolver.get_alias("/nowhere", None).await.unwrap(), None);
}

#[tokio::test]
async fn test_set_alias_updates_in_place() {
    let store = Arc::new(InMemoryStore::new());
    store.put_entry(Entry::new(1, "blog")).await.unwrap();
    store.put_entry(Entry::new(2, "blog")).await.unwrap();
    let resolver = resolver(&store);

    resolver
        .set_alias("/latest", AliasType::Render, AliasDestination::entry(1))
        .await
        .unwrap();
    assert!(resolver.get_alias("/latest", None).await.unwrap().is_some());

    // the memoized record is replaced, not served stale
    resolver
        .set_alias("/latest", AliasType::Render, AliasDestination::entry(2))
        .await
        .unwrap();

    match resolver.get_alias("/latest", None).await.unwrap() {
        Some(Disposition::RenderEntry { entry, .. }) => assert_eq!(entry.id, 2),
        other => panic!("unexpected disposition {:?}", other),
    }
    assert_eq!(store.list_aliases().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_remove_alias() {
    let store = Arc::new(InMemoryStore::new());
    let resolver = resolver(&store);

    resolver
        .set_alias("/caf%C3%A9", AliasType::Redirect, AliasDestination::default())
        .await
        .unwrap();
    assert!(resolver.get_alias("/café", None).await.unwrap().is_some());

    resolver.remove_alias("café").await.unwrap();
    assert_eq!(resolver.get_alias("/café", None).await.unwrap(), None);

    // removing again is a no-op
    resolver.remove_alias("/café").await.unwrap();
}

#[tokio::test]
async fn test_remove_aliases_by_target() {
    let store = Arc::new(InMemoryStore::new());
    store.put_entry(Entry::new(5, "blog")).await.unwrap();
    store.put_category(Category::new("blog")).await.unwrap();
    let resolver = resolver(&store);

    for path in ["/a", "/b"] {
        resolver
            .set_alias(path, AliasType::Render, AliasDestination::entry(5))
            .await
            .unwrap();
        assert!(resolver.get_alias(path, None).await.unwrap().is_some());
    }
    resolver
        .set_alias("/c", AliasType::Render, AliasDestination::category("blog"))
        .await
        .unwrap();

    resolver.remove_aliases(&AliasTarget::Entry(5)).await.unwrap();

    assert_eq!(resolver.get_alias("/a", None).await.unwrap(), None);
    assert_eq!(resolver.get_alias("/b", None).await.unwrap(), None);
    assert!(resolver.get_alias("/c", None).await.unwrap().is_some());
}

#[tokio::test]
async fn test_extra_spec_tokens_are_ignored() {
    let store = Arc::new(InMemoryStore::new());
    let resolver = resolver(&store);

    let record = resolver
        .set_alias("/gallery tmpl extra", AliasType::Render, AliasDestination::category(""))
        .await
        .unwrap();
    assert_eq!(record.path, "/gallery");
    assert_eq!(record.template.as_deref(), Some("tmpl"));
}

#[tokio::test]
async fn test_empty_alias_spec_is_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let resolver = resolver(&store);

    let result = resolver
        .set_alias("   ", AliasType::Redirect, AliasDestination::default())
        .await;
    assert!(result.is_err());
    assert!(store.list_aliases().await.unwrap().is_empty());
}

#[test]
fn test_parse_alias_spec() {
    assert_eq!(
        parse_alias_spec("gallery  some_template").unwrap(),
        ("/gallery".to_string(), Some("some_template".to_string()))
    );
    assert_eq!(parse_alias_spec("/x").unwrap(), ("/x".to_string(), None));
    assert!(parse_alias_spec("").is_err());
    assert_eq!(
        parse_alias_spec("/x a b c").unwrap(),
        ("/x".to_string(), Some("a".to_string()))
    );
}

#[test]
fn test_normalize_path() {
    assert_eq!(normalize_path(""), "/");
    assert_eq!(normalize_path("about"), "/about");
    assert_eq!(normalize_path("/my%20page"), "/my page");
    assert_eq!(normalize_path("%2Fencoded"), "//encoded");
    assert_eq!(normalize_path("/%2Fencoded"), "//encoded");
}

proptest! {
    #[test]
    fn normalized_paths_start_with_slash(path in ".*") {
        prop_assert!(normalize_path(&path).starts_with('/'));
    }

    #[test]
    fn unreserved_paths_are_stable(path in "/[a-zA-Z0-9/_.~-]*") {
        prop_assert_eq!(normalize_path(&path), path.clone());
        prop_assert_eq!(normalize_path(&normalize_path(&path)), path);
    }
}
