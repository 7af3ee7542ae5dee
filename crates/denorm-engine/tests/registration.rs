//! Configuration errors raised by `register` and `bind_dependency`.

use std::sync::Arc;

use denorm_core::strategy::{computed, refresh_ids_fn};
use denorm_core::{Collection, ConfigError, DependencyBinding, SyncSpec};
use denorm_db::MemoryCollection;
use denorm_engine::{DenormalizedViews, WritePolicy};
use serde_json::json;

fn spec(identifier: &str, source: &Arc<MemoryCollection>, view: &Arc<MemoryCollection>) -> SyncSpec {
    SyncSpec::builder(identifier, source.clone(), view.clone())
        .sync("n", computed(|_, _| Some(1)))
        .build()
}

fn no_ids() -> Arc<dyn denorm_core::RefreshIds> {
    refresh_ids_fn(|_, _, _| json!([]))
}

#[test]
fn test_register_errors() {
    let views = DenormalizedViews::new(WritePolicy::Immediate);
    let posts = MemoryCollection::shared("posts");
    let posts_view = MemoryCollection::shared("posts_view");
    let other_view = MemoryCollection::shared("other_view");

    views.register(spec("POSTS", &posts, &posts_view)).unwrap();

    assert!(matches!(
        views.register(spec("POSTS", &posts, &other_view)),
        Err(ConfigError::DuplicateIdentifier(ref id)) if id == "POSTS"
    ));
    assert!(matches!(
        views.register(spec("SELF", &posts, &posts)),
        Err(ConfigError::SourceEqualsTarget(_))
    ));
    assert!(matches!(
        views.register(SyncSpec::builder("EMPTY", posts.clone(), other_view.clone()).build()),
        Err(ConfigError::EmptySyncMap(_))
    ));
    assert!(matches!(
        views.register(spec("AGAIN", &posts, &posts_view)),
        Err(ConfigError::DuplicateSourceTargetPair { .. })
    ));
    assert!(matches!(
        views.register(
            SyncSpec::builder("BAD_FIELD", posts.clone(), other_view.clone())
                .sync("_id", computed(|_, _| Some("x")))
                .build()
        ),
        Err(ConfigError::InvalidFieldName { .. })
    ));

    // Rejected specs are not stored and install no listener.
    assert_eq!(views.registry().identifiers(), vec!["POSTS"]);
}

#[test]
fn test_same_name_counts_as_same_collection() {
    let views = DenormalizedViews::new(WritePolicy::Immediate);
    let posts = MemoryCollection::shared("posts");
    let alias = MemoryCollection::shared("posts");
    assert!(matches!(
        views.register(spec("ALIAS", &posts, &alias)),
        Err(ConfigError::SourceEqualsTarget(_))
    ));
}

#[test]
fn test_bind_dependency_errors() {
    let views = DenormalizedViews::new(WritePolicy::Immediate);
    let posts = MemoryCollection::shared("posts");
    let posts_view = MemoryCollection::shared("posts_view");
    let authors = MemoryCollection::shared("authors");

    assert!(matches!(
        views.bind_dependency(DependencyBinding::new("POSTS", authors.clone(), no_ids())),
        Err(ConfigError::UnknownIdentifier(_))
    ));

    views.register(spec("POSTS", &posts, &posts_view)).unwrap();

    for related in [posts.clone(), posts_view.clone()] {
        assert!(matches!(
            views.bind_dependency(DependencyBinding::new("POSTS", related, no_ids())),
            Err(ConfigError::RelatedCollectionIsSourceOrTarget { .. })
        ));
    }

    let binding = views
        .bind_dependency(DependencyBinding::new("POSTS", authors.clone(), no_ids()))
        .unwrap();
    assert_eq!(binding.related().name(), "authors");
    assert_eq!(views.registry().bindings_for("POSTS").len(), 1);
}
