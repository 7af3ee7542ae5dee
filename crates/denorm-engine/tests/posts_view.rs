//! End-to-end propagation over the blog fixture, on both stores.

mod common;

use common::{Blog, BACKENDS, POSTS};
use denorm_core::{Collection, Document, SyncError};
use denorm_engine::WritePolicy;
use serde_json::json;

#[tokio::test]
async fn test_author_rename_reaches_the_post_view() {
    for backend in BACKENDS {
        let blog = Blog::open(backend, WritePolicy::Immediate).await;
        blog.add_author("A1", "author 1").await;
        blog.add_post("P1", "A1", "post 1").await;

        assert_eq!(
            blog.whole_text("P1").await.as_deref(),
            Some("post 1, author 1"),
            "{backend:?}"
        );

        blog.authors
            .update("A1", Document::new().with("name", "author 1 NEW"), &[], false, None)
            .await
            .unwrap();

        assert_eq!(
            blog.whole_text("P1").await.as_deref(),
            Some("post 1, author 1 NEW"),
            "{backend:?}"
        );
        let row = blog.view_row("P1").await.unwrap();
        assert_eq!(row.get("authorCache"), Some(&json!({ "_id": "A1", "name": "author 1 NEW" })));
        // Insert plus nothing else on the source; the rename refreshed once.
        assert_eq!(blog.hook_calls(), 2, "{backend:?}");
    }
}

#[tokio::test]
async fn test_only_resolved_ids_are_refreshed() {
    for backend in BACKENDS {
        let blog = Blog::open(backend, WritePolicy::Immediate).await;
        blog.add_author("A1", "one").await;
        blog.add_author("A2", "two").await;
        blog.add_post("P1", "A1", "first").await;
        blog.add_post("P2", "A1", "second").await;
        blog.add_post("P3", "A2", "third").await;

        blog.authors
            .update("A1", Document::new().with("name", "uno"), &[], false, None)
            .await
            .unwrap();

        assert_eq!(blog.whole_text("P1").await.as_deref(), Some("first, uno"));
        assert_eq!(blog.whole_text("P2").await.as_deref(), Some("second, uno"));
        assert_eq!(blog.whole_text("P3").await.as_deref(), Some("third, two"));
        assert_eq!(blog.hook_calls(), 5, "{backend:?}");
    }
}

#[tokio::test]
async fn test_comments_follow_their_post() {
    for backend in BACKENDS {
        let blog = Blog::open(backend, WritePolicy::Immediate).await;
        blog.add_author("A1", "author 1").await;
        blog.add_post("P1", "A1", "post 1").await;
        blog.add_post("P2", "A1", "post 2").await;

        blog.comments
            .insert(Document::with_id("C1").with("postId", "P1").with("text", "hi"), None)
            .await
            .unwrap();
        let comments = blog.view_row("P1").await.unwrap().get("comments").cloned();
        assert_eq!(
            comments,
            Some(json!([{ "_id": "C1", "postId": "P1", "text": "hi" }])),
            "{backend:?}"
        );

        // Moving the comment refreshes the old and the new post.
        blog.comments
            .update("C1", Document::new().with("postId", "P2"), &[], false, None)
            .await
            .unwrap();
        assert_eq!(blog.view_row("P1").await.unwrap().get("comments"), Some(&json!([])));
        assert_eq!(
            blog.view_row("P2").await.unwrap().get("comments"),
            Some(&json!([{ "_id": "C1", "postId": "P2", "text": "hi" }]))
        );

        blog.comments.remove("C1", None).await.unwrap();
        assert_eq!(blog.view_row("P2").await.unwrap().get("comments"), Some(&json!([])));
    }
}

#[tokio::test]
async fn test_comment_on_removed_post_is_tolerated() {
    for backend in BACKENDS {
        let blog = Blog::open(backend, WritePolicy::Immediate).await;
        blog.add_post("P1", "A1", "post 1").await;
        blog.comments
            .insert(Document::with_id("C1").with("postId", "P1"), None)
            .await
            .unwrap();

        blog.posts.remove("P1", None).await.unwrap();
        assert!(blog.view_row("P1").await.is_none());

        // The comments binding skips the missing post instead of failing.
        blog.comments.remove("C1", None).await.unwrap();
        assert!(blog.view_row("P1").await.is_none(), "{backend:?}");
    }
}

#[tokio::test]
async fn test_missing_author_leaves_fields_absent() {
    for backend in BACKENDS {
        let blog = Blog::open(backend, WritePolicy::Immediate).await;
        blog.add_post("P1", "A9", "orphan").await;

        let row = blog.view_row("P1").await.unwrap();
        assert!(!row.contains("authorCache"), "{backend:?}");
        assert!(!row.contains("wholeText"));
        assert_eq!(row.get("comments"), Some(&json!([])));

        // The author shows up later through the dependency.
        blog.add_author("A9", "late").await;
        assert_eq!(blog.whole_text("P1").await.as_deref(), Some("orphan, late"));

        // And goes away again: the computed fields are unset, not stale.
        blog.authors.remove("A9", None).await.unwrap();
        let row = blog.view_row("P1").await.unwrap();
        assert!(!row.contains("authorCache"), "{backend:?}");
        assert!(!row.contains("wholeText"));
    }
}

#[tokio::test]
async fn test_refresh_all_is_idempotent() {
    for backend in BACKENDS {
        let blog = Blog::open(backend, WritePolicy::Immediate).await;
        blog.add_author("A1", "author 1").await;
        for (id, text) in [("P2", "b"), ("P1", "a"), ("P3", "c")] {
            blog.add_post(id, "A1", text).await;
        }
        let hooks_before = blog.hook_calls();

        // Drift the view by hand.
        blog.posts_view.remove("P2", None).await.unwrap();
        blog.posts_view
            .update("P1", Document::new().with("wholeText", "stale"), &[], false, None)
            .await
            .unwrap();

        assert_eq!(blog.views.refresh_all(POSTS).await.unwrap(), 3);
        let first = blog.view_snapshot().await;
        assert_eq!(blog.views.refresh_all(POSTS).await.unwrap(), 3);
        let second = blog.view_snapshot().await;

        assert_eq!(first, second, "{backend:?}");
        assert_eq!(blog.whole_text("P1").await.as_deref(), Some("a, author 1"));
        assert_eq!(blog.whole_text("P2").await.as_deref(), Some("b, author 1"));
        assert_eq!(blog.hook_calls(), hooks_before);
    }
}

#[tokio::test]
async fn test_refresh_manually() {
    for backend in BACKENDS {
        let blog = Blog::open(backend, WritePolicy::Immediate).await;
        blog.add_author("A1", "author 1").await;
        blog.add_post("P1", "A1", "post 1").await;
        blog.posts_view.remove("P1", None).await.unwrap();

        assert_eq!(blog.views.refresh_manually(POSTS, ["P1"]).await.unwrap(), 1);
        assert_eq!(blog.whole_text("P1").await.as_deref(), Some("post 1, author 1"));

        let err = blog
            .views
            .refresh_manually(POSTS, ["P1", "P404"])
            .await
            .unwrap_err();
        assert!(
            matches!(err, SyncError::MissingSourceDocument { ref id, .. } if id == "P404"),
            "{backend:?}"
        );
    }
}

#[tokio::test]
async fn test_lookup() {
    let blog = Blog::open(common::Backend::Memory, WritePolicy::Immediate).await;
    let spec = blog.views.lookup(POSTS).unwrap();
    assert_eq!(spec.view().name(), "posts_view");
    assert_eq!(
        spec.computed_fields().collect::<Vec<_>>(),
        vec!["authorCache", "comments", "wholeText"]
    );
    assert_eq!(blog.views.registry().bindings_for(POSTS).len(), 2);
    assert!(blog.views.lookup("NOPE").is_none());
}
