//! Shared fixtures: a blog with authors, posts and comments, and a
//! `posts_view` that embeds each post's author and comments.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use denorm_core::strategy::{computed, computed_async, post_hook_fn, refresh_ids_async, refresh_ids_fn};
use denorm_core::{
    Collection, ComputeError, DependencyBinding, Document, FieldValue, Query, SyncSpec,
};
use denorm_db::{Database, DbConfig, MemoryCollection};
use denorm_engine::{DenormalizedViews, WritePolicy};
use futures::FutureExt;
use serde_json::{json, Value};

pub const POSTS: &str = "POSTS";

#[derive(Debug, Clone, Copy)]
pub enum Backend {
    Memory,
    Sqlite,
}

pub const BACKENDS: [Backend; 2] = [Backend::Memory, Backend::Sqlite];

/// Hands out collections for one backend.
///
/// Memory collections are created on every call, so ask for each name once.
pub struct Store {
    db: Option<Database>,
}

impl Store {
    pub async fn open(backend: Backend) -> Self {
        match backend {
            Backend::Memory => Store { db: None },
            Backend::Sqlite => Store {
                db: Some(Database::new(DbConfig::in_memory()).await.unwrap()),
            },
        }
    }

    pub fn collection(&self, name: &str) -> Arc<dyn Collection> {
        match &self.db {
            Some(db) => {
                let collection: Arc<dyn Collection> = db.collection(name);
                collection
            }
            None => {
                let collection: Arc<dyn Collection> = MemoryCollection::shared(name);
                collection
            }
        }
    }
}

// =============================================================================
// Field computers
// =============================================================================

async fn author_cache(authors: Arc<dyn Collection>, post: Document) -> Result<FieldValue, ComputeError> {
    let Some(author_id) = post.get_str("authorId") else {
        return Ok(FieldValue::Absent);
    };
    let author = authors.find_one(author_id).await?;
    Ok(FieldValue::from(author))
}

async fn post_comments(comments: Arc<dyn Collection>, post: Document) -> Result<FieldValue, ComputeError> {
    let Some(post_id) = post.id() else {
        return Ok(FieldValue::Absent);
    };
    let found = comments.find(&Query::eq("postId", post_id)).await?;
    Ok(FieldValue::present(Value::Array(
        found.into_iter().map(Value::from).collect(),
    )))
}

pub fn whole_text(post: &Document, _user_id: Option<&str>) -> Option<String> {
    let author = post
        .get("authorCache")
        .and_then(|author| author.get("name"))
        .and_then(Value::as_str)?;
    Some(format!("{}, {}", post.get_str("text")?, author))
}

// =============================================================================
// Refresh id resolvers
// =============================================================================

async fn posts_by_author(posts: Arc<dyn Collection>, author: Document) -> Result<Value, ComputeError> {
    let Some(author_id) = author.id() else {
        return Ok(Value::Null);
    };
    let ids: Vec<String> = posts
        .find(&Query::eq("authorId", author_id))
        .await?
        .iter()
        .filter_map(|post| post.id().map(str::to_string))
        .collect();
    Ok(json!(ids))
}

/// A comment moved between posts refreshes both.
fn comment_post_ids(comment: &Document, previous: Option<&Document>, _user_id: Option<&str>) -> Value {
    let ids: Vec<String> = std::iter::once(comment)
        .chain(previous)
        .filter_map(|doc| doc.get_str("postId").map(str::to_string))
        .collect();
    json!(ids)
}

// =============================================================================
// Blog fixture
// =============================================================================

pub struct Blog {
    pub views: DenormalizedViews,
    pub authors: Arc<dyn Collection>,
    pub posts: Arc<dyn Collection>,
    pub comments: Arc<dyn Collection>,
    pub posts_view: Arc<dyn Collection>,
    pub hook_calls: Arc<AtomicUsize>,
    pub store: Store,
}

impl Blog {
    pub async fn open(backend: Backend, policy: WritePolicy) -> Self {
        let store = Store::open(backend).await;
        let authors = store.collection("authors");
        let posts = store.collection("posts");
        let comments = store.collection("comments");
        let posts_view = store.collection("posts_view");
        let hook_calls = Arc::new(AtomicUsize::new(0));

        let views = DenormalizedViews::new(policy);

        let authors_for_sync = authors.clone();
        let comments_for_sync = comments.clone();
        let calls = hook_calls.clone();
        views
            .register(
                SyncSpec::builder(POSTS, posts.clone(), posts_view.clone())
                    .sync(
                        "authorCache",
                        computed_async(move |post, _| author_cache(authors_for_sync.clone(), post).boxed()),
                    )
                    .sync(
                        "comments",
                        computed_async(move |post, _| post_comments(comments_for_sync.clone(), post).boxed()),
                    )
                    .post_sync("wholeText", computed(whole_text))
                    .post_hook(post_hook_fn(move |_, _| {
                        calls.fetch_add(1, Ordering::SeqCst);
                    }))
                    .build(),
            )
            .unwrap();

        let posts_for_refresh = posts.clone();
        views
            .bind_dependency(DependencyBinding::new(
                POSTS,
                authors.clone(),
                refresh_ids_async(move |author, _, _| posts_by_author(posts_for_refresh.clone(), author).boxed()),
            ))
            .unwrap();
        views
            .bind_dependency(
                DependencyBinding::new(POSTS, comments.clone(), refresh_ids_fn(comment_post_ids))
                    .tolerate_missing(),
            )
            .unwrap();

        Blog {
            views,
            authors,
            posts,
            comments,
            posts_view,
            hook_calls,
            store,
        }
    }

    pub fn hook_calls(&self) -> usize {
        self.hook_calls.load(Ordering::SeqCst)
    }

    pub async fn add_author(&self, id: &str, name: &str) {
        self.authors
            .insert(Document::with_id(id).with("name", name), None)
            .await
            .unwrap();
    }

    pub async fn add_post(&self, id: &str, author_id: &str, text: &str) {
        self.posts
            .insert(
                Document::with_id(id).with("authorId", author_id).with("text", text),
                None,
            )
            .await
            .unwrap();
    }

    pub async fn view_row(&self, id: &str) -> Option<Document> {
        self.posts_view.find_one(id).await.unwrap()
    }

    pub async fn whole_text(&self, id: &str) -> Option<String> {
        self.view_row(id)
            .await
            .and_then(|row| row.get_str("wholeText").map(str::to_string))
    }

    /// The whole view serialized, for byte-level comparisons.
    pub async fn view_snapshot(&self) -> String {
        let rows = self.posts_view.find(&Query::all()).await.unwrap();
        serde_json::to_string(&rows).unwrap()
    }
}
