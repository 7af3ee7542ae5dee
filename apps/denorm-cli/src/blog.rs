//! The demonstration data set: authors, posts and comments, and a post view
//! embedding each post's author, its comments and a summary line.

use std::sync::Arc;

use denorm_core::strategy::{computed, computed_async, refresh_ids_async, refresh_ids_fn};
use denorm_core::{
    Collection, ComputeError, ConfigResult, DependencyBinding, Document, FieldValue, Query,
    SyncSpec,
};
use denorm_db::Database;
use denorm_engine::DenormalizedViews;
use futures::FutureExt;
use serde_json::{json, Value};

pub const POSTS_VIEW: &str = "POSTS_VIEW";

pub struct Blog {
    pub authors: Arc<dyn Collection>,
    pub posts: Arc<dyn Collection>,
    pub comments: Arc<dyn Collection>,
    pub posts_view: Arc<dyn Collection>,
}

impl Blog {
    pub fn open(db: &Database) -> Self {
        Blog {
            authors: db.collection("authors"),
            posts: db.collection("posts"),
            comments: db.collection("comments"),
            posts_view: db.collection("posts_view"),
        }
    }

    /// Registers the post view and its two dependencies.
    pub fn register(&self, views: &DenormalizedViews) -> ConfigResult<()> {
        let authors = self.authors.clone();
        let comments = self.comments.clone();
        views.register(
            SyncSpec::builder(POSTS_VIEW, self.posts.clone(), self.posts_view.clone())
                .sync(
                    "author",
                    computed_async(move |post, _| author_of(authors.clone(), post).boxed()),
                )
                .sync(
                    "comments",
                    computed_async(move |post, _| comments_of(comments.clone(), post).boxed()),
                )
                .post_sync("summary", computed(summary))
                .build(),
        )?;

        let posts = self.posts.clone();
        views.bind_dependency(DependencyBinding::new(
            POSTS_VIEW,
            self.authors.clone(),
            refresh_ids_async(move |author, _, _| posts_by_author(posts.clone(), author).boxed()),
        ))?;
        views.bind_dependency(
            DependencyBinding::new(POSTS_VIEW, self.comments.clone(), refresh_ids_fn(commented_posts))
                .tolerate_missing(),
        )?;
        Ok(())
    }

    /// Empties every collection. Call before `register`.
    pub async fn clear(&self) -> anyhow::Result<()> {
        for collection in [&self.authors, &self.posts, &self.comments, &self.posts_view] {
            collection.remove_all(None).await?;
        }
        Ok(())
    }
}

async fn author_of(authors: Arc<dyn Collection>, post: Document) -> Result<FieldValue, ComputeError> {
    match post.get_str("authorId") {
        Some(author_id) => Ok(authors.find_one(author_id).await?.into()),
        None => Ok(FieldValue::Absent),
    }
}

async fn comments_of(comments: Arc<dyn Collection>, post: Document) -> Result<FieldValue, ComputeError> {
    let Some(post_id) = post.id() else {
        return Ok(FieldValue::Absent);
    };
    let found = comments.find(&Query::eq("postId", post_id)).await?;
    Ok(FieldValue::present(Value::Array(
        found.into_iter().map(Value::from).collect(),
    )))
}

fn summary(post: &Document, _user_id: Option<&str>) -> Option<String> {
    let name = post
        .get("author")
        .and_then(|author| author.get("name"))
        .and_then(Value::as_str)?;
    let comments = post.get("comments").and_then(Value::as_array).map_or(0, Vec::len);
    Some(format!(
        "{} by {} ({} comments)",
        post.get_str("text")?,
        name,
        comments
    ))
}

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

fn commented_posts(comment: &Document, previous: Option<&Document>, _user_id: Option<&str>) -> Value {
    let ids: Vec<&str> = std::iter::once(comment)
        .chain(previous)
        .filter_map(|doc| doc.get_str("postId"))
        .collect();
    json!(ids)
}
