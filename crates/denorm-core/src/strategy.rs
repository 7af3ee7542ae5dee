//! # Strategy Interfaces
//!
//! Caller-supplied behavior is modeled as small capability traits instead of
//! bare callbacks, so a spec is type-checked when it is built.
//!
//! ## Strategies
//! ```text
//! ┌──────────────────┬───────────────────────────────┬────────────────────────┐
//! │ Trait            │ Input                         │ Output                 │
//! ├──────────────────┼───────────────────────────────┼────────────────────────┤
//! │ FieldComputer    │ working doc, user             │ FieldValue             │
//! │ DocFilter        │ source doc, user              │ JSON (false excludes)  │
//! │ PostHook         │ source doc, user              │ ()                     │
//! │ RefreshIds       │ related doc, previous, user   │ JSON (id list or null) │
//! └──────────────────┴───────────────────────────────┴────────────────────────┘
//! ```
//!
//! Filter and refresh-id results stay dynamic JSON on purpose: the engine
//! defines what happens for non-boolean filter results and rejects malformed
//! id lists, and those rules need something to inspect.
//!
//! ## Closures
//! ```rust
//! use denorm_core::strategy::{computed, filter_fn};
//!
//! let shout = computed(|post, _user| {
//!     post.get_str("text").map(|text| text.to_uppercase())
//! });
//! let published = filter_fn(|post, _user| post.get("published").cloned().unwrap_or_default());
//! # let _ = (shout, published);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::document::{Document, FieldValue};
use crate::error::ComputeError;

// =============================================================================
// Traits
// =============================================================================

/// Computes one view field from the working document.
#[async_trait]
pub trait FieldComputer: Send + Sync {
    async fn compute(&self, doc: &Document, user_id: Option<&str>)
        -> Result<FieldValue, ComputeError>;
}

/// Decides whether a source document belongs in the view.
///
/// Only a result of exactly `false` excludes the document.
#[async_trait]
pub trait DocFilter: Send + Sync {
    async fn evaluate(&self, doc: &Document, user_id: Option<&str>) -> Result<Value, ComputeError>;
}

/// Side effect run once per processed source change, after the view write.
#[async_trait]
pub trait PostHook: Send + Sync {
    async fn call(&self, doc: &Document, user_id: Option<&str>) -> Result<(), ComputeError>;
}

/// Maps a related-collection change to the source ids whose views are stale.
///
/// `previous` is only available on updates.
#[async_trait]
pub trait RefreshIds: Send + Sync {
    async fn resolve(
        &self,
        doc: &Document,
        previous: Option<&Document>,
        user_id: Option<&str>,
    ) -> Result<Value, ComputeError>;
}

// =============================================================================
// Closure Adapters
// =============================================================================

/// Synchronous field computer.
pub struct FnComputer<F>(F);

#[async_trait]
impl<F, R> FieldComputer for FnComputer<F>
where
    F: Fn(&Document, Option<&str>) -> R + Send + Sync,
    R: Into<FieldValue>,
{
    async fn compute(
        &self,
        doc: &Document,
        user_id: Option<&str>,
    ) -> Result<FieldValue, ComputeError> {
        Ok((self.0)(doc, user_id).into())
    }
}

/// Wraps a synchronous closure as a [`FieldComputer`].
pub fn computed<F, R>(f: F) -> Arc<dyn FieldComputer>
where
    F: Fn(&Document, Option<&str>) -> R + Send + Sync + 'static,
    R: Into<FieldValue> + 'static,
{
    Arc::new(FnComputer(f))
}

/// Asynchronous field computer over owned arguments.
pub struct AsyncFnComputer<F>(F);

#[async_trait]
impl<F> FieldComputer for AsyncFnComputer<F>
where
    F: Fn(Document, Option<String>) -> BoxFuture<'static, Result<FieldValue, ComputeError>>
        + Send
        + Sync,
{
    async fn compute(
        &self,
        doc: &Document,
        user_id: Option<&str>,
    ) -> Result<FieldValue, ComputeError> {
        (self.0)(doc.clone(), user_id.map(str::to_string)).await
    }
}

/// Wraps an async closure (e.g. one that reads another collection).
pub fn computed_async<F>(f: F) -> Arc<dyn FieldComputer>
where
    F: Fn(Document, Option<String>) -> BoxFuture<'static, Result<FieldValue, ComputeError>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(AsyncFnComputer(f))
}

pub struct FnFilter<F>(F);

#[async_trait]
impl<F, R> DocFilter for FnFilter<F>
where
    F: Fn(&Document, Option<&str>) -> R + Send + Sync,
    R: Into<Value>,
{
    async fn evaluate(&self, doc: &Document, user_id: Option<&str>) -> Result<Value, ComputeError> {
        Ok((self.0)(doc, user_id).into())
    }
}

/// Wraps a closure as a [`DocFilter`]; closures returning `bool` work directly.
pub fn filter_fn<F, R>(f: F) -> Arc<dyn DocFilter>
where
    F: Fn(&Document, Option<&str>) -> R + Send + Sync + 'static,
    R: Into<Value> + 'static,
{
    Arc::new(FnFilter(f))
}

pub struct FnPostHook<F>(F);

#[async_trait]
impl<F> PostHook for FnPostHook<F>
where
    F: Fn(&Document, Option<&str>) + Send + Sync,
{
    async fn call(&self, doc: &Document, user_id: Option<&str>) -> Result<(), ComputeError> {
        (self.0)(doc, user_id);
        Ok(())
    }
}

pub fn post_hook_fn<F>(f: F) -> Arc<dyn PostHook>
where
    F: Fn(&Document, Option<&str>) + Send + Sync + 'static,
{
    Arc::new(FnPostHook(f))
}

pub struct FnRefreshIds<F>(F);

#[async_trait]
impl<F, R> RefreshIds for FnRefreshIds<F>
where
    F: Fn(&Document, Option<&Document>, Option<&str>) -> R + Send + Sync,
    R: Into<Value>,
{
    async fn resolve(
        &self,
        doc: &Document,
        previous: Option<&Document>,
        user_id: Option<&str>,
    ) -> Result<Value, ComputeError> {
        Ok((self.0)(doc, previous, user_id).into())
    }
}

/// Wraps a synchronous closure as [`RefreshIds`]; `Vec<String>` and
/// `Option<Vec<String>>` results convert directly.
pub fn refresh_ids_fn<F, R>(f: F) -> Arc<dyn RefreshIds>
where
    F: Fn(&Document, Option<&Document>, Option<&str>) -> R + Send + Sync + 'static,
    R: Into<Value> + 'static,
{
    Arc::new(FnRefreshIds(f))
}

pub struct AsyncFnRefreshIds<F>(F);

#[async_trait]
impl<F> RefreshIds for AsyncFnRefreshIds<F>
where
    F: Fn(Document, Option<Document>, Option<String>) -> BoxFuture<'static, Result<Value, ComputeError>>
        + Send
        + Sync,
{
    async fn resolve(
        &self,
        doc: &Document,
        previous: Option<&Document>,
        user_id: Option<&str>,
    ) -> Result<Value, ComputeError> {
        (self.0)(doc.clone(), previous.cloned(), user_id.map(str::to_string)).await
    }
}

/// Wraps an async closure as [`RefreshIds`] (typically one that queries the
/// source collection).
pub fn refresh_ids_async<F>(f: F) -> Arc<dyn RefreshIds>
where
    F: Fn(Document, Option<Document>, Option<String>) -> BoxFuture<'static, Result<Value, ComputeError>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(AsyncFnRefreshIds(f))
}
