//! A view that is itself the source of another view, under deferred writes.

mod common;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use common::{Backend, Store, BACKENDS, POSTS};
use denorm_core::strategy::computed;
use denorm_core::{Collection, ComputeError, Document, PostHook, Query, SyncSpec};
use denorm_engine::{DenormalizedViews, EngineConfig, WritePolicy};

const SHOUTS: &str = "SHOUTS";

struct Chain {
    views: Arc<DenormalizedViews>,
    posts: Arc<dyn Collection>,
    titles: Arc<dyn Collection>,
    shouts: Arc<dyn Collection>,
    _store: Store,
}

/// posts → titles (upper-cased title) → shouts (title with a bang).
async fn chained_views(
    backend: Backend,
    queue_capacity: usize,
    shout_hook: Option<Arc<dyn PostHook>>,
) -> Chain {
    let store = Store::open(backend).await;
    let posts = store.collection("posts");
    let titles = store.collection("titles");
    let shouts = store.collection("shouts");

    let mut config = EngineConfig::default();
    config.write.policy = WritePolicy::Deferred;
    config.write.queue_capacity = queue_capacity;
    let views = Arc::new(DenormalizedViews::from_config(&config));

    views
        .register(
            SyncSpec::builder(POSTS, posts.clone(), titles.clone())
                .sync("title", computed(|post, _| post.get_str("title").map(str::to_uppercase)))
                .build(),
        )
        .unwrap();

    let mut shout = SyncSpec::builder(SHOUTS, titles.clone(), shouts.clone())
        .sync("shout", computed(|row, _| row.get_str("title").map(|t| format!("{t}!"))));
    if let Some(hook) = shout_hook {
        shout = shout.post_hook(hook);
    }
    views.register(shout.build()).unwrap();

    Chain {
        views,
        posts,
        titles,
        shouts,
        _store: store,
    }
}

/// Fails the test instead of hanging it.
async fn within_deadline<F: Future>(work: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(30), work)
        .await
        .expect("deferred writes stalled")
}

async fn count(collection: &Arc<dyn Collection>) -> usize {
    collection.find(&Query::all()).await.unwrap().len()
}

impl Chain {
    async fn add_posts(&self, n: usize) {
        for i in 0..n {
            self.posts
                .insert(
                    Document::with_id(format!("P{i}")).with("title", format!("post {i}")),
                    None,
                )
                .await
                .unwrap();
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_chained_views_with_a_tiny_queue_do_not_stall() {
    for backend in BACKENDS {
        let chain = chained_views(backend, 2, None).await;

        within_deadline(async {
            chain.add_posts(200).await;
            chain.views.flush().await.unwrap();
        })
        .await;

        assert_eq!(count(&chain.shouts).await, 200, "{backend:?}");
        assert_eq!(
            chain.shouts.find_one("P7").await.unwrap().unwrap().get_str("shout"),
            Some("POST 7!")
        );
        assert_eq!(chain.views.scheduler().failed_jobs(), 0);
        within_deadline(chain.views.shutdown()).await;
    }
}

#[tokio::test]
async fn test_flush_waits_for_chained_writes() {
    for backend in BACKENDS {
        let chain = chained_views(backend, 16, None).await;

        within_deadline(async {
            chain.add_posts(500).await;
            chain.views.flush().await.unwrap();
        })
        .await;
        assert_eq!(count(&chain.titles).await, 500, "{backend:?}");
        assert_eq!(count(&chain.shouts).await, 500, "{backend:?}");

        // A rebuild right after a flush finds no chained write still queued.
        let written = within_deadline(chain.views.refresh_all(POSTS)).await.unwrap();
        assert_eq!(written, 500);
        within_deadline(chain.views.flush()).await.unwrap();
        let written = within_deadline(chain.views.refresh_all(SHOUTS)).await.unwrap();
        assert_eq!(written, 500);

        assert_eq!(count(&chain.shouts).await, 500, "{backend:?}");
        assert_eq!(chain.views.scheduler().failed_jobs(), 0, "{backend:?}");
        within_deadline(chain.views.shutdown()).await;
    }
}

/// Refreshes the first post it sees through the engine, once.
#[derive(Default)]
struct RefreshFromHook {
    views: OnceLock<Weak<DenormalizedViews>>,
    fired: AtomicBool,
}

#[async_trait]
impl PostHook for RefreshFromHook {
    async fn call(&self, doc: &Document, _user_id: Option<&str>) -> Result<(), ComputeError> {
        if self.fired.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let (Some(views), Some(id)) = (self.views.get().and_then(Weak::upgrade), doc.id()) else {
            return Ok(());
        };
        views
            .refresh_manually(POSTS, [id.to_string()])
            .await
            .map_err(ComputeError::new)?;
        Ok(())
    }
}

#[tokio::test]
async fn test_post_hook_can_refresh_while_writes_are_deferred() {
    let hook = Arc::new(RefreshFromHook::default());
    let shout_hook: Arc<dyn PostHook> = hook.clone();
    let chain = chained_views(Backend::Memory, 2, Some(shout_hook)).await;
    hook.views.set(Arc::downgrade(&chain.views)).unwrap();

    within_deadline(async {
        chain.add_posts(20).await;
        chain.views.flush().await.unwrap();
    })
    .await;

    assert!(hook.fired.load(Ordering::SeqCst));
    assert_eq!(count(&chain.shouts).await, 20);
    assert_eq!(chain.views.scheduler().failed_jobs(), 0);
    within_deadline(chain.views.shutdown()).await;
}
