//! # denorm
//!
//! Command-line entry point for the denormalized-views engine.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. parse args (clap)                                                   │
//! │  2. EngineConfig::load(--config)  defaults → file → DENORM_* env        │
//! │  3. tracing: RUST_LOG, else config.logging.filter                       │
//! │  4. open SQLite store (--db overrides config.storage.path)              │
//! │  5. DenormalizedViews::from_config (--policy overrides write.policy)    │
//! │  6. run command, flush deferred writes, shut down                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod blog;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use denorm_core::{Collection, Document, Query};
use denorm_db::{Database, DbConfig};
use denorm_engine::{DenormalizedViews, EngineConfig, WritePolicy};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::blog::{Blog, POSTS_VIEW};

#[derive(Debug, Parser)]
#[command(name = "denorm", version, about = "Denormalized views over a SQLite document store")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// View write policy: immediate | deferred
    #[arg(long, global = true)]
    policy: Option<WritePolicy>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Seed a small blog, rename an author and print the post view
    Demo,
    /// Rebuild the post view from the posts collection
    Rebuild,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = EngineConfig::load(cli.config.clone()).context("loading configuration")?;
    if let Some(path) = cli.db {
        config.storage.path = path;
    }
    if let Some(policy) = cli.policy {
        config.write.policy = policy;
    }

    init_tracing(&config.logging.filter);
    info!(
        db = %config.storage.path.display(),
        policy = %config.write.policy,
        "Starting denorm"
    );

    let db = Database::new(
        DbConfig::new(config.storage.path.clone()).max_connections(config.storage.max_connections),
    )
    .await
    .context("opening database")?;

    let views = DenormalizedViews::from_config(&config);
    let blog = Blog::open(&db);

    let result = match cli.command {
        Command::Demo => run_demo(&views, &blog).await,
        Command::Rebuild => run_rebuild(&views, &blog).await,
    };

    views.shutdown().await;
    db.close().await;
    result
}

/// Logs go to stderr so command output stays machine readable.
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_demo(views: &DenormalizedViews, blog: &Blog) -> anyhow::Result<()> {
    blog.clear().await?;
    blog.register(views)?;

    blog.authors
        .insert(Document::with_id("A1").with("name", "author 1"), None)
        .await?;
    blog.authors
        .insert(Document::with_id("A2").with("name", "author 2"), None)
        .await?;
    for (id, author, text) in [("P1", "A1", "post 1"), ("P2", "A2", "post 2"), ("P3", "A1", "post 3")] {
        blog.posts
            .insert(
                Document::with_id(id).with("authorId", author).with("text", text),
                Some("demo"),
            )
            .await?;
    }
    blog.comments
        .insert(
            Document::with_id("C1").with("postId", "P1").with("text", "first!"),
            Some("demo"),
        )
        .await?;

    blog.authors
        .update(
            "A1",
            Document::new().with("name", "author 1 NEW"),
            &[],
            false,
            Some("demo"),
        )
        .await?;
    views.flush().await?;

    for row in blog.posts_view.find(&Query::all()).await? {
        println!("{}", serde_json::to_string(&row)?);
    }
    Ok(())
}

async fn run_rebuild(views: &DenormalizedViews, blog: &Blog) -> anyhow::Result<()> {
    blog.register(views)?;
    let written = views.refresh_all(POSTS_VIEW).await?;
    println!("{written} view documents written");
    Ok(())
}
