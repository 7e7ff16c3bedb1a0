//! CLI entry point for bookrelay.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

use bookrelay::search::HttpCatalogBackend;
use bookrelay::store::{MemoryTitleStore, SqliteTitleStore, TitleStore};
use bookrelay::{Pipeline, RequestCtx, SearchOrchestrator, Settings};

mod cli;
mod console;

use cli::Args;
use console::ConsoleTransport;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let query = args.query.join(" ");

    let backend = HttpCatalogBackend::new(&args.catalog_url)?;
    let orchestrator = SearchOrchestrator::new(Arc::new(backend));

    let store: Arc<dyn TitleStore> = match &args.title_store {
        Some(path) => Arc::new(SqliteTitleStore::new(path).await?),
        None => Arc::new(MemoryTitleStore::new()),
    };

    let settings = Settings {
        auto_delete_delay: Duration::from_secs(args.auto_delete_secs),
        ..Settings::default()
    };

    let transport = Arc::new(ConsoleTransport::new(args.output_dir.clone(), args.quiet));
    let pipeline = Pipeline::new(
        Arc::clone(&transport) as Arc<dyn bookrelay::Transport>,
        orchestrator,
        store,
        settings,
        args.output_dir.join(".incoming"),
    )?;

    // The transport's command surface takes the query after the command
    // token; an empty query becomes the usage error there.
    let ctx = RequestCtx {
        user_id: 0,
        chat_id: 0,
    };
    pipeline
        .handle_search(&ctx, &format!("/search {query}"))
        .await?;

    if let Some(index) = args.select {
        let Some(action) = transport.download_action(index) else {
            info!(index, "no such result on the first page");
            return Ok(());
        };
        let Some(message) = transport.last_reply() else {
            return Ok(());
        };
        pipeline.handle_callback(&ctx, &message, &action).await?;
    }

    let evicted = pipeline.sessions().evict_expired();
    debug!(evicted, "session sweep complete");
    Ok(())
}
