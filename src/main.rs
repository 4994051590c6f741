//! Stackhouse binary — thin CLI shell over the `stackhouse` library crate.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use stackhouse::config::Config;
use stackhouse::error::DEV_MODE;
use stackhouse::http::{build_router, AppContext};
use stackhouse::indexer;
use stackhouse::metadata::{GoogleBooksLookup, MetadataLookup, NullLookup};
use stackhouse::scheduler;
use stackhouse::store::Store;

/// Self-hosted media server for personal ebook and comic libraries.
#[derive(Parser)]
#[command(name = "stackhouse", version, about, long_about = None)]
struct Cli {
    /// Directory of static web client assets to serve (SPA fallback). When
    /// omitted, no static client is mounted and only the JSON API is served.
    #[arg(long)]
    static_assets: Option<std::path::PathBuf>,

    /// Enable verbose error detail in API responses. Overrides `DEV_MODE`.
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stackhouse=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    DEV_MODE.store(cli.dev || config.dev_mode, Ordering::Relaxed);

    let store = match Store::open(&config.database_path) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to open store");
            std::process::exit(1);
        }
    };

    let metadata_lookup: Box<dyn MetadataLookup> = match &config.google_books_api_key {
        Some(key) => Box::new(GoogleBooksLookup::new(
            reqwest::Client::builder()
                .user_agent(
                    config
                        .external_metadata_user_agent
                        .clone()
                        .unwrap_or_else(|| "stackhouse/metadata".to_string()),
                )
                .build()
                .expect("build reqwest client"),
            Some(key.clone()),
        )),
        None => Box::new(NullLookup),
    };

    let library_directories = config.library_directories.clone();
    let scan_interval = config.scan_interval;
    let cleanup_interval = config.cleanup_interval;
    let archive_retention = config.archive_retention;
    let port = config.port;

    let ctx = Arc::new(AppContext { store, config, metadata_lookup });

    let shutdown = CancellationToken::new();

    {
        let ctx = ctx.clone();
        let roots = library_directories.clone();
        scheduler::spawn_periodic("index-scan", scan_interval, shutdown.clone(), move || {
            let ctx = ctx.clone();
            let roots = roots.clone();
            async move {
                indexer::scan(&ctx.store, &roots, ctx.metadata_lookup.as_ref()).await;
            }
        });
    }

    {
        let ctx = ctx.clone();
        scheduler::spawn_periodic("archive-reconciliation", cleanup_interval, shutdown.clone(), move || {
            let ctx = ctx.clone();
            async move {
                let result =
                    tokio::task::block_in_place(|| indexer::reconcile::run(&ctx.store, archive_retention));
                if let Err(e) = result {
                    tracing::warn!(error = %e, "archive reconciliation failed");
                }
            }
        });
    }

    let app = build_router(ctx, cli.static_assets.as_deref());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .unwrap_or_else(|e| panic!("failed to bind port {port}: {e}"));
    info!(port, "stackhouse listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(scheduler::shutdown_signal(shutdown))
        .await
        .unwrap();
}
