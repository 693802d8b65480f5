//! Football news relay binary.
//! `once` runs a single batch, `run` (default) loops on the configured interval.
//!
//! Exit status is non-zero only for run-level failures (bad config, storage
//! unreachable); individual publish failures are logged and counted.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use football_news_relay::config::{self, BotConfig};
use football_news_relay::dedup::{Deduplicator, SqliteDedupStore};
use football_news_relay::ingest::providers::rss::{RssFeed, DEFAULT_FETCH_TIMEOUT};
use football_news_relay::ingest::types::SourceFeed;
use football_news_relay::orchestrator::Orchestrator;
use football_news_relay::publish::{ConsolePublisher, Publisher, WebhookPublisher};
use football_news_relay::scheduler;
use football_news_relay::telemetry::Metrics;

/// Compact logs by default, JSON lines with `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn build_feeds(cfg: &BotConfig) -> Result<Vec<Box<dyn SourceFeed>>> {
    let mut feeds: Vec<Box<dyn SourceFeed>> = Vec::with_capacity(cfg.feeds.len());
    for f in &cfg.feeds {
        let feed = RssFeed::from_url(f.name.clone(), f.url.clone(), DEFAULT_FETCH_TIMEOUT)
            .with_context(|| format!("building feed `{}`", f.name))?;
        feeds.push(Box::new(feed));
    }
    if feeds.is_empty() {
        tracing::warn!("no feeds configured; runs will be empty");
    }
    Ok(feeds)
}

fn build_publisher(cfg: &BotConfig) -> Arc<dyn Publisher> {
    match &cfg.publish.webhook_url {
        Some(url) => Arc::new(WebhookPublisher::new(url.clone()).with_timeout(cfg.publish.timeout_secs)),
        None => {
            tracing::warn!("no webhook configured, posts go to the console");
            Arc::new(ConsolePublisher::new())
        }
    }
}

async fn serve_metrics(addr: &str) -> Result<()> {
    let metrics = Metrics::init()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding metrics listener on {addr}"))?;
    tracing::info!(%addr, "serving /metrics");
    let router = metrics.router();
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::warn!(error = %e, "metrics server stopped");
        }
    });
    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let command = std::env::args().nth(1).unwrap_or_else(|| "run".to_string());
    let cfg = config::load_default()?;

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        serve_metrics(&addr).await?;
    }

    let store = SqliteDedupStore::open(&cfg.dedup.db_path).context("opening dedup store")?;
    let dedup = Deduplicator::new(Arc::new(store))
        .with_content_window_days(cfg.dedup.content_recency_window_days);
    let feeds = build_feeds(&cfg)?;
    let mut orchestrator = Orchestrator::new(
        dedup,
        cfg.rate_gate(),
        build_publisher(&cfg),
        cfg.formatter(),
        cfg.orchestrator_cfg(),
    );
    let sched = cfg.scheduler_cfg();

    match command.as_str() {
        "once" => {
            let summary = scheduler::run_once(&feeds, &mut orchestrator, &sched.ingest).await?;
            println!(
                "seen={} published={} skipped_duplicate={} skipped_rate_limited={} failed={}",
                summary.seen,
                summary.published,
                summary.skipped_duplicate,
                summary.skipped_rate_limited,
                summary.failed
            );
        }
        "run" => {
            let (tx, rx) = watch::channel(false);
            tokio::spawn(async move {
                wait_for_shutdown().await;
                tracing::info!("shutdown requested; finishing current run");
                let _ = tx.send(true);
            });
            scheduler::run_loop(&feeds, &mut orchestrator, sched, rx).await?;
        }
        other => bail!("unknown command `{other}` (expected `once` or `run`)"),
    }

    Ok(())
}
