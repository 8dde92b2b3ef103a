//! logvault — centralized log aggregation server.
//!
//! Boot sequence: load config, connect the DB pool, run pending migrations
//! (worker-zero only, unless disabled), warm the lookup caches, then serve
//! the HTTP surface while the sync worker and housekeeping scheduler run as
//! sibling tasks on the same runtime.

use logvault::api::{build_router, AppState};
use logvault::cache::{LookupCaches, WebsiteCache};
use logvault::cluster::NodeIdentity;
use logvault::config::Config;
use logvault::db::{migrations, DbPool};
use logvault::housekeeping::Scheduler;
use logvault::ingest::IngestService;
use logvault::ratelimit::RateLimiter;
use logvault::sync::SyncWorker;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("logvault=info".parse()?))
        .json()
        .init();

    let config = Config::from_env()?;
    tracing::info!(?config, version = logvault::VERSION, "starting logvault");

    let pool = DbPool::connect(&config.db).await?;
    let node = NodeIdentity::from_config(&config);

    if node.is_worker_zero() && !config.auto_run_migrations_disabled {
        tracing::info!("applying pending migrations");
        migrations::run(&pool).await?;
    }

    let lookups = LookupCaches::new();
    lookups.warm(&pool).await?;

    let websites = Arc::new(WebsiteCache::new());
    websites.warm(&pool).await?;

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
    let ingest = IngestService::new(pool.clone(), lookups.clone(), websites.clone());

    let state = Arc::new(AppState {
        pool: pool.clone(),
        config: config.clone(),
        ingest,
        websites: websites.clone(),
        lookups: lookups.clone(),
        rate_limiter,
        started_at: Instant::now(),
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    if let Some(upstream) = config.upstream.clone() {
        let source_instance = hostname_or_fallback();
        let worker = SyncWorker::new(pool.clone(), upstream, node, source_instance);
        tokio::spawn(worker.run(shutdown_rx.clone()));
    }

    let scheduler = Arc::new(Scheduler::new(node));
    tokio::spawn(scheduler.run(pool.clone(), config.clone(), shutdown_rx.clone()));

    let addr: SocketAddr = format!("{}:{}", config.listen.host, config.listen.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    let app = build_router(state);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    Ok(())
}

fn hostname_or_fallback() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-instance".to_string())
}

/// Waits for SIGINT/SIGTERM, then flips the shutdown watch channel so the
/// sync worker and housekeeping scheduler can stop their loops before the
/// process exits.
async fn shutdown_signal(shutdown_tx: tokio::sync::watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining in-flight requests");
    let _ = shutdown_tx.send(true);
}
