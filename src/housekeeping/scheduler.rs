//! Cron-like supervisor for the two retention jobs.
//!
//! Built on the `cron` crate (each job computes its own next-fire time);
//! no distributed lock (superseded by [`crate::cluster::NodeIdentity`]), no
//! priority queue, no retry bookkeeping — each job is a fire-and-forget
//! idempotent function and the only cross-cutting concerns are "don't
//! overlap yourself" and "check worker-zero on every cycle, not just at
//! startup".

use crate::cluster::NodeIdentity;
use crate::config::Config;
use crate::db::pool::DbPool;
use crate::housekeeping::worker;
use chrono::{DateTime, Local};
use cron::Schedule;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

const POLL_INTERVAL: Duration = Duration::from_secs(30);

struct ScheduledJob {
    name: &'static str,
    schedule: Schedule,
    next_run: Mutex<DateTime<Local>>,
    running: AtomicBool,
    run: Box<dyn Fn(DbPool, Config) -> futures::future::BoxFuture<'static, ()> + Send + Sync>,
}

impl ScheduledJob {
    fn new(
        name: &'static str,
        cron_expr: &str,
        run: impl Fn(DbPool, Config) -> futures::future::BoxFuture<'static, ()> + Send + Sync + 'static,
    ) -> Self {
        let schedule = Schedule::from_str(cron_expr).expect("static cron expression must be valid");
        let next_run = schedule.upcoming(Local).next().unwrap_or_else(Local::now);
        Self { name, schedule, next_run: Mutex::new(next_run), running: AtomicBool::new(false), run: Box::new(run) }
    }

    /// Fires the job if its schedule has elapsed and it isn't already
    /// running from a prior cycle.
    async fn poll(&self, pool: &DbPool, config: &Config) {
        let now = Local::now();
        let mut next_run = self.next_run.lock().await;
        if now < *next_run {
            return;
        }

        if self.running.swap(true, Ordering::AcqRel) {
            tracing::warn!(job = self.name, "previous run still in flight, skipping this cycle");
            *next_run = self.schedule.after(&now).next().unwrap_or(now + chrono::Duration::days(1));
            return;
        }

        *next_run = self.schedule.after(&now).next().unwrap_or(now + chrono::Duration::days(1));
        drop(next_run);

        let running = &self.running;
        let fut = (self.run)(pool.clone(), config.clone());
        let name = self.name;
        tokio::spawn(async move {
            fut.await;
            running.store(false, Ordering::Release);
            tracing::debug!(job = name, "finished");
        });
    }
}

pub struct Scheduler {
    node: NodeIdentity,
    jobs: Vec<ScheduledJob>,
}

impl Scheduler {
    pub fn new(node: NodeIdentity) -> Self {
        let jobs = vec![
            ScheduledJob::new("purge_old_logs", "0 0 2 * * *", |pool, config| {
                Box::pin(async move {
                    match worker::purge_old_logs(&pool, &config.retention, config.upstream.is_some()).await {
                        Ok(n) => tracing::info!(deleted = n, "purge_old_logs completed"),
                        Err(e) => tracing::error!(error = %e, "purge_old_logs failed"),
                    }
                })
            }),
            ScheduledJob::new("purge_inactive_websites", "0 0 3 * * *", |pool, config| {
                Box::pin(async move {
                    match worker::purge_inactive_websites(&pool, &config.retention).await {
                        Ok(n) => tracing::info!(deleted = n, "purge_inactive_websites completed"),
                        Err(e) => tracing::error!(error = %e, "purge_inactive_websites failed"),
                    }
                })
            }),
        ];

        Self { node, jobs }
    }

    /// Runs the poll loop until `shutdown` fires. The worker-zero check
    /// happens on every tick, not just at startup, since cluster membership
    /// may change underneath a long-lived process.
    pub async fn run(self: Arc<Self>, pool: DbPool, config: Config, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !self.node.is_worker_zero() {
                        continue;
                    }
                    for job in &self.jobs {
                        job.poll(&pool, &config).await;
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("housekeeping scheduler shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_cron_expressions_parse() {
        assert!(Schedule::from_str("0 0 2 * * *").is_ok());
        assert!(Schedule::from_str("0 0 3 * * *").is_ok());
    }
}
