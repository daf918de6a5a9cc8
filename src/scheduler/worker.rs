//! Scrape worker: drains the broker in strict priority order and executes
//! one task at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time;
use tracing::{debug, error, info, trace, warn};

use crate::broker::Broker;
use crate::config::Config;
use crate::data::models::{ArticleStatus, JobStatus, Lane, TaskEnvelope};
use crate::db::DbContext;
use crate::error::Result;
use crate::events::JobUpdate;
use crate::scraper::Scraper;

/// Compute the retry delay `min(base * 2^n, max)`.
pub(crate) fn backoff_delay(retry_count: u32, base: Duration, max: Duration) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry_count)).min(max)
}

/// A single worker instance.
///
/// Each worker runs in its own asynchronous task, pulling from the broker's
/// lanes and processing one task to completion (including any retry
/// back-off sleep) before pulling the next.
pub struct Worker {
    id: usize, // For logging purposes
    db: DbContext,
    broker: Arc<Broker>,
    scraper: Arc<dyn Scraper>,
    config: Arc<Config>,
}

impl Worker {
    pub fn new(
        id: usize,
        db: DbContext,
        broker: Arc<Broker>,
        scraper: Arc<dyn Scraper>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            id,
            db,
            broker,
            scraper,
            config,
        }
    }

    /// Runs the worker's main loop until the shutdown signal arrives.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(worker_id = self.id, "worker started");
        loop {
            match self.broker.pull() {
                Some(task) => {
                    let task_id = task.task_id.clone();
                    if let Err(e) = self.process(task).await {
                        error!(worker_id = self.id, task_id = %task_id, error = ?e, "failed to process task");
                    }
                    // Drain one shutdown check between tasks so a busy queue
                    // cannot keep the worker alive past a shutdown signal.
                    match shutdown_rx.try_recv() {
                        Err(TryRecvError::Empty) => {}
                        _ => {
                            info!(worker_id = self.id, "worker shutting down");
                            break;
                        }
                    }
                }
                None => {
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            info!(worker_id = self.id, "worker shutting down");
                            break;
                        }
                        _ = time::sleep(self.config.consumer_poll_interval) => {
                            trace!(worker_id = self.id, "no tasks available");
                        }
                    }
                }
            }
        }
    }

    /// Process a single task to completion.
    ///
    /// A task whose job is gone or CANCELLED is discarded without touching
    /// the article or the job counters; the job reached its terminal
    /// counters before cancellation.
    pub async fn process(&self, task: TaskEnvelope) -> Result<()> {
        let job = self.db.jobs().get(&task.job_id).await?;
        match job {
            None => {
                debug!(worker_id = self.id, job_id = %task.job_id, "job gone, discarding task");
                return Ok(());
            }
            Some(job) if job.status == JobStatus::Cancelled => {
                info!(worker_id = self.id, job_id = %task.job_id, "job cancelled, discarding task");
                return Ok(());
            }
            Some(_) => {}
        }

        debug!(worker_id = self.id, url = %task.url, "scraping");
        self.db
            .articles()
            .set_status(&task.article_id, ArticleStatus::Scraping)
            .await?;

        let outcome = self.scraper.scrape(&task.url).await;

        match outcome.content.filter(|content| !content.is_empty()) {
            Some(content) if outcome.success => {
                let title = outcome.title.as_deref().unwrap_or("Unknown Title");
                self.handle_success(&task, title, &content).await
            }
            _ => {
                let error = outcome
                    .error
                    .unwrap_or_else(|| "Failed to extract article content".to_owned());
                self.handle_failure(task, error).await
            }
        }
    }

    async fn handle_success(&self, task: &TaskEnvelope, title: &str, content: &str) -> Result<()> {
        self.db
            .articles()
            .store_content(&task.article_id, title, content)
            .await?;

        if self.db.jobs().increment_completed(&task.job_id).await?.is_none() {
            warn!(worker_id = self.id, job_id = %task.job_id, "job vanished before accounting");
            return Ok(());
        }
        let job = self.db.jobs().check_completion(&task.job_id).await?;

        if let Some(job) = job {
            self.broker
                .publish_update(JobUpdate::from_job(&job, Some(task.article_id.clone())));
        }

        info!(worker_id = self.id, article_id = %task.article_id, "article scraped");
        Ok(())
    }

    async fn handle_failure(&self, task: TaskEnvelope, error: String) -> Result<()> {
        if task.retry_count < self.config.max_retry_attempts {
            let delay = backoff_delay(
                task.retry_count,
                self.config.retry_base_delay,
                self.config.retry_max_delay,
            );
            info!(
                worker_id = self.id,
                article_id = %task.article_id,
                attempt = task.retry_count + 1,
                delay = format!("{delay:.2?}"),
                error = %error,
                "scrape failed, retrying"
            );

            // The in-worker sleep is the back-pressure mechanism; there is
            // no delayed queue.
            time::sleep(delay).await;

            let retry = TaskEnvelope {
                retry_count: task.retry_count + 1,
                ..task
            };
            // Retries re-enter the high lane regardless of original
            // priority; a retry is already a stuck item.
            self.broker.push_lane(Lane::High, &retry)?;
            self.db.articles().reset_for_retry(&retry.article_id).await?;
            self.db.articles().increment_retry(&retry.article_id).await?;
            return Ok(());
        }

        error!(
            worker_id = self.id,
            article_id = %task.article_id,
            attempts = task.retry_count + 1,
            error = %error,
            "article failed permanently"
        );
        self.db.articles().mark_failed(&task.article_id, &error).await?;

        if self.db.jobs().increment_failed(&task.job_id).await?.is_none() {
            warn!(worker_id = self.id, job_id = %task.job_id, "job vanished before accounting");
            return Ok(());
        }
        let job = self.db.jobs().check_completion(&task.job_id).await?;

        if let Some(job) = job {
            self.broker
                .publish_update(JobUpdate::from_job(&job, Some(task.article_id.clone())));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(60);
        assert_eq!(backoff_delay(0, base, max), Duration::from_secs(1));
        assert_eq!(backoff_delay(1, base, max), Duration::from_secs(2));
        assert_eq!(backoff_delay(3, base, max), Duration::from_secs(8));
    }

    #[test]
    fn backoff_caps_at_max() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(60);
        assert_eq!(backoff_delay(10, base, max), max);
        assert_eq!(backoff_delay(u32::MAX, base, max), max);
    }
}
