//! Batch admission: deduplication against the article cache and dispatch of
//! the residual work into the broker.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::broker::Broker;
use crate::data::ids;
use crate::data::models::{ArticleStatus, Job, TaskEnvelope};
use crate::data::urls;
use crate::db::DbContext;
use crate::error::Result;
use crate::events::JobUpdate;

/// One article in an incoming batch, already validated by the API surface.
#[derive(Debug, Clone)]
pub struct ArticleSpec {
    pub url: String,
    pub source: String,
    pub category: String,
    pub priority: i64,
}

/// Result of admitting one batch.
#[derive(Debug)]
pub struct Admission {
    pub job: Job,
    pub message: &'static str,
}

/// Processes one incoming batch into a job plus emitted tasks.
pub struct Admitter<'a> {
    db: &'a DbContext,
    broker: &'a Broker,
}

impl<'a> Admitter<'a> {
    pub fn new(db: &'a DbContext, broker: &'a Broker) -> Self {
        Self { db, broker }
    }

    /// Admit a batch: partition it into cached vs new work, create the job
    /// with its counters pre-accounted, and push one task per article that
    /// still needs scraping.
    ///
    /// Validation rejects duplicate raw URLs, but two distinct raw URLs may
    /// still normalize to the same key; such entries collapse onto the
    /// first occurrence, so each article is classified once and gets at
    /// most one task. Counters are per distinct article, which keeps
    /// `article_ids` and `total_articles` in agreement and lets the
    /// accounting converge.
    ///
    /// The progress event is emitted last, after the job row and all tasks
    /// are committed, so observers never see a counter that leads the
    /// store.
    pub async fn submit(&self, batch: Vec<ArticleSpec>) -> Result<Admission> {
        let articles = self.db.articles();
        let jobs = self.db.jobs();

        let normalized: Vec<String> = batch.iter().map(|spec| urls::normalize(&spec.url)).collect();
        let existing = articles.get_by_urls(&normalized).await?;

        let mut cached_count: i64 = 0;
        let mut to_scrape: Vec<(String, ArticleSpec)> = Vec::new();
        let mut article_ids: Vec<String> = Vec::new();
        let mut admitted: HashSet<&str> = HashSet::new();

        for (spec, url) in batch.into_iter().zip(&normalized) {
            if !admitted.insert(url) {
                debug!(url = %url, "batch entry collapsed onto an earlier normalized URL");
                continue;
            }

            // The create below races concurrent admissions of the same URL;
            // a unique-index conflict hands back the row that won, which is
            // then classified like any other existing record.
            let preexisting = existing.contains_key(url);
            let record = match existing.get(url) {
                Some(record) => record.clone(),
                None => {
                    articles
                        .create(url, &spec.source, &spec.category, spec.priority)
                        .await?
                }
            };

            if record.status == ArticleStatus::Scraped {
                articles.increment_reference(&record.id).await?;
                cached_count += 1;
            } else {
                if preexisting || record.status != ArticleStatus::Pending {
                    articles.reset_for_retry(&record.id).await?;
                }
                to_scrape.push((record.id.clone(), spec));
            }

            article_ids.push(record.id);
        }

        let total = article_ids.len() as i64;
        let new_count = to_scrape.len() as i64;
        let job = jobs
            .create(total, new_count, cached_count, article_ids)
            .await?;

        if new_count == 0 {
            // Everything came from cache; the job is born complete.
            let job = jobs.complete(&job.id).await?.unwrap_or(job);
            info!(job_id = %job.id, total, "job completed entirely from cache");
            self.broker.publish_update(JobUpdate::from_job(&job, None));
            return Ok(Admission {
                job,
                message: "Job completed - all articles from cache",
            });
        }

        for (article_id, spec) in to_scrape {
            let task = TaskEnvelope {
                task_id: ids::task_id(),
                job_id: job.id.clone(),
                article_id,
                url: spec.url,
                source: spec.source,
                category: spec.category,
                priority: spec.priority,
                retry_count: 0,
            };
            debug!(job_id = %job.id, task_id = %task.task_id, url = %task.url, "queueing task");
            self.broker.push(&task)?;
        }

        let job = jobs.set_in_progress(&job.id).await?.unwrap_or(job);
        info!(
            job_id = %job.id,
            total,
            new = new_count,
            cached = cached_count,
            "job admitted"
        );
        self.broker.publish_update(JobUpdate::from_job(&job, None));

        Ok(Admission {
            job,
            message: "Job submitted successfully",
        })
    }
}
