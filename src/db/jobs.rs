//! Job store repository.
//!
//! Counter increments are single atomic `UPDATE ... RETURNING` statements,
//! so concurrent workers need no mutual exclusion. Terminal transitions are
//! guarded compare-and-set updates: they succeed at most once, and a late
//! worker can never overwrite CANCELLED with COMPLETED.

use chrono::Utc;
use sqlx::types::Json;

use crate::data::ids;
use crate::data::models::{Job, JobStatus};
use crate::db::DbContext;
use crate::error::Result;

/// Guard clause shared by every terminal transition.
const NON_TERMINAL: &str = "status IN ('PENDING', 'IN_PROGRESS')";

/// Job store operations.
pub struct JobOps<'a> {
    ctx: &'a DbContext,
}

impl<'a> JobOps<'a> {
    pub(crate) fn new(ctx: &'a DbContext) -> Self {
        Self { ctx }
    }

    /// Create a PENDING job with counters initialized from admission.
    ///
    /// Cached articles count as already completed, so `completed_count`
    /// starts at `cached_articles`.
    pub async fn create(
        &self,
        total_articles: i64,
        new_articles: i64,
        cached_articles: i64,
        article_ids: Vec<String>,
    ) -> Result<Job> {
        let now = Utc::now();
        let job = sqlx::query_as::<_, Job>(
            "INSERT INTO jobs (id, status, total_articles, new_articles, cached_articles, \
             completed_count, failed_count, article_ids, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?) \
             RETURNING *",
        )
        .bind(ids::job_id())
        .bind(JobStatus::Pending)
        .bind(total_articles)
        .bind(new_articles)
        .bind(cached_articles)
        .bind(cached_articles)
        .bind(Json(article_ids))
        .bind(now)
        .bind(now)
        .fetch_one(self.ctx.pool())
        .await?;
        Ok(job)
    }

    pub async fn get(&self, job_id: &str) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(self.ctx.pool())
            .await?;
        Ok(job)
    }

    /// Non-terminal status update (PENDING → IN_PROGRESS).
    pub async fn set_in_progress(&self, job_id: &str) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            "UPDATE jobs SET status = ?, updated_at = ? WHERE id = ? AND status = 'PENDING' \
             RETURNING *",
        )
        .bind(JobStatus::InProgress)
        .bind(Utc::now())
        .bind(job_id)
        .fetch_optional(self.ctx.pool())
        .await?;
        Ok(job)
    }

    /// One-shot COMPLETED transition. Returns `None` if the job was already
    /// terminal.
    pub async fn complete(&self, job_id: &str) -> Result<Option<Job>> {
        self.terminal_transition(job_id, JobStatus::Completed).await
    }

    /// One-shot FAILED transition.
    pub async fn fail(&self, job_id: &str) -> Result<Option<Job>> {
        self.terminal_transition(job_id, JobStatus::Failed).await
    }

    /// One-shot CANCELLED transition. Returns `None` if the job was already
    /// terminal (cancel of a cancelled job is a no-op).
    pub async fn cancel(&self, job_id: &str) -> Result<Option<Job>> {
        self.terminal_transition(job_id, JobStatus::Cancelled).await
    }

    async fn terminal_transition(&self, job_id: &str, status: JobStatus) -> Result<Option<Job>> {
        let now = Utc::now();
        let job = sqlx::query_as::<_, Job>(&format!(
            "UPDATE jobs SET status = ?, updated_at = ?, completed_at = ? \
             WHERE id = ? AND {NON_TERMINAL} \
             RETURNING *",
        ))
        .bind(status)
        .bind(now)
        .bind(now)
        .bind(job_id)
        .fetch_optional(self.ctx.pool())
        .await?;
        Ok(job)
    }

    /// Atomically bump `completed_count`, returning the updated job.
    ///
    /// Counters keep updating after cancellation (idempotent observability);
    /// only the status itself is protected by the terminal guard.
    pub async fn increment_completed(&self, job_id: &str) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            "UPDATE jobs SET completed_count = completed_count + 1, updated_at = ? WHERE id = ? \
             RETURNING *",
        )
        .bind(Utc::now())
        .bind(job_id)
        .fetch_optional(self.ctx.pool())
        .await?;
        Ok(job)
    }

    /// Atomically bump `failed_count`, returning the updated job.
    pub async fn increment_failed(&self, job_id: &str) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            "UPDATE jobs SET failed_count = failed_count + 1, updated_at = ? WHERE id = ? \
             RETURNING *",
        )
        .bind(Utc::now())
        .bind(job_id)
        .fetch_optional(self.ctx.pool())
        .await?;
        Ok(job)
    }

    /// Run the convergence check after a counter increment.
    ///
    /// When every article is accounted for, the job converges to FAILED if
    /// nothing succeeded, otherwise COMPLETED (partial failure is still
    /// COMPLETED; clients inspect `failed_count`). A job still making
    /// progress is nudged from PENDING to IN_PROGRESS. All transitions are
    /// guarded, so a CANCELLED job is never flipped.
    pub async fn check_completion(&self, job_id: &str) -> Result<Option<Job>> {
        let Some(job) = self.get(job_id).await? else {
            return Ok(None);
        };

        let processed = job.completed_count + job.failed_count;
        if processed >= job.total_articles {
            let transitioned = if job.completed_count == 0 && job.failed_count > 0 {
                self.fail(job_id).await?
            } else {
                self.complete(job_id).await?
            };
            // Guard lost means the job was already terminal; report that row.
            return match transitioned {
                Some(job) => Ok(Some(job)),
                None => self.get(job_id).await,
            };
        }

        if job.status == JobStatus::Pending {
            if let Some(job) = self.set_in_progress(job_id).await? {
                return Ok(Some(job));
            }
        }

        Ok(Some(job))
    }

    /// List jobs, newest first, with an optional status filter.
    pub async fn list(
        &self,
        status: Option<JobStatus>,
        limit: i64,
        skip: i64,
    ) -> Result<Vec<Job>> {
        let jobs = match status {
            Some(status) => {
                sqlx::query_as::<_, Job>(
                    "SELECT * FROM jobs WHERE status = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(status)
                .bind(limit)
                .bind(skip)
                .fetch_all(self.ctx.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, Job>(
                    "SELECT * FROM jobs ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(limit)
                .bind(skip)
                .fetch_all(self.ctx.pool())
                .await?
            }
        };
        Ok(jobs)
    }
}
