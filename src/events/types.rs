//! Progress event types.

use serde::{Deserialize, Serialize};

use crate::data::models::{Job, JobStatus};

/// A counter or status change for one job, published on the `job_updates`
/// channel after the corresponding store mutation has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobUpdate {
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_id: Option<String>,
    pub status: JobStatus,
    pub completed: i64,
    pub failed: i64,
    pub total: i64,
}

impl JobUpdate {
    /// Snapshot a job's counters, optionally attributing the change to one
    /// article.
    pub fn from_job(job: &Job, article_id: Option<String>) -> Self {
        Self {
            job_id: job.id.clone(),
            article_id,
            status: job.status,
            completed: job.completed_count,
            failed: job.failed_count,
            total: job.total_articles,
        }
    }
}
