//! Job endpoints: submission, status, results, cancellation, listing.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::data::models::{ArticleStatus, Job, JobStatus};
use crate::data::urls;
use crate::events::JobUpdate;
use crate::scheduler::admitter::{Admitter, ArticleSpec};
use crate::state::AppState;
use crate::web::error::{ApiError, db_error};

/// Largest accepted batch.
const MAX_BATCH_SIZE: usize = 100;
/// Default page size for job listings.
const DEFAULT_LIST_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct ArticleInput {
    pub url: String,
    pub source: String,
    pub category: String,
    #[serde(default = "default_priority")]
    pub priority: i64,
}

fn default_priority() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub articles: Vec<ArticleInput>,
}

impl SubmitRequest {
    /// Validate the batch: size bounds, URL shape, priority range, and no
    /// duplicate raw URLs. Any issue rejects the whole batch.
    fn validate(&self) -> Result<(), ApiError> {
        let mut issues = Vec::new();

        if self.articles.is_empty() {
            issues.push("batch must contain at least one article".to_owned());
        }
        if self.articles.len() > MAX_BATCH_SIZE {
            issues.push(format!("batch exceeds {MAX_BATCH_SIZE} articles"));
        }

        let mut seen = std::collections::HashSet::new();
        for article in &self.articles {
            if !article.url.starts_with("http://") && !article.url.starts_with("https://") {
                issues.push(format!("URL must start with http:// or https://: {}", article.url));
            } else if !urls::validate(&article.url) {
                issues.push(format!("invalid URL: {}", article.url));
            }
            if !(1..=10).contains(&article.priority) {
                issues.push(format!(
                    "priority must be between 1 and 10: {}",
                    article.priority
                ));
            }
            if !seen.insert(article.url.as_str()) {
                issues.push(format!("duplicate URL in request: {}", article.url));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation("invalid job submission", issues))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub total_articles: i64,
    pub new_articles: i64,
    pub cached_articles: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub total_articles: i64,
    pub completed: i64,
    pub failed: i64,
    pub pending: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            total_articles: job.total_articles,
            completed: job.completed_count,
            failed: job.failed_count,
            pending: job.pending(),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ArticleResult {
    pub article_id: String,
    pub url: String,
    pub source: String,
    pub category: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub scraped_at: Option<DateTime<Utc>>,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct FailedArticle {
    pub url: String,
    pub error: String,
    pub attempted_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct JobResultsResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub total_articles: i64,
    pub successful: i64,
    pub failed: i64,
    pub results: Vec<ArticleResult>,
    pub failed_articles: Vec<FailedArticle>,
}

/// `POST /jobs/submit` — Admit a batch of scrape requests.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    request.validate()?;

    let batch: Vec<ArticleSpec> = request
        .articles
        .into_iter()
        .map(|article| ArticleSpec {
            url: article.url,
            source: article.source,
            category: article.category,
            priority: article.priority,
        })
        .collect();

    let admission = Admitter::new(&state.db, &state.broker)
        .submit(batch)
        .await
        .map_err(|e| db_error("job submission", e))?;

    let job = admission.job;
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            job_id: job.id.clone(),
            status: job.status,
            total_articles: job.total_articles,
            new_articles: job.new_articles,
            cached_articles: job.cached_articles,
            message: admission.message.to_owned(),
        }),
    ))
}

/// `GET /jobs/{id}/status` — Current counters for one job.
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = state
        .db
        .jobs()
        .get(&job_id)
        .await
        .map_err(|e| db_error("job lookup", e))?
        .ok_or_else(|| ApiError::not_found(format!("Job {job_id} not found")))?;

    Ok(Json(JobStatusResponse::from(&job)))
}

/// `GET /jobs/{id}/results` — Scraped content and failures for one job.
pub async fn job_results(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobResultsResponse>, ApiError> {
    let job = state
        .db
        .jobs()
        .get(&job_id)
        .await
        .map_err(|e| db_error("job lookup", e))?
        .ok_or_else(|| ApiError::not_found(format!("Job {job_id} not found")))?;

    let articles = state
        .db
        .articles()
        .get_by_ids(&job.article_ids)
        .await
        .map_err(|e| db_error("article lookup", e))?;

    let mut results = Vec::new();
    let mut failed_articles = Vec::new();

    for article in articles {
        match article.status {
            ArticleStatus::Scraped => {
                // Cached means scraped before this job existed.
                let cached = article
                    .scraped_at
                    .is_some_and(|scraped_at| scraped_at < job.created_at);
                results.push(ArticleResult {
                    article_id: article.id,
                    url: article.url,
                    source: article.source,
                    category: article.category,
                    title: article.title,
                    content: article.content,
                    scraped_at: article.scraped_at,
                    cached,
                });
            }
            ArticleStatus::Failed => {
                failed_articles.push(FailedArticle {
                    url: article.url,
                    error: article
                        .error_message
                        .unwrap_or_else(|| "Unknown error".to_owned()),
                    attempted_at: article.updated_at,
                });
            }
            ArticleStatus::Pending | ArticleStatus::Scraping => {}
        }
    }

    Ok(Json(JobResultsResponse {
        job_id: job.id.clone(),
        status: job.status,
        total_articles: job.total_articles,
        successful: results.len() as i64,
        failed: failed_articles.len() as i64,
        results,
        failed_articles,
    }))
}

/// `DELETE /jobs/{id}` — Cancel a pending or in-progress job.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let job = state
        .db
        .jobs()
        .get(&job_id)
        .await
        .map_err(|e| db_error("job lookup", e))?
        .ok_or_else(|| ApiError::not_found(format!("Job {job_id} not found")))?;

    if job.status.is_terminal() {
        return Err(ApiError::bad_request(format!(
            "Cannot cancel job with status {}",
            job.status.as_str()
        )));
    }

    // Remove queued work first; a task popped before this scan is discarded
    // by the worker's CANCELLED check at task entry.
    let removed = state.broker.clear_job(&job_id);

    let cancelled = state
        .db
        .jobs()
        .cancel(&job_id)
        .await
        .map_err(|e| db_error("job cancellation", e))?
        .ok_or_else(|| ApiError::bad_request("Failed to cancel job"))?;

    state
        .broker
        .publish_update(JobUpdate::from_job(&cancelled, None));

    Ok(Json(json!({
        "job_id": cancelled.id,
        "status": cancelled.status,
        "message": format!("Job cancelled. Removed {removed} pending tasks."),
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status_filter: Option<String>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

/// `GET /jobs` — List jobs, newest first.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<JobStatusResponse>>, ApiError> {
    let status = match params.status_filter.as_deref() {
        Some(raw) => Some(
            JobStatus::parse(raw)
                .ok_or_else(|| ApiError::bad_request(format!("unknown status filter: {raw}")))?,
        ),
        None => None,
    };

    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 500);
    let skip = params.skip.unwrap_or(0).max(0);

    let jobs = state
        .db
        .jobs()
        .list(status, limit, skip)
        .await
        .map_err(|e| db_error("job listing", e))?;

    Ok(Json(jobs.iter().map(JobStatusResponse::from).collect()))
}

/// `GET /health` — Liveness check.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// `GET /` — Service info.
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "clipper",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
    }))
}
