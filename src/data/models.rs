//! Row types for the article cache and job store, plus the ephemeral task
//! envelope carried by the broker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// Lifecycle state of a cached article.
#[derive(sqlx::Type, Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArticleStatus {
    Pending,
    Scraping,
    Scraped,
    Failed,
}

/// Lifecycle state of a job.
///
/// `Completed`, `Failed`, and `Cancelled` are terminal; transitions into
/// them are one-shot (guarded compare-and-set in the job repository).
#[derive(sqlx::Type, Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Wire representation used by the API and the event channel.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parse the wire representation ("IN_PROGRESS", ...) used by the API.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "IN_PROGRESS" => Some(Self::InProgress),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A durable content record keyed by normalized URL.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Article {
    pub id: String,
    /// Normalized URL; the sole deduplication key (unique index).
    pub url: String,
    pub source: String,
    pub category: String,
    /// 1..=10, 1 is most urgent.
    pub priority: i64,
    pub status: ArticleStatus,
    pub title: Option<String>,
    pub content: Option<String>,
    pub error_message: Option<String>,
    /// Set exactly when transitioning into `Scraped`.
    pub scraped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented once per job that reuses this article; never decremented.
    pub reference_count: i64,
    pub retry_count: i64,
}

/// A batch aggregate with strict accounting counters.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub total_articles: i64,
    pub new_articles: i64,
    pub cached_articles: i64,
    pub completed_count: i64,
    pub failed_count: i64,
    pub article_ids: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set iff `status` is terminal.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Articles not yet accounted for, clamped at zero.
    pub fn pending(&self) -> i64 {
        (self.total_articles - self.completed_count - self.failed_count).max(0)
    }
}

/// One of the three priority-ordered FIFO queues in the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    High,
    Medium,
    Low,
}

impl Lane {
    /// Lanes in strict pop order.
    pub const ALL: [Lane; 3] = [Lane::High, Lane::Medium, Lane::Low];

    /// Map an article priority (1..=10) to its lane.
    pub fn for_priority(priority: i64) -> Self {
        match priority {
            ..=3 => Lane::High,
            4..=7 => Lane::Medium,
            _ => Lane::Low,
        }
    }

    /// Queue name on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Lane::High => "scraping_tasks:priority:high",
            Lane::Medium => "scraping_tasks:priority:medium",
            Lane::Low => "scraping_tasks:priority:low",
        }
    }
}

/// The ephemeral record carrying a single unit of scrape work.
///
/// Serialized as JSON on the lanes; deserialization is strict and malformed
/// frames are dropped by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskEnvelope {
    pub task_id: String,
    pub job_id: String,
    pub article_id: String,
    pub url: String,
    pub source: String,
    pub category: String,
    pub priority: i64,
    pub retry_count: u32,
}
