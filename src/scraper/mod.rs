//! Scrape collaborator interface.

mod http;

pub use http::HttpScraper;

/// Outcome of a single scrape attempt.
///
/// On success `content` is non-empty; on failure `error` carries a
/// classified, human-readable message. Implementations never panic and
/// never return an unclassified error.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub success: bool,
    pub title: Option<String>,
    pub content: Option<String>,
    pub error: Option<String>,
}

impl ScrapeOutcome {
    pub fn ok(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            success: true,
            title: Some(title.into()),
            content: Some(content.into()),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            title: None,
            content: None,
            error: Some(message.into()),
        }
    }
}

/// External scrape collaborator invoked by workers.
#[async_trait::async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, url: &str) -> ScrapeOutcome;
}
