#![allow(dead_code)]

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use clipper::config::Config;
use clipper::data::models::Article;
use clipper::data::urls;
use clipper::scraper::{ScrapeOutcome, Scraper};

/// Config with short timings so retry back-off does not slow the suite.
pub fn test_config() -> Config {
    Config {
        max_retry_attempts: 3,
        retry_base_delay: Duration::from_millis(5),
        retry_max_delay: Duration::from_millis(20),
        consumer_poll_interval: Duration::from_millis(5),
        worker_count: 1,
        ..Config::default()
    }
}

/// Insert a SCRAPED article row directly via SQL, returning its ID.
///
/// `scraped_at` is backdated slightly so a job created afterwards sees the
/// article as cached.
pub async fn seed_scraped_article(pool: &SqlitePool, url: &str) -> String {
    let id = format!("art_seed{:08x}", rand::random::<u32>());
    let normalized = urls::normalize(url);
    let scraped_at: DateTime<Utc> = Utc::now() - chrono::Duration::seconds(60);

    sqlx::query(
        "INSERT INTO articles (id, url, source, category, priority, status, title, content, \
         scraped_at, created_at, updated_at, reference_count, retry_count) \
         VALUES (?, ?, 'TechNews', 'AI', 1, 'SCRAPED', 'Seeded', 'seeded content', ?, ?, ?, 1, 0)",
    )
    .bind(&id)
    .bind(&normalized)
    .bind(scraped_at)
    .bind(scraped_at)
    .bind(scraped_at)
    .execute(pool)
    .await
    .expect("seed_scraped_article failed");

    id
}

/// Fetch an article row by ID.
pub async fn fetch_article(pool: &SqlitePool, article_id: &str) -> Article {
    sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE id = ?")
        .bind(article_id)
        .fetch_one(pool)
        .await
        .expect("article not found")
}

/// Scraper returning scripted outcomes per URL, defaulting to success.
///
/// Outcomes queued with [`push`] are consumed in order for that URL; once
/// the queue is empty the default success outcome applies.
pub struct ScriptedScraper {
    script: Mutex<HashMap<String, VecDeque<ScrapeOutcome>>>,
}

impl ScriptedScraper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(HashMap::new()),
        })
    }

    pub fn push(&self, url: &str, outcome: ScrapeOutcome) {
        self.script
            .lock()
            .unwrap()
            .entry(url.to_owned())
            .or_default()
            .push_back(outcome);
    }
}

#[async_trait::async_trait]
impl Scraper for ScriptedScraper {
    async fn scrape(&self, url: &str) -> ScrapeOutcome {
        let scripted = self
            .script
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|outcomes| outcomes.pop_front());
        scripted.unwrap_or_else(|| ScrapeOutcome::ok("Scraped Title", "scraped article body"))
    }
}
