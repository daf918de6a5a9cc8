//! Article cache repository.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::QueryBuilder;

use crate::data::ids;
use crate::data::models::{Article, ArticleStatus};
use crate::db::DbContext;
use crate::error::Result;

/// Article cache operations.
pub struct ArticleOps<'a> {
    ctx: &'a DbContext,
}

impl<'a> ArticleOps<'a> {
    pub(crate) fn new(ctx: &'a DbContext) -> Self {
        Self { ctx }
    }

    /// Insert a new PENDING article keyed by its normalized URL.
    ///
    /// Concurrent admissions of the same URL race the insert; a unique-index
    /// violation is collapsed into a read of the existing row, so the caller
    /// always gets the record that won and can re-classify it.
    pub async fn create(
        &self,
        normalized_url: &str,
        source: &str,
        category: &str,
        priority: i64,
    ) -> Result<Article> {
        let now = Utc::now();
        let inserted = sqlx::query_as::<_, Article>(
            "INSERT INTO articles (id, url, source, category, priority, status, created_at, updated_at, reference_count, retry_count) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, 0) \
             RETURNING *",
        )
        .bind(ids::article_id())
        .bind(normalized_url)
        .bind(source)
        .bind(category)
        .bind(priority)
        .bind(ArticleStatus::Pending)
        .bind(now)
        .bind(now)
        .fetch_one(self.ctx.pool())
        .await;

        match inserted {
            Ok(article) => Ok(article),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => self
                .get_by_url(normalized_url)
                .await?
                .ok_or_else(|| anyhow::anyhow!("article vanished after unique conflict: {normalized_url}")),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, article_id: &str) -> Result<Option<Article>> {
        let article = sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE id = ?")
            .bind(article_id)
            .fetch_optional(self.ctx.pool())
            .await?;
        Ok(article)
    }

    pub async fn get_by_url(&self, normalized_url: &str) -> Result<Option<Article>> {
        let article = sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE url = ?")
            .bind(normalized_url)
            .fetch_optional(self.ctx.pool())
            .await?;
        Ok(article)
    }

    /// Bulk-fetch by normalized URL, returning a URL → article map.
    pub async fn get_by_urls(&self, normalized_urls: &[String]) -> Result<HashMap<String, Article>> {
        if normalized_urls.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::new("SELECT * FROM articles WHERE url IN (");
        let mut urls = query.separated(", ");
        for url in normalized_urls {
            urls.push_bind(url);
        }
        query.push(")");

        let articles = query
            .build_query_as::<Article>()
            .fetch_all(self.ctx.pool())
            .await?;

        Ok(articles
            .into_iter()
            .map(|article| (article.url.clone(), article))
            .collect())
    }

    pub async fn get_by_ids(&self, article_ids: &[String]) -> Result<Vec<Article>> {
        if article_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::new("SELECT * FROM articles WHERE id IN (");
        let mut ids = query.separated(", ");
        for id in article_ids {
            ids.push_bind(id);
        }
        query.push(")");

        let articles = query
            .build_query_as::<Article>()
            .fetch_all(self.ctx.pool())
            .await?;
        Ok(articles)
    }

    pub async fn set_status(&self, article_id: &str, status: ArticleStatus) -> Result<()> {
        sqlx::query("UPDATE articles SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(article_id)
            .execute(self.ctx.pool())
            .await?;
        Ok(())
    }

    /// Store scraped content, transitioning the article into SCRAPED.
    ///
    /// Sets `scraped_at` and clears any previous error message, so a SCRAPED
    /// row always carries content and a scrape timestamp.
    pub async fn store_content(&self, article_id: &str, title: &str, content: &str) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE articles \
             SET title = ?, content = ?, status = ?, scraped_at = ?, updated_at = ?, error_message = NULL \
             WHERE id = ?",
        )
        .bind(title)
        .bind(content)
        .bind(ArticleStatus::Scraped)
        .bind(now)
        .bind(now)
        .bind(article_id)
        .execute(self.ctx.pool())
        .await?;
        Ok(())
    }

    /// Mark an article FAILED with its final error message.
    pub async fn mark_failed(&self, article_id: &str, error_message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE articles SET status = ?, error_message = ?, updated_at = ? WHERE id = ?",
        )
        .bind(ArticleStatus::Failed)
        .bind(error_message)
        .bind(Utc::now())
        .bind(article_id)
        .execute(self.ctx.pool())
        .await?;
        Ok(())
    }

    /// Reset an article to PENDING, clearing its error message.
    pub async fn reset_for_retry(&self, article_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE articles SET status = ?, error_message = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(ArticleStatus::Pending)
        .bind(Utc::now())
        .bind(article_id)
        .execute(self.ctx.pool())
        .await?;
        Ok(())
    }

    /// Bump the reference count for a reused article.
    pub async fn increment_reference(&self, article_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE articles SET reference_count = reference_count + 1, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(article_id)
        .execute(self.ctx.pool())
        .await?;
        Ok(())
    }

    /// Bump the retry count, returning the new value.
    pub async fn increment_retry(&self, article_id: &str) -> Result<i64> {
        let retry_count = sqlx::query_scalar::<_, i64>(
            "UPDATE articles SET retry_count = retry_count + 1, updated_at = ? WHERE id = ? \
             RETURNING retry_count",
        )
        .bind(Utc::now())
        .bind(article_id)
        .fetch_one(self.ctx.pool())
        .await?;
        Ok(retry_count)
    }
}
