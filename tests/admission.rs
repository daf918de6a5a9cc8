//! Integration tests for batch admission: deduplication, counter
//! initialization, task emission, and the all-cached fast path.

use std::sync::Arc;

use sqlx::SqlitePool;

use clipper::broker::Broker;
use clipper::data::models::{ArticleStatus, JobStatus, Lane};
use clipper::db::DbContext;
use clipper::scheduler::admitter::{Admitter, ArticleSpec};

mod helpers;

fn spec(url: &str, priority: i64) -> ArticleSpec {
    ArticleSpec {
        url: url.to_owned(),
        source: "TechNews".to_owned(),
        category: "AI".to_owned(),
        priority,
    }
}

#[sqlx::test]
async fn all_cached_batch_completes_immediately(pool: SqlitePool) {
    let ctx = DbContext::new(pool.clone());
    let broker = Arc::new(Broker::new());
    let seeded = helpers::seed_scraped_article(&pool, "https://x/y").await;

    let mut updates = broker.subscribe_updates();

    // Differs only in host case and trailing slash; must hit the cache.
    let admission = Admitter::new(&ctx, &broker)
        .submit(vec![spec("https://X/y/", 1)])
        .await
        .unwrap();

    let job = admission.job;
    assert_eq!(job.total_articles, 1);
    assert_eq!(job.new_articles, 0);
    assert_eq!(job.cached_articles, 1);
    assert_eq!(job.completed_count, 1);
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.completed_at.is_some());
    assert_eq!(job.article_ids.0, vec![seeded.clone()]);
    assert_eq!(admission.message, "Job completed - all articles from cache");

    // No task was emitted.
    assert!(broker.pull().is_none());

    // Exactly one progress event, already terminal.
    let update = updates.recv().await.unwrap();
    assert_eq!(update.job_id, job.id);
    assert_eq!(update.status, JobStatus::Completed);
    assert_eq!(update.completed, 1);
    assert!(updates.try_recv().is_err());

    // The cached article's reference count was bumped.
    let article = helpers::fetch_article(&pool, &seeded).await;
    assert_eq!(article.reference_count, 2);
}

#[sqlx::test]
async fn mixed_batch_emits_tasks_for_new_articles_only(pool: SqlitePool) {
    let ctx = DbContext::new(pool.clone());
    let broker = Arc::new(Broker::new());
    helpers::seed_scraped_article(&pool, "https://news.example.com/a1").await;

    let admission = Admitter::new(&ctx, &broker)
        .submit(vec![
            spec("https://news.example.com/a1", 1),
            spec("https://news.example.com/a2", 1),
        ])
        .await
        .unwrap();

    let job = admission.job;
    assert_eq!(job.total_articles, 2);
    assert_eq!(job.new_articles, 1);
    assert_eq!(job.cached_articles, 1);
    assert_eq!(job.completed_count, 1);
    assert_eq!(job.status, JobStatus::InProgress);
    assert_eq!(job.article_ids.len(), 2);

    // Exactly one task, in the high lane, for the new article.
    assert_eq!(broker.depth(Lane::High), 1);
    let task = broker.pull().unwrap();
    assert_eq!(task.job_id, job.id);
    assert_eq!(task.url, "https://news.example.com/a2");
    assert_eq!(task.retry_count, 0);
    assert!(broker.pull().is_none());
}

#[sqlx::test]
async fn same_key_urls_in_one_batch_collapse(pool: SqlitePool) {
    let ctx = DbContext::new(pool.clone());
    let broker = Arc::new(Broker::new());

    // Distinct raw URLs, identical normalized key: both pass validation
    // but must admit a single article with a single task.
    let admission = Admitter::new(&ctx, &broker)
        .submit(vec![spec("https://X.com/a", 1), spec("https://x.com/a/", 1)])
        .await
        .unwrap();

    let job = admission.job;
    assert_eq!(job.total_articles, 1);
    assert_eq!(job.new_articles, 1);
    assert_eq!(job.cached_articles, 0);
    assert_eq!(job.article_ids.len(), 1);
    assert_eq!(job.status, JobStatus::InProgress);

    let task = broker.pull().unwrap();
    assert_eq!(task.article_id, job.article_ids[0]);
    assert!(broker.pull().is_none());

    // One record, not reused by this job: the reference count stays at 1.
    let article = helpers::fetch_article(&pool, &job.article_ids[0]).await;
    assert_eq!(article.url, "https://x.com/a");
    assert_eq!(article.reference_count, 1);
}

#[sqlx::test]
async fn priorities_route_tasks_to_their_lanes(pool: SqlitePool) {
    let ctx = DbContext::new(pool.clone());
    let broker = Arc::new(Broker::new());

    Admitter::new(&ctx, &broker)
        .submit(vec![
            spec("https://x.com/high", 2),
            spec("https://x.com/medium", 5),
            spec("https://x.com/low", 9),
        ])
        .await
        .unwrap();

    assert_eq!(broker.depth(Lane::High), 1);
    assert_eq!(broker.depth(Lane::Medium), 1);
    assert_eq!(broker.depth(Lane::Low), 1);
}

#[sqlx::test]
async fn resubmitted_url_reuses_the_same_article(pool: SqlitePool) {
    let ctx = DbContext::new(pool.clone());
    let broker = Arc::new(Broker::new());
    let admitter = Admitter::new(&ctx, &broker);

    let first = admitter
        .submit(vec![spec("https://X.COM/a/", 1)])
        .await
        .unwrap();
    let article_id = first.job.article_ids[0].clone();

    // Simulate the worker finishing the scrape.
    ctx.articles()
        .store_content(&article_id, "Title", "content body")
        .await
        .unwrap();

    let second = admitter
        .submit(vec![spec("https://x.com/a", 1)])
        .await
        .unwrap();

    assert_eq!(second.job.cached_articles, 1);
    assert_eq!(second.job.new_articles, 0);
    assert_eq!(second.job.article_ids.0, vec![article_id.clone()]);

    let article = helpers::fetch_article(&pool, &article_id).await;
    assert_eq!(article.reference_count, 2);
}

#[sqlx::test]
async fn failed_article_is_reset_and_rescheduled(pool: SqlitePool) {
    let ctx = DbContext::new(pool.clone());
    let broker = Arc::new(Broker::new());
    let admitter = Admitter::new(&ctx, &broker);

    let article = ctx
        .articles()
        .create("https://x.com/a", "TechNews", "AI", 1)
        .await
        .unwrap();
    ctx.articles()
        .mark_failed(&article.id, "HTTP Error 500")
        .await
        .unwrap();

    let admission = admitter.submit(vec![spec("https://x.com/a", 1)]).await.unwrap();

    assert_eq!(admission.job.new_articles, 1);
    assert_eq!(admission.job.cached_articles, 0);
    assert_eq!(admission.job.status, JobStatus::InProgress);

    let reset = helpers::fetch_article(&pool, &article.id).await;
    assert_eq!(reset.status, ArticleStatus::Pending);
    assert!(reset.error_message.is_none());

    let task = broker.pull().unwrap();
    assert_eq!(task.article_id, article.id);
}
