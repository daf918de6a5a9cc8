//! Database context handing out per-collection repositories.

use sqlx::SqlitePool;

use crate::db::articles::ArticleOps;
use crate::db::jobs::JobOps;

/// Wraps the connection pool; all store access goes through this context.
#[derive(Clone)]
pub struct DbContext {
    pool: SqlitePool,
}

impl DbContext {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the underlying database pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Article cache operations.
    pub fn articles(&self) -> ArticleOps<'_> {
        ArticleOps::new(self)
    }

    /// Job store operations.
    pub fn jobs(&self) -> JobOps<'_> {
        JobOps::new(self)
    }
}
