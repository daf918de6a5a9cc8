//! Database context and repositories.

mod articles;
mod context;
mod jobs;

pub use articles::ArticleOps;
pub use context::DbContext;
pub use jobs::JobOps;
