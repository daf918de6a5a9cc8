//! Crate-wide result alias.
//!
//! Worker, service, and repository paths propagate errors with `?` through
//! this alias; typed errors live next to the component that produces them.

pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;
