//! Distributed scrape-job scheduling service.
//!
//! Batches of scrape requests are deduplicated against a durable article
//! cache, residual work is dispatched across three priority lanes, and a
//! worker pool drains the lanes with bounded exponential backoff retries.
//! Progress streams to observers over WebSockets in near real time.

pub mod broker;
pub mod config;
pub mod data;
pub mod db;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod scraper;
pub mod services;
pub mod state;
pub mod utils;
pub mod web;
