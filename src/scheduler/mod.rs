//! Scheduling core: batch admission and the scrape worker pool.

pub mod admitter;
pub mod worker;

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use crate::broker::Broker;
use crate::config::Config;
use crate::db::DbContext;
use crate::scraper::Scraper;
use crate::services::Service;
use crate::utils::join_tasks;

use self::worker::Worker;

/// Runs the pool of scrape workers.
///
/// Each worker is an independent tokio task draining the broker; the
/// service owns their handles and a shutdown channel.
pub struct SchedulerService {
    db: DbContext,
    broker: Arc<Broker>,
    scraper: Arc<dyn Scraper>,
    config: Arc<Config>,
    worker_handles: Vec<JoinHandle<()>>,
    shutdown_tx: Option<broadcast::Sender<()>>,
}

impl SchedulerService {
    pub fn new(
        db: DbContext,
        broker: Arc<Broker>,
        scraper: Arc<dyn Scraper>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            db,
            broker,
            scraper,
            config,
            worker_handles: Vec::new(),
            shutdown_tx: None,
        }
    }

    fn spawn_workers(&mut self) {
        let (shutdown_tx, _) = broadcast::channel(1);
        self.shutdown_tx = Some(shutdown_tx.clone());

        for id in 0..self.config.worker_count {
            let worker = Worker::new(
                id,
                self.db.clone(),
                self.broker.clone(),
                self.scraper.clone(),
                self.config.clone(),
            );
            let shutdown_rx = shutdown_tx.subscribe();
            self.worker_handles.push(tokio::spawn(async move {
                worker.run(shutdown_rx).await;
            }));
        }

        info!(worker_count = self.worker_handles.len(), "spawned worker tasks");
    }
}

#[async_trait::async_trait]
impl Service for SchedulerService {
    fn name(&self) -> &'static str {
        "scheduler"
    }

    async fn run(&mut self) -> Result<(), anyhow::Error> {
        self.spawn_workers();
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), anyhow::Error> {
        info!("shutting down scheduler service");
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        } else {
            anyhow::bail!("no shutdown channel available");
        }
        join_tasks(std::mem::take(&mut self.worker_handles)).await
    }
}
