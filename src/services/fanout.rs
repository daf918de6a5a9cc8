//! Progress fan-out service.
//!
//! Subscribes to the broker's `job_updates` channel and dispatches each
//! event to the observer registry (per-job and global observers).

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::Service;
use crate::broker::Broker;
use crate::events::ObserverRegistry;

pub struct FanoutService {
    broker: Arc<Broker>,
    observers: Arc<ObserverRegistry>,
    shutdown_tx: Option<broadcast::Sender<()>>,
}

impl FanoutService {
    pub fn new(broker: Arc<Broker>, observers: Arc<ObserverRegistry>) -> Self {
        Self {
            broker,
            observers,
            shutdown_tx: None,
        }
    }
}

#[async_trait::async_trait]
impl Service for FanoutService {
    fn name(&self) -> &'static str {
        "fanout"
    }

    async fn run(&mut self) -> Result<(), anyhow::Error> {
        let mut updates = self.broker.subscribe_updates();
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        self.shutdown_tx = Some(shutdown_tx);

        loop {
            tokio::select! {
                update = updates.recv() => match update {
                    Ok(update) => self.observers.dispatch(&update),
                    Err(RecvError::Lagged(skipped)) => {
                        // Late observers reconcile via the status endpoint.
                        warn!(skipped, "fan-out lagged behind the update channel");
                    }
                    Err(RecvError::Closed) => {
                        anyhow::bail!("job_updates channel closed");
                    }
                },
                _ = shutdown_rx.recv() => {
                    info!(service = "fanout", "fan-out stopped");
                    return Ok(());
                }
            }
        }
    }

    async fn shutdown(&mut self) -> Result<(), anyhow::Error> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        Ok(())
    }
}
