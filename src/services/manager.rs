//! Spawns services and coordinates their shutdown.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::services::{Service, ServiceResult, run_service};

/// Owns the running service tasks and the shared shutdown signal.
pub struct ServiceManager {
    running: Vec<(&'static str, JoinHandle<ServiceResult>)>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            running: Vec::new(),
            shutdown_tx,
        }
    }

    /// Spawn a service immediately under this manager's shutdown signal.
    pub fn spawn(&mut self, service: Box<dyn Service>) {
        let name = service.name();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(run_service(service, shutdown_rx));
        self.running.push((name, handle));
        debug!(service = name, "service spawned");
    }

    /// Wait until any service completes, returning its name and result.
    ///
    /// Services are expected to run forever; the first one to return means
    /// the application should begin shutting down.
    pub async fn wait_any(&mut self) -> (&'static str, ServiceResult) {
        if self.running.is_empty() {
            return ("none", ServiceResult::Error(anyhow::anyhow!("no services running")));
        }

        loop {
            if let Some(index) = self.running.iter().position(|(_, handle)| handle.is_finished()) {
                let (name, handle) = self.running.swap_remove(index);
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => ServiceResult::Error(anyhow::anyhow!("service task panicked: {e}")),
                };
                return (name, result);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Signal shutdown and wait for every remaining service, bounded by
    /// `timeout` per service.
    ///
    /// Returns the elapsed time, or the names of the services that failed
    /// to stop in time.
    pub async fn shutdown(&mut self, timeout: Duration) -> Result<Duration, Vec<&'static str>> {
        let names: Vec<_> = self.running.iter().map(|(name, _)| *name).collect();
        info!(services = ?names, timeout = format!("{timeout:.2?}"), "shutting down services");

        let _ = self.shutdown_tx.send(());

        let started = std::time::Instant::now();
        let mut pending = Vec::new();
        for (name, handle) in self.running.drain(..) {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(_)) => debug!(service = name, "service stopped"),
                Ok(Err(e)) => {
                    warn!(service = name, error = ?e, "service task panicked during shutdown");
                    pending.push(name);
                }
                Err(_) => {
                    warn!(service = name, "service shutdown timed out");
                    pending.push(name);
                }
            }
        }

        if pending.is_empty() {
            Ok(started.elapsed())
        } else {
            Err(pending)
        }
    }
}
