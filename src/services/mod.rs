use tokio::sync::broadcast;
use tracing::{error, info, warn};

pub mod fanout;
pub mod manager;
pub mod web;

#[derive(Debug)]
pub enum ServiceResult {
    GracefulShutdown,
    NormalCompletion,
    Error(anyhow::Error),
}

/// Common trait for all long-running services in the application.
#[async_trait::async_trait]
pub trait Service: Send + Sync {
    /// The name of the service for logging
    fn name(&self) -> &'static str;

    /// Run the service's main work loop
    async fn run(&mut self) -> Result<(), anyhow::Error>;

    /// Gracefully shutdown the service
    async fn shutdown(&mut self) -> Result<(), anyhow::Error>;
}

/// Drives one service through its lifecycle: run until it finishes on its
/// own or the shutdown signal fires, then shut it down.
pub async fn run_service(
    mut service: Box<dyn Service>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> ServiceResult {
    let name = service.name();
    info!(service = name, "service started");

    tokio::select! {
        result = service.run() => match result {
            Ok(()) => {
                warn!(service = name, "service completed unexpectedly");
                ServiceResult::NormalCompletion
            }
            Err(e) => {
                error!(service = name, "service failed: {e}");
                ServiceResult::Error(e)
            }
        },
        _ = shutdown_rx.recv() => {
            let started = std::time::Instant::now();
            match service.shutdown().await {
                Ok(()) => {
                    info!(service = name, "shutdown completed in {:.2?}", started.elapsed());
                    ServiceResult::GracefulShutdown
                }
                Err(e) => {
                    error!(service = name, "shutdown failed after {:.2?}: {e}", started.elapsed());
                    ServiceResult::Error(e)
                }
            }
        }
    }
}
