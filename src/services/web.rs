//! Web server service.

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, trace, warn};

use super::Service;
use crate::state::AppState;
use crate::web::create_router;

pub struct WebService {
    state: AppState,
    shutdown_tx: Option<broadcast::Sender<()>>,
}

impl WebService {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            shutdown_tx: None,
        }
    }
}

#[async_trait::async_trait]
impl Service for WebService {
    fn name(&self) -> &'static str {
        "web"
    }

    async fn run(&mut self) -> Result<(), anyhow::Error> {
        let app = create_router(self.state.clone());

        let addr = format!(
            "{}:{}",
            self.state.config.api_host, self.state.config.api_port
        );
        let listener = TcpListener::bind(&addr).await?;
        info!(
            service = "web",
            address = %addr,
            link = format!("http://localhost:{}", self.state.config.api_port),
            "web server listening"
        );

        // Internal channel bridging our Service shutdown to axum's graceful
        // shutdown.
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        self.shutdown_tx = Some(shutdown_tx);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                trace!(service = "web", "starting graceful shutdown");
            })
            .await?;

        info!(service = "web", "web server stopped");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), anyhow::Error> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        } else {
            warn!(service = "web", "no shutdown channel, cannot stop gracefully");
        }
        Ok(())
    }
}
