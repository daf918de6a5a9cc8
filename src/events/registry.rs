//! Observer registry for progress fan-out.
//!
//! Observers subscribe either to a single job or globally. Delivery is
//! best-effort: an observer whose channel is closed is evicted on the next
//! dispatch.

use dashmap::DashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::events::JobUpdate;

/// Registry of progress observers, keyed by job scope.
#[derive(Default)]
pub struct ObserverRegistry {
    scoped: DashMap<String, Vec<mpsc::UnboundedSender<JobUpdate>>>,
    global: Mutex<Vec<mpsc::UnboundedSender<JobUpdate>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for a single job.
    pub fn subscribe_job(&self, job_id: &str) -> mpsc::UnboundedReceiver<JobUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scoped.entry(job_id.to_owned()).or_default().push(tx);
        rx
    }

    /// Register an observer for every job.
    pub fn subscribe_all(&self) -> mpsc::UnboundedReceiver<JobUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.global.lock().expect("lock poisoned").push(tx);
        rx
    }

    /// Dispatch one event to the matching scoped observers and to every
    /// global observer, evicting any whose channel has closed.
    pub fn dispatch(&self, update: &JobUpdate) {
        if let Some(mut observers) = self.scoped.get_mut(&update.job_id) {
            observers.retain(|tx| tx.send(update.clone()).is_ok());
            if observers.is_empty() {
                let job_id = update.job_id.clone();
                drop(observers);
                self.scoped.remove_if(&job_id, |_, observers| observers.is_empty());
                debug!(job_id = %job_id, "last scoped observer gone");
            }
        }

        self.global
            .lock()
            .expect("lock poisoned")
            .retain(|tx| tx.send(update.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::JobStatus;

    fn update(job_id: &str) -> JobUpdate {
        JobUpdate {
            job_id: job_id.to_owned(),
            article_id: None,
            status: JobStatus::InProgress,
            completed: 1,
            failed: 0,
            total: 3,
        }
    }

    #[tokio::test]
    async fn scoped_observer_receives_only_its_job() {
        let registry = ObserverRegistry::new();
        let mut rx = registry.subscribe_job("job_a");

        registry.dispatch(&update("job_b"));
        registry.dispatch(&update("job_a"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.job_id, "job_a");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn global_observer_receives_everything() {
        let registry = ObserverRegistry::new();
        let mut rx = registry.subscribe_all();

        registry.dispatch(&update("job_a"));
        registry.dispatch(&update("job_b"));

        assert_eq!(rx.recv().await.unwrap().job_id, "job_a");
        assert_eq!(rx.recv().await.unwrap().job_id, "job_b");
    }

    #[tokio::test]
    async fn closed_observers_are_evicted() {
        let registry = ObserverRegistry::new();
        let rx = registry.subscribe_job("job_a");
        drop(rx);

        registry.dispatch(&update("job_a"));
        assert!(registry.scoped.get("job_a").is_none());

        let rx = registry.subscribe_all();
        drop(rx);
        registry.dispatch(&update("job_a"));
        assert!(registry.global.lock().unwrap().is_empty());
    }
}
