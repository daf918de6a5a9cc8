//! Small task-lifecycle helpers.

use tokio::task::JoinHandle;
use tracing::warn;

/// Join a set of task handles, reporting any that panicked.
pub async fn join_tasks(handles: Vec<JoinHandle<()>>) -> Result<(), anyhow::Error> {
    let results = futures::future::join_all(handles).await;

    let panicked = results.iter().filter(|result| result.is_err()).count();
    if panicked > 0 {
        warn!(panicked, "tasks panicked during shutdown");
        anyhow::bail!("{panicked} task(s) panicked");
    }
    Ok(())
}
