//! In-process task broker.
//!
//! Three FIFO lanes carry JSON task frames (push-front, pop-back), popped in
//! strict priority order: `high` drains completely before `medium` is
//! touched, and `medium` before `low`. Starvation of the low lane under
//! sustained high-priority load is an accepted part of the contract.
//!
//! A broadcast channel (`job_updates`) carries progress events to the
//! fan-out layer.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::warn;

use crate::data::models::{Lane, TaskEnvelope};
use crate::error::Result;
use crate::events::JobUpdate;

/// Capacity of the progress broadcast channel; slow subscribers lag rather
/// than block publishers.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

pub struct Broker {
    lanes: [Mutex<VecDeque<String>>; 3],
    updates: broadcast::Sender<JobUpdate>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            lanes: [
                Mutex::new(VecDeque::new()),
                Mutex::new(VecDeque::new()),
                Mutex::new(VecDeque::new()),
            ],
            updates,
        }
    }

    fn lane(&self, lane: Lane) -> &Mutex<VecDeque<String>> {
        match lane {
            Lane::High => &self.lanes[0],
            Lane::Medium => &self.lanes[1],
            Lane::Low => &self.lanes[2],
        }
    }

    /// Push a task onto the lane matching its priority.
    pub fn push(&self, task: &TaskEnvelope) -> Result<()> {
        self.push_lane(Lane::for_priority(task.priority), task)
    }

    /// Push a task onto a specific lane (retries always re-enter `high`).
    pub fn push_lane(&self, lane: Lane, task: &TaskEnvelope) -> Result<()> {
        let frame = serde_json::to_string(task)?;
        self.lane(lane)
            .lock()
            .expect("lane lock poisoned")
            .push_front(frame);
        Ok(())
    }

    /// Pop the next task in strict priority order, FIFO within a lane.
    ///
    /// Malformed frames are logged and dropped rather than handed to a
    /// worker.
    pub fn pull(&self) -> Option<TaskEnvelope> {
        for lane in Lane::ALL {
            let mut queue = self.lane(lane).lock().expect("lane lock poisoned");
            while let Some(frame) = queue.pop_back() {
                match serde_json::from_str::<TaskEnvelope>(&frame) {
                    Ok(task) => return Some(task),
                    Err(e) => {
                        warn!(lane = lane.as_str(), error = %e, "dropping malformed task frame");
                    }
                }
            }
        }
        None
    }

    /// Remove every queued task for a job across all lanes, returning the
    /// number removed. The scan is O(queue depth); batches are small and
    /// cancellation is rare.
    pub fn clear_job(&self, job_id: &str) -> usize {
        let mut removed = 0;
        for lane in Lane::ALL {
            let mut queue = self.lane(lane).lock().expect("lane lock poisoned");
            let before = queue.len();
            queue.retain(|frame| match serde_json::from_str::<TaskEnvelope>(frame) {
                Ok(task) => task.job_id != job_id,
                Err(e) => {
                    warn!(lane = lane.as_str(), error = %e, "dropping malformed task frame");
                    false
                }
            });
            removed += before - queue.len();
        }
        removed
    }

    /// Current depth of one lane.
    pub fn depth(&self, lane: Lane) -> usize {
        self.lane(lane).lock().expect("lane lock poisoned").len()
    }

    /// Publish a progress event. Nobody listening is not an error.
    pub fn publish_update(&self, update: JobUpdate) {
        let _ = self.updates.send(update);
    }

    /// Subscribe to the progress channel.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<JobUpdate> {
        self.updates.subscribe()
    }

    #[cfg(test)]
    fn push_frame(&self, lane: Lane, frame: impl Into<String>) {
        self.lane(lane)
            .lock()
            .expect("lane lock poisoned")
            .push_front(frame.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(job: &str, n: u32, priority: i64) -> TaskEnvelope {
        TaskEnvelope {
            task_id: format!("task_{n}"),
            job_id: job.to_owned(),
            article_id: format!("art_{n}"),
            url: format!("https://example.com/{n}"),
            source: "TechNews".to_owned(),
            category: "AI".to_owned(),
            priority,
            retry_count: 0,
        }
    }

    #[test]
    fn fifo_within_a_lane() {
        let broker = Broker::new();
        for n in 0..5 {
            broker.push(&task("job_a", n, 1)).unwrap();
        }
        for n in 0..5 {
            assert_eq!(broker.pull().unwrap().task_id, format!("task_{n}"));
        }
        assert!(broker.pull().is_none());
    }

    #[test]
    fn strict_priority_across_lanes() {
        let broker = Broker::new();
        broker.push(&task("job_a", 1, 9)).unwrap();
        broker.push(&task("job_a", 2, 5)).unwrap();
        broker.push(&task("job_a", 3, 2)).unwrap();
        broker.push(&task("job_a", 4, 1)).unwrap();

        // High drains fully (FIFO), then medium, then low.
        assert_eq!(broker.pull().unwrap().task_id, "task_3");
        assert_eq!(broker.pull().unwrap().task_id, "task_4");
        assert_eq!(broker.pull().unwrap().task_id, "task_2");
        assert_eq!(broker.pull().unwrap().task_id, "task_1");
    }

    #[test]
    fn priority_boundaries_route_correctly() {
        let broker = Broker::new();
        broker.push(&task("job_a", 1, 3)).unwrap();
        broker.push(&task("job_a", 2, 4)).unwrap();
        broker.push(&task("job_a", 3, 7)).unwrap();
        broker.push(&task("job_a", 4, 8)).unwrap();

        assert_eq!(broker.depth(Lane::High), 1);
        assert_eq!(broker.depth(Lane::Medium), 2);
        assert_eq!(broker.depth(Lane::Low), 1);
    }

    #[test]
    fn clear_job_removes_only_matching_tasks() {
        let broker = Broker::new();
        broker.push(&task("job_a", 1, 1)).unwrap();
        broker.push(&task("job_b", 2, 1)).unwrap();
        broker.push(&task("job_a", 3, 5)).unwrap();
        broker.push(&task("job_a", 4, 9)).unwrap();

        assert_eq!(broker.clear_job("job_a"), 3);
        assert_eq!(broker.pull().unwrap().job_id, "job_b");
        assert!(broker.pull().is_none());
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let broker = Broker::new();
        broker.push_frame(Lane::High, "{not json");
        broker.push(&task("job_a", 1, 1)).unwrap();

        // The bad frame is silently skipped; the valid task still comes out.
        assert_eq!(broker.pull().unwrap().task_id, "task_1");
        assert!(broker.pull().is_none());
    }

    #[tokio::test]
    async fn updates_reach_subscribers() {
        let broker = Broker::new();
        let mut rx = broker.subscribe_updates();
        broker.publish_update(JobUpdate {
            job_id: "job_a".to_owned(),
            article_id: None,
            status: crate::data::models::JobStatus::InProgress,
            completed: 0,
            failed: 0,
            total: 1,
        });
        assert_eq!(rx.recv().await.unwrap().job_id, "job_a");
    }
}
