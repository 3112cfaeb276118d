//! Task queue with exclusive claim discipline.

use crate::types::{DownloadSummary, FailedDownload, TaskStatus, ZoneLink};
use std::collections::VecDeque;

/// One zone download and its lifecycle state
#[derive(Debug, Clone)]
pub(super) struct DownloadTask {
    pub(super) link: ZoneLink,
    pub(super) status: TaskStatus,
    /// Times a worker has claimed this task. 1 for a normal run, 2 after
    /// the single re-authentication retry.
    pub(super) claims: u32,
    pub(super) reason: Option<String>,
}

/// Shared task set.
///
/// Lives behind the orchestrator's mutex: the pending -> in-flight
/// transition happens under the lock, so no two workers can claim the same
/// task.
#[derive(Debug)]
pub(super) struct TaskQueue {
    tasks: Vec<DownloadTask>,
    pending: VecDeque<usize>,
}

impl TaskQueue {
    /// Build the task set in API order, everything pending
    pub(super) fn new(links: Vec<ZoneLink>) -> Self {
        let tasks: Vec<DownloadTask> = links
            .into_iter()
            .map(|link| DownloadTask {
                link,
                status: TaskStatus::Pending,
                claims: 0,
                reason: None,
            })
            .collect();
        let pending = (0..tasks.len()).collect();

        Self { tasks, pending }
    }

    /// Claim the next pending task, transitioning it to in-flight.
    ///
    /// Returns the task id and its link; `None` when nothing is pending.
    pub(super) fn claim(&mut self) -> Option<(usize, ZoneLink)> {
        let id = self.pending.pop_front()?;
        let task = &mut self.tasks[id];
        task.status = TaskStatus::InFlight;
        task.claims += 1;
        Some((id, task.link.clone()))
    }

    /// Put a task back at the head of the queue for the re-auth retry
    pub(super) fn requeue(&mut self, id: usize) {
        self.tasks[id].status = TaskStatus::Pending;
        self.pending.push_front(id);
    }

    /// How often the task has been claimed so far
    pub(super) fn claims(&self, id: usize) -> u32 {
        self.tasks[id].claims
    }

    /// Mark a task done
    pub(super) fn settle_done(&mut self, id: usize) {
        self.tasks[id].status = TaskStatus::Done;
    }

    /// Mark a task failed with a reason for the summary
    pub(super) fn settle_failed(&mut self, id: usize, reason: String) {
        let task = &mut self.tasks[id];
        task.status = TaskStatus::Failed;
        task.reason = Some(reason);
    }

    /// Fail every still-pending task with a cancellation reason.
    ///
    /// Called after a stop signal once the workers have drained; none of
    /// these tasks is ever started.
    pub(super) fn drain_cancelled(&mut self, reason: &str) {
        while let Some(id) = self.pending.pop_front() {
            self.settle_failed(id, reason.to_string());
        }
    }

    /// Aggregate the terminal states into a run summary.
    ///
    /// Failures are grouped in task order, which keeps the presentation
    /// stable across runs regardless of completion order.
    pub(super) fn summary(&self) -> DownloadSummary {
        let done = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .count();
        let failed = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .map(|t| FailedDownload {
                zone: t.link.name().to_string(),
                reason: t
                    .reason
                    .clone()
                    .unwrap_or_else(|| "unknown failure".to_string()),
            })
            .collect();

        DownloadSummary { done, failed }
    }

    #[cfg(test)]
    pub(super) fn task(&self, id: usize) -> &DownloadTask {
        &self.tasks[id]
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.tasks.len()
    }
}
