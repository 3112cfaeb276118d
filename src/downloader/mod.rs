//! Bounded-concurrency zone download orchestration.
//!
//! The orchestrator drives every zone link through a fixed pool of worker
//! tasks, isolates per-zone failures, and settles into a run summary:
//! - [`queue`] - task set with exclusive claim discipline
//! - [`worker`] - claim/transfer/decompress/settle loop

mod queue;
mod worker;


use crate::client::CzdsClient;
use crate::config::DownloadOptions;
use crate::error::Result;
use crate::types::{DownloadSummary, ZoneLink};
use queue::TaskQueue;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use worker::{WorkerContext, run_worker};

/// Reason recorded for tasks that never start because of a stop signal
const CANCELLED_BEFORE_START: &str = "cancelled before start";

/// Drives a set of zone downloads through a fixed worker pool.
///
/// Exactly `concurrency` workers pull from a shared queue; the pool drains
/// the entire task set before [`run`](ZoneDownloader::run) returns, and a
/// task failure never aborts the batch.
pub struct ZoneDownloader {
    client: CzdsClient,
    options: DownloadOptions,
    cancel: CancellationToken,
}

impl ZoneDownloader {
    /// Create an orchestrator over an authenticated client.
    ///
    /// The cancellation token is the cooperative stop signal: cancelling it
    /// aborts in-flight transfers at their next suspension point and fails
    /// all still-pending tasks without starting them.
    pub fn new(client: CzdsClient, options: DownloadOptions, cancel: CancellationToken) -> Self {
        Self {
            client,
            options,
            cancel,
        }
    }

    /// Download every link, settling each task to done or failed.
    ///
    /// Returns a summary once all tasks are terminal. Partial or total task
    /// failure is still an `Ok` run; the only errors surfaced here are
    /// fatal setup failures (the output directory cannot be created).
    pub async fn run(&self, links: Vec<ZoneLink>) -> Result<DownloadSummary> {
        tokio::fs::create_dir_all(&self.options.output_dir).await?;

        if links.is_empty() {
            tracing::info!("No zone links to download");
            return Ok(DownloadSummary::default());
        }

        let concurrency = self.options.concurrency.max(1);
        tracing::info!(
            zones = links.len(),
            concurrency,
            output = %self.options.output_dir.display(),
            "Starting zone downloads"
        );

        let queue = Arc::new(Mutex::new(TaskQueue::new(links)));

        let mut workers = Vec::with_capacity(concurrency);
        for worker_id in 0..concurrency {
            let ctx = WorkerContext {
                worker_id,
                http: self.client.http().clone(),
                token: self.client.token().clone(),
                authenticator: self.client.authenticator().clone(),
                options: self.options.clone(),
                queue: Arc::clone(&queue),
                cancel: self.cancel.clone(),
            };
            workers.push(tokio::spawn(run_worker(ctx)));
        }

        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Download worker terminated abnormally");
            }
        }

        let mut queue = queue.lock().await;
        if self.cancel.is_cancelled() {
            queue.drain_cancelled(CANCELLED_BEFORE_START);
        }

        let summary = queue.summary();
        tracing::info!(
            done = summary.done,
            failed = summary.failed.len(),
            "Zone downloads complete"
        );
        for failure in &summary.failed {
            tracing::warn!(zone = %failure.zone, reason = %failure.reason, "Failed zone");
        }

        Ok(summary)
    }
}
