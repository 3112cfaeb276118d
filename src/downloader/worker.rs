//! Worker loop: claim, transfer, decompress, settle.

use super::queue::TaskQueue;
use crate::auth::{Authenticator, TokenCell};
use crate::client::body_snippet;
use crate::config::DownloadOptions;
use crate::decompress::gzip_decompress;
use crate::error::{Error, FetchError, Result};
use crate::types::ZoneLink;
use crate::utils::{filename_from_response, humanize_bytes};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Everything one worker needs, cloned per worker from the orchestrator
#[derive(Clone)]
pub(super) struct WorkerContext {
    pub(super) worker_id: usize,
    pub(super) http: reqwest::Client,
    pub(super) token: TokenCell,
    pub(super) authenticator: Authenticator,
    pub(super) options: DownloadOptions,
    pub(super) queue: Arc<Mutex<TaskQueue>>,
    pub(super) cancel: CancellationToken,
}

/// Claim pending tasks until the queue is empty or a stop signal arrives.
///
/// Each iteration claims exactly one task under the queue lock, performs the
/// transfer, and settles the task to a terminal state. A 401/403 rejection
/// of a first-claim task is requeued once after a token refresh; every other
/// failure is terminal for that task only.
pub(super) async fn run_worker(ctx: WorkerContext) {
    loop {
        let claimed = {
            let mut queue = ctx.queue.lock().await;
            if ctx.cancel.is_cancelled() {
                None
            } else {
                queue.claim()
            }
        };
        let Some((id, link)) = claimed else {
            break;
        };

        // Blocks here while another worker holds the refresh write lock, so
        // no transfer starts with a token known to be stale.
        let token = ctx.token.current().await;

        match execute_task(&ctx, &link, &token).await {
            Ok(path) => {
                tracing::info!(
                    worker = ctx.worker_id,
                    zone = link.name(),
                    path = %path.display(),
                    "Zone download complete"
                );
                ctx.queue.lock().await.settle_done(id);
            }
            Err(e) if e.is_auth_expired() => {
                let first_rejection = { ctx.queue.lock().await.claims(id) } < 2;
                if first_rejection {
                    match ctx.token.refresh(&token, &ctx.authenticator).await {
                        Ok(_) => {
                            tracing::debug!(
                                worker = ctx.worker_id,
                                zone = link.name(),
                                "Requeueing after token refresh"
                            );
                            ctx.queue.lock().await.requeue(id);
                        }
                        Err(refresh_err) => {
                            ctx.queue
                                .lock()
                                .await
                                .settle_failed(id, refresh_err.to_string());
                        }
                    }
                } else {
                    ctx.queue
                        .lock()
                        .await
                        .settle_failed(id, format!("token rejected after refresh: {e}"));
                }
            }
            Err(e) => {
                tracing::warn!(
                    worker = ctx.worker_id,
                    zone = link.name(),
                    error = %e,
                    "Zone download failed"
                );
                ctx.queue.lock().await.settle_failed(id, e.to_string());
            }
        }
    }
}

/// Transfer one zone, then decompress it when requested.
async fn execute_task(ctx: &WorkerContext, link: &ZoneLink, token: &str) -> Result<PathBuf> {
    let (path, size) = transfer(ctx, link, token).await?;
    tracing::debug!(
        zone = link.name(),
        size = %humanize_bytes(size),
        "Transfer finished"
    );

    if ctx.options.decompress && path.extension().and_then(|e| e.to_str()) == Some("gz") {
        return gzip_decompress(&path, ctx.options.keep_compressed).await;
    }

    Ok(path)
}

/// Stream the zone body to disk.
///
/// The body goes to a hidden `.part` file which is renamed into place only
/// after the full advertised length has arrived, so a failed or aborted
/// transfer leaves nothing at the destination path.
async fn transfer(ctx: &WorkerContext, link: &ZoneLink, token: &str) -> Result<(PathBuf, u64)> {
    let response = tokio::select! {
        _ = ctx.cancel.cancelled() => return Err(Error::Cancelled),
        response = ctx.http.get(link.as_str()).bearer_auth(token).send() => response?,
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Fetch(FetchError::Status {
            url: link.to_string(),
            status: status.as_u16(),
            body: body_snippet(&body),
        }));
    }

    let filename =
        filename_from_response(&response, link.as_str()).ok_or(FetchError::MissingFilename {
            url: link.to_string(),
        })?;
    let destination = ctx.options.output_dir.join(&filename);
    let part = ctx.options.output_dir.join(format!(".{filename}.part"));

    let expected = response.content_length();
    let received = match stream_to_file(response, &part, &ctx.cancel).await {
        Ok(received) => received,
        Err(e) => {
            tokio::fs::remove_file(&part).await.ok();
            return Err(e);
        }
    };

    if let Some(expected) = expected
        && received != expected
    {
        tokio::fs::remove_file(&part).await.ok();
        return Err(Error::Fetch(FetchError::Truncated {
            url: link.to_string(),
            expected,
            received,
        }));
    }

    if let Err(e) = tokio::fs::rename(&part, &destination).await {
        tokio::fs::remove_file(&part).await.ok();
        return Err(e.into());
    }

    Ok((destination, received))
}

async fn stream_to_file(
    response: reqwest::Response,
    part: &std::path::Path,
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut file = tokio::fs::File::create(part).await?;
    let mut stream = response.bytes_stream();
    let mut received: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            chunk = stream.next() => match chunk {
                Some(chunk) => {
                    let chunk = chunk?;
                    file.write_all(&chunk).await?;
                    received += chunk.len() as u64;
                }
                None => break,
            },
        }
    }

    file.flush().await?;
    Ok(received)
}
