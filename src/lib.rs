//! # czds-dl
//!
//! Client for the ICANN Centralized Zone Data Service (CZDS): authenticates
//! against the account API, lists the zone files the account is entitled to,
//! downloads them through a bounded worker pool, and fetches the zone
//! request report.
//!
//! ## Design
//!
//! - **Partial-failure isolation** - one bad zone never aborts the batch;
//!   every task settles and the run ends with a summary
//! - **Single re-auth retry** - a 401/403 mid-run refreshes the bearer token
//!   once (for the whole pool, not once per worker) and retries the task
//! - **Cooperative cancellation** - a stop signal aborts in-flight transfers
//!   cleanly and fails pending ones without starting them
//!
//! ## Quick Start
//!
//! ```no_run
//! use czds_dl::{Config, Credentials, CzdsClient, ZoneDownloader};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> czds_dl::Result<()> {
//!     let config = Config::default();
//!     let credentials = Credentials {
//!         username: "user@example.org".to_string(),
//!         password: "secret".to_string(),
//!     };
//!
//!     let client = CzdsClient::connect(&config, credentials).await?;
//!     let links = client.zone_links().await?;
//!
//!     let downloader =
//!         ZoneDownloader::new(client, config.download.clone(), CancellationToken::new());
//!     let summary = downloader.run(links).await?;
//!     println!("{} zones downloaded, {} failed", summary.done, summary.failed.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Authentication and shared token state
pub mod auth;
/// Command-line surface
pub mod cli;
/// Authenticated CZDS API client
pub mod client;
/// Configuration types
pub mod config;
/// Gzip decompression of downloaded zones
pub mod decompress;
/// Core download orchestration
pub mod downloader;
/// Error types
pub mod error;
/// Zone request report handling
pub mod report;
/// Core types
pub mod types;
/// Filename and formatting helpers
pub mod utils;

// Re-export commonly used types
pub use auth::{Authenticator, Credentials, TokenCell};
pub use client::CzdsClient;
pub use config::{Config, DownloadOptions, EndpointConfig, ReportOptions};
pub use downloader::ZoneDownloader;
pub use error::{Error, FetchError, Result};
pub use types::{
    DownloadSummary, FailedDownload, ReportFormat, ReportStatus, TaskStatus, ZoneLink,
};

use tokio_util::sync::CancellationToken;

/// Cancel the given token when a termination signal arrives.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// The listener runs in a background task; in-flight transfers abort at
/// their next suspension point and pending tasks are failed without being
/// started.
pub fn cancel_on_signal(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Stop signal received, cancelling remaining downloads");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
