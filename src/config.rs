//! Configuration types for czds-dl

use crate::error::{Error, Result};
use crate::types::ReportFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// API endpoint configuration
///
/// Both bases default to the production ICANN services; tests point them at
/// a local mock server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base URL of the authentication service (default: ICANN account API)
    #[serde(default = "default_auth_base")]
    pub auth_base_url: String,

    /// Base URL of the CZDS API (default: ICANN CZDS API)
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            auth_base_url: default_auth_base(),
            api_base_url: default_api_base(),
        }
    }
}

/// Zone download behavior (destination, concurrency, post-transfer handling)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadOptions {
    /// Directory zone files are written into
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum simultaneous in-flight transfers (default: 3, minimum: 1)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Decompress each successfully downloaded zone file in place
    #[serde(default)]
    pub decompress: bool,

    /// Keep the compressed original after decompression
    #[serde(default)]
    pub keep_compressed: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
            decompress: false,
            keep_compressed: false,
        }
    }
}

/// Zone report retrieval behavior
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReportOptions {
    /// Replace the requester's account identifier with a placeholder in
    /// every row
    #[serde(default)]
    pub scrub: bool,

    /// Output format (default: csv, the API's native form)
    #[serde(default)]
    pub format: ReportFormat,
}

/// Main configuration for the CZDS client
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// API endpoints
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Zone download settings
    #[serde(default)]
    pub download: DownloadOptions,

    /// Report settings
    #[serde(default)]
    pub report: ReportOptions,
}

impl Config {
    /// Validate settings that serde defaults cannot enforce
    pub fn validate(&self) -> Result<()> {
        if self.download.concurrency < 1 {
            return Err(Error::Config {
                message: format!(
                    "concurrency must be at least 1, got {}",
                    self.download.concurrency
                ),
            });
        }
        if self.endpoints.auth_base_url.is_empty() || self.endpoints.api_base_url.is_empty() {
            return Err(Error::Config {
                message: "endpoint base URLs must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn default_auth_base() -> String {
    "https://account-api.icann.org".to_string()
}

fn default_api_base() -> String {
    "https://czds-api.icann.org".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_concurrency() -> usize {
    3
}
