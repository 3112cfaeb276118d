//! Command-line surface: argument parsing, credential resolution, run driver

use crate::auth::Credentials;
use crate::client::CzdsClient;
use crate::config::{Config, DownloadOptions, ReportOptions};
use crate::downloader::ZoneDownloader;
use crate::error::{Error, Result};
use crate::report;
use crate::types::ReportFormat;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// ICANN API client for the Centralized Zone Data Service
#[derive(Debug, Parser)]
#[command(name = "czds-dl", version, about)]
pub struct Cli {
    /// ICANN account username (prompted when neither flag nor env var is set)
    #[arg(short = 'u', long, env = "CZDS_USER")]
    pub username: Option<String>,

    /// ICANN account password (prompted when neither flag nor env var is set)
    #[arg(short = 'p', long, env = "CZDS_PASS", hide_env_values = true)]
    pub password: Option<String>,

    /// Download zone files
    #[arg(short = 'z', long)]
    pub zones: bool,

    /// Number of concurrent zone downloads
    #[arg(short = 'c', long, default_value_t = 3, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: u16,

    /// Decompress zone files after download
    #[arg(short = 'd', long)]
    pub decompress: bool,

    /// Keep the compressed originals after decompression
    #[arg(short = 'k', long)]
    pub keep: bool,

    /// Download the zone request report
    #[arg(short = 'r', long)]
    pub report: bool,

    /// Scrub the account identity from the report
    #[arg(short = 's', long)]
    pub scrub: bool,

    /// Report output format
    #[arg(short = 'f', long, value_enum, default_value_t = ReportFormat::Csv)]
    pub format: ReportFormat,

    /// Output directory
    #[arg(short = 'o', long, default_value = ".")]
    pub output: PathBuf,
}

impl Cli {
    /// Build the client configuration from the parsed arguments.
    ///
    /// Zone files and the report land in a dated subdirectory of the output
    /// root: `<output>/zones/<YYYY-MM-DD>/`.
    pub fn to_config(&self) -> Config {
        let dated = self
            .output
            .join("zones")
            .join(chrono::Local::now().format("%Y-%m-%d").to_string());

        Config {
            endpoints: Default::default(),
            download: DownloadOptions {
                output_dir: dated,
                concurrency: self.concurrency as usize,
                decompress: self.decompress,
                keep_compressed: self.keep,
            },
            report: ReportOptions {
                scrub: self.scrub,
                format: self.format,
            },
        }
    }
}

/// Execute the parsed command line and return the process exit code.
///
/// Exit code 0 covers every completed run, including one with partial or
/// total download failures; non-zero means a fatal setup failure (bad
/// credentials, unreachable endpoints, output directory creation failure).
pub async fn run(cli: Cli) -> i32 {
    match execute(cli).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "Run aborted");
            1
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    if !cli.zones && !cli.report {
        tracing::warn!("Nothing to do: pass --zones and/or --report");
        return Ok(());
    }

    let credentials = resolve_credentials(&cli)?;
    let config = cli.to_config();
    config.validate()?;

    tokio::fs::create_dir_all(&config.download.output_dir).await?;

    let client = CzdsClient::connect(&config, credentials).await?;

    let cancel = CancellationToken::new();
    crate::cancel_on_signal(cancel.clone());

    if cli.report {
        let destination = config
            .download
            .output_dir
            .join(format!(".report.{}", config.report.format.extension()));
        report::fetch_report(&client, &destination, &config.report).await?;
    }

    if cli.zones {
        let links = client.zone_links().await?;
        let downloader = ZoneDownloader::new(client, config.download.clone(), cancel);
        downloader.run(links).await?;
    }

    Ok(())
}

/// Resolve credentials with fixed precedence: flag > env var > prompt.
///
/// clap's env fallback makes flags win over environment variables by
/// construction; the interactive prompt is the last resort. The password
/// prompt never echoes.
fn resolve_credentials(cli: &Cli) -> Result<Credentials> {
    let username = match &cli.username {
        Some(username) => username.clone(),
        None => prompt_line("ICANN username: ")?,
    };
    let password = match &cli.password {
        Some(password) => password.clone(),
        None => rpassword::prompt_password("ICANN password: ")?,
    };

    if username.is_empty() || password.is_empty() {
        return Err(Error::Config {
            message: "username and password are required".to_string(),
        });
    }

    Ok(Credentials { username, password })
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end().to_string())
}
