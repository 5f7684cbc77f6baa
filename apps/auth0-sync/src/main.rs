//! auth0-sync - Walks an Auth0 tenant and writes its resource graph
//!
//! Every resource type is listed to completion, followed by each resource's
//! entitlements and grants. Output is one JSON object per line on stdout,
//! tagged with `kind` (`resource`, `entitlement` or `grant`); logs go to
//! stderr.

use std::io::BufWriter;
use std::time::Duration;

use clap::Parser;
use xavyo_connector_auth0::{Auth0Config, Auth0Connector};

mod error;
mod logging;
mod runner;

use error::{CliError, CliResult};
use logging::LogFormat;
use runner::SyncRunner;

/// Sync an Auth0 tenant into a resource/entitlement/grant graph
#[derive(Parser, Debug)]
#[command(name = "auth0-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Tenant base URL, e.g. https://example.us.auth0.com
    #[arg(long, env = "AUTH0_BASE_URL")]
    base_url: String,

    /// Management API bearer token
    #[arg(long, env = "AUTH0_API_TOKEN", hide_env_values = true)]
    api_token: String,

    /// Also emit the scopes each role grants
    #[arg(long, env = "AUTH0_SYNC_PERMISSIONS")]
    sync_permissions: bool,

    /// List users through a bulk export job instead of paging
    #[arg(long, env = "AUTH0_SYNC_USERS_BY_JOB")]
    sync_users_by_job: bool,

    /// Maximum users exported by the bulk job
    #[arg(long, env = "AUTH0_SYNC_USERS_BY_JOB_LIMIT")]
    sync_users_by_job_limit: Option<u32>,

    /// Page size hint for list calls
    #[arg(long, env = "AUTH0_PAGE_SIZE")]
    page_size: Option<u32>,

    /// HTTP request timeout in seconds
    #[arg(long, env = "AUTH0_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    /// Seconds to wait between export job polls
    #[arg(long, env = "AUTH0_JOB_POLL_INTERVAL_SECS")]
    job_poll_interval_secs: Option<u64>,

    /// Polls before a pending export job is considered stalled
    #[arg(long, env = "AUTH0_MAX_JOB_POLL_ATTEMPTS")]
    max_job_poll_attempts: Option<u32>,

    /// Only sync this resource type (repeatable)
    #[arg(long = "resource-type", value_name = "TYPE")]
    resource_types: Vec<String>,

    /// Retries for transient errors before giving up
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Base delay in milliseconds between transient retries
    #[arg(long, default_value_t = 1000)]
    retry_backoff_ms: u64,

    /// Log filter directive, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "AUTH0_SYNC_LOG_FORMAT")]
    log_format: LogFormat,
}

impl Cli {
    fn config(&self) -> CliResult<Auth0Config> {
        let mut builder = Auth0Config::builder()
            .base_url(&self.base_url)
            .api_token(&self.api_token)
            .sync_permissions(self.sync_permissions)
            .sync_users_by_job(self.sync_users_by_job);

        if let Some(limit) = self.sync_users_by_job_limit {
            builder = builder.sync_users_by_job_limit(limit);
        }
        if let Some(page_size) = self.page_size {
            builder = builder.page_size(page_size);
        }
        if let Some(secs) = self.request_timeout_secs {
            builder = builder.request_timeout_secs(secs);
        }
        if let Some(secs) = self.job_poll_interval_secs {
            builder = builder.job_poll_interval_secs(secs);
        }
        if let Some(attempts) = self.max_job_poll_attempts {
            builder = builder.max_job_poll_attempts(attempts);
        }

        Ok(builder.build()?)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!(error = %e, exit_code = e.exit_code(), "auth0-sync failed");
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let connector = Auth0Connector::new(cli.config()?)?;

    let stdout = std::io::stdout();
    let stats = SyncRunner::new(&connector, BufWriter::new(stdout.lock()))
        .with_max_retries(cli.max_retries)
        .with_retry_backoff(Duration::from_millis(cli.retry_backoff_ms))
        .run(&cli.resource_types)
        .await?;

    if stats.failed > 0 {
        return Err(CliError::Incomplete {
            failed: stats.failed,
        });
    }
    Ok(())
}
