//! Auth0 connector configuration.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;
use xavyo_sync_engine::export::JobPollConfig;

use crate::error::{Auth0Error, Auth0Result};

/// Configuration for the Auth0 connector.
#[derive(Debug, Clone, Deserialize)]
pub struct Auth0Config {
    /// Tenant domain, e.g. `https://example.us.auth0.com`.
    pub base_url: String,

    /// Management API bearer token.
    pub api_token: SecretString,

    /// Also sync role permissions as grants on scopes.
    #[serde(default)]
    pub sync_permissions: bool,

    /// List users through a bulk export job instead of paging.
    #[serde(default)]
    pub sync_users_by_job: bool,

    /// Record cap passed to the users export job.
    #[serde(default = "default_sync_users_by_job_limit")]
    pub sync_users_by_job_limit: u32,

    /// Page size hint for the first call of each listing.
    #[serde(default)]
    pub page_size: Option<u32>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Seconds to wait between polls of a pending export job.
    #[serde(default = "default_job_poll_interval_secs")]
    pub job_poll_interval_secs: u64,

    /// Pending polls tolerated before an export job is reported as stalled.
    #[serde(default = "default_max_job_poll_attempts")]
    pub max_job_poll_attempts: u32,
}

fn default_sync_users_by_job_limit() -> u32 {
    10_000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_job_poll_interval_secs() -> u64 {
    10
}

fn default_max_job_poll_attempts() -> u32 {
    60
}

impl Auth0Config {
    /// Start building a configuration.
    pub fn builder() -> Auth0ConfigBuilder {
        Auth0ConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Auth0Error::Config` describing the first invalid field.
    pub fn validate(&self) -> Auth0Result<()> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| Auth0Error::Config(format!("base_url is not a valid URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Auth0Error::Config(format!(
                "base_url must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.api_token.expose_secret().trim().is_empty() {
            return Err(Auth0Error::Config("api_token is required".into()));
        }
        if self.sync_users_by_job && self.sync_users_by_job_limit == 0 {
            return Err(Auth0Error::Config(
                "sync_users_by_job_limit must be greater than 0".into(),
            ));
        }
        if self.page_size == Some(0) {
            return Err(Auth0Error::Config("page_size must be greater than 0".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Auth0Error::Config(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.max_job_poll_attempts == 0 {
            return Err(Auth0Error::Config(
                "max_job_poll_attempts must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Parsed base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` does not parse.
    pub fn parsed_base_url(&self) -> Auth0Result<Url> {
        Ok(Url::parse(&self.base_url)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Export job polling policy derived from this configuration.
    pub fn job_poll_config(&self) -> JobPollConfig {
        JobPollConfig {
            retry_after: Duration::from_secs(self.job_poll_interval_secs),
            max_attempts: self.max_job_poll_attempts,
        }
    }
}

/// Builder for [`Auth0Config`].
#[derive(Debug, Default)]
pub struct Auth0ConfigBuilder {
    base_url: Option<String>,
    api_token: Option<SecretString>,
    sync_permissions: bool,
    sync_users_by_job: bool,
    sync_users_by_job_limit: Option<u32>,
    page_size: Option<u32>,
    request_timeout_secs: Option<u64>,
    job_poll_interval_secs: Option<u64>,
    max_job_poll_attempts: Option<u32>,
}

impl Auth0ConfigBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(SecretString::new(token.into()));
        self
    }

    pub fn sync_permissions(mut self, enabled: bool) -> Self {
        self.sync_permissions = enabled;
        self
    }

    pub fn sync_users_by_job(mut self, enabled: bool) -> Self {
        self.sync_users_by_job = enabled;
        self
    }

    pub fn sync_users_by_job_limit(mut self, limit: u32) -> Self {
        self.sync_users_by_job_limit = Some(limit);
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    pub fn job_poll_interval_secs(mut self, secs: u64) -> Self {
        self.job_poll_interval_secs = Some(secs);
        self
    }

    pub fn max_job_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_job_poll_attempts = Some(attempts);
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or invalid.
    pub fn build(self) -> Auth0Result<Auth0Config> {
        let config = Auth0Config {
            base_url: self
                .base_url
                .ok_or_else(|| Auth0Error::Config("base_url is required".into()))?,
            api_token: self
                .api_token
                .ok_or_else(|| Auth0Error::Config("api_token is required".into()))?,
            sync_permissions: self.sync_permissions,
            sync_users_by_job: self.sync_users_by_job,
            sync_users_by_job_limit: self
                .sync_users_by_job_limit
                .unwrap_or_else(default_sync_users_by_job_limit),
            page_size: self.page_size,
            request_timeout_secs: self
                .request_timeout_secs
                .unwrap_or_else(default_request_timeout_secs),
            job_poll_interval_secs: self
                .job_poll_interval_secs
                .unwrap_or_else(default_job_poll_interval_secs),
            max_job_poll_attempts: self
                .max_job_poll_attempts
                .unwrap_or_else(default_max_job_poll_attempts),
        };
        config.validate()?;
        Ok(config)
    }
}
