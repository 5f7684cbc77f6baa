//! Auth0 Management API HTTP client.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;
use xavyo_sync_engine::annotations::RateLimitDescription;
use xavyo_sync_engine::error::SyncResult;
use xavyo_sync_engine::export::{ExportJob, ExportJobClient, ExportJobStatus, ExportRequest};

use crate::config::Auth0Config;
use crate::error::{Auth0Error, Auth0Result};
use crate::models::{
    Job, JobField, Organization, OrganizationMembersRequest, OrganizationMembersResponse,
    OrganizationsResponse, Paginated, ResourceServer, ResourceServersResponse, Role,
    RolePermission, RolePermissionsResponse, RoleUsersResponse, RolesResponse, User,
    UserRolesRequest, UsersExportRequest, UsersResponse,
};
use crate::rate_limit::{parse_rate_limit, retry_after_secs};

/// Management API path segments.
mod paths {
    pub const API: [&str; 2] = ["api", "v2"];
    pub const USERS: &str = "users";
    pub const ROLES: &str = "roles";
    pub const ORGANIZATIONS: &str = "organizations";
    pub const RESOURCE_SERVERS: &str = "resource-servers";
    pub const JOBS: &str = "jobs";
    pub const USERS_EXPORTS: &str = "users-exports";
    pub const MEMBERS: &str = "members";
    pub const PERMISSIONS: &str = "permissions";
}

/// Fields requested from the users export job.
pub const USER_EXPORT_FIELDS: [&str; 6] = [
    "user_id",
    "name",
    "email",
    "nickname",
    "created_at",
    "updated_at",
];

/// One page of a list endpoint.
#[derive(Debug, Clone)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    /// Size of the whole collection.
    pub total: u64,
    pub rate_limit: Option<RateLimitDescription>,
}

/// Auth0 Management API client.
#[derive(Debug, Clone)]
pub struct Auth0Client {
    http_client: reqwest::Client,
    base_url: Url,
    api_token: SecretString,
}

impl Auth0Client {
    /// Creates a client for the tenant in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be created.
    pub fn new(config: &Auth0Config) -> Auth0Result<Self> {
        let base_url = config.parsed_base_url()?;
        if base_url.cannot_be_a_base() {
            return Err(Auth0Error::Config(format!(
                "base_url cannot be used as a base: {base_url}"
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Auth0Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url,
            api_token: config.api_token.clone(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/api/v2/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Auth0Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Auth0Error::Config(format!("invalid base_url: {}", self.base_url)))?
            .pop_if_empty()
            .extend(paths::API)
            .extend(segments);
        Ok(url)
    }

    /// Sends an authenticated request and maps rate limits and API errors.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Auth0Result<(reqwest::Response, Option<RateLimitDescription>)> {
        let response = request
            .bearer_auth(self.api_token.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let rate_limit = parse_rate_limit(response.headers());

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = retry_after_secs(response.headers(), Utc::now());
            warn!(retry_after_secs, "Auth0 rate limit exceeded");
            return Err(Auth0Error::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Auth0Error::from_response(status.as_u16(), &body));
        }

        Ok((response, rate_limit))
    }

    /// Sends an authenticated request and decodes a JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Auth0Result<(T, Option<RateLimitDescription>)> {
        let (response, rate_limit) = self.execute(request).await?;
        let bytes = response.bytes().await?;
        let body = serde_json::from_slice(&bytes)?;
        Ok((body, rate_limit))
    }

    /// Sends an authenticated request whose response body is ignored.
    async fn send_no_content(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Auth0Result<Option<RateLimitDescription>> {
        let (_, rate_limit) = self.execute(request).await?;
        Ok(rate_limit)
    }

    /// Fetches one page of a list endpoint with totals included.
    #[instrument(skip(self))]
    pub async fn list<R: Paginated>(
        &self,
        segments: &[&str],
        page: u32,
        per_page: u32,
    ) -> Auth0Result<ListPage<R::Item>> {
        let url = self.endpoint(segments)?;
        let request = self.http_client.get(url).query(&[
            ("include_totals", "true".to_string()),
            ("page", page.to_string()),
            ("per_page", per_page.to_string()),
        ]);

        let (response, rate_limit): (R, _) = self.send(request).await?;
        let total = response.page_info().total;
        let items = response.into_items();
        debug!(items = items.len(), total, "Fetched list page");

        Ok(ListPage {
            items,
            total,
            rate_limit,
        })
    }

    pub async fn get_users(&self, page: u32, per_page: u32) -> Auth0Result<ListPage<User>> {
        self.list::<UsersResponse>(&[paths::USERS], page, per_page)
            .await
    }

    pub async fn get_roles(&self, page: u32, per_page: u32) -> Auth0Result<ListPage<Role>> {
        self.list::<RolesResponse>(&[paths::ROLES], page, per_page)
            .await
    }

    pub async fn get_role_users(
        &self,
        role_id: &str,
        page: u32,
        per_page: u32,
    ) -> Auth0Result<ListPage<User>> {
        self.list::<RoleUsersResponse>(&[paths::ROLES, role_id, paths::USERS], page, per_page)
            .await
    }

    pub async fn get_role_permissions(
        &self,
        role_id: &str,
        page: u32,
        per_page: u32,
    ) -> Auth0Result<ListPage<RolePermission>> {
        self.list::<RolePermissionsResponse>(
            &[paths::ROLES, role_id, paths::PERMISSIONS],
            page,
            per_page,
        )
        .await
    }

    pub async fn get_organizations(
        &self,
        page: u32,
        per_page: u32,
    ) -> Auth0Result<ListPage<Organization>> {
        self.list::<OrganizationsResponse>(&[paths::ORGANIZATIONS], page, per_page)
            .await
    }

    pub async fn get_organization_members(
        &self,
        organization_id: &str,
        page: u32,
        per_page: u32,
    ) -> Auth0Result<ListPage<User>> {
        self.list::<OrganizationMembersResponse>(
            &[paths::ORGANIZATIONS, organization_id, paths::MEMBERS],
            page,
            per_page,
        )
        .await
    }

    pub async fn get_resource_servers(
        &self,
        page: u32,
        per_page: u32,
    ) -> Auth0Result<ListPage<ResourceServer>> {
        self.list::<ResourceServersResponse>(&[paths::RESOURCE_SERVERS], page, per_page)
            .await
    }

    /// Fetches a single resource server with its scopes.
    #[instrument(skip(self))]
    pub async fn get_resource_server(
        &self,
        id: &str,
    ) -> Auth0Result<(ResourceServer, Option<RateLimitDescription>)> {
        let url = self.endpoint(&[paths::RESOURCE_SERVERS, id])?;
        self.send(self.http_client.get(url)).await
    }

    /// Assigns a role to a user.
    #[instrument(skip(self))]
    pub async fn add_user_to_role(
        &self,
        role_id: &str,
        user_id: &str,
    ) -> Auth0Result<Option<RateLimitDescription>> {
        let url = self.endpoint(&[paths::USERS, user_id, paths::ROLES])?;
        let body = UserRolesRequest {
            roles: vec![role_id.to_string()],
        };
        self.send_no_content(self.http_client.post(url).json(&body))
            .await
    }

    /// Removes a role from a user.
    #[instrument(skip(self))]
    pub async fn remove_user_from_role(
        &self,
        role_id: &str,
        user_id: &str,
    ) -> Auth0Result<Option<RateLimitDescription>> {
        let url = self.endpoint(&[paths::USERS, user_id, paths::ROLES])?;
        let body = UserRolesRequest {
            roles: vec![role_id.to_string()],
        };
        self.send_no_content(self.http_client.delete(url).json(&body))
            .await
    }

    #[instrument(skip(self))]
    pub async fn add_organization_member(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> Auth0Result<Option<RateLimitDescription>> {
        let url = self.endpoint(&[paths::ORGANIZATIONS, organization_id, paths::MEMBERS])?;
        let body = OrganizationMembersRequest {
            members: vec![user_id.to_string()],
        };
        self.send_no_content(self.http_client.post(url).json(&body))
            .await
    }

    #[instrument(skip(self))]
    pub async fn remove_organization_member(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> Auth0Result<Option<RateLimitDescription>> {
        let url = self.endpoint(&[paths::ORGANIZATIONS, organization_id, paths::MEMBERS])?;
        let body = OrganizationMembersRequest {
            members: vec![user_id.to_string()],
        };
        self.send_no_content(self.http_client.delete(url).json(&body))
            .await
    }

    /// Starts a users export job.
    #[instrument(skip(self, fields))]
    pub async fn create_users_export_job(&self, limit: u32, fields: &[String]) -> Auth0Result<Job> {
        let url = self.endpoint(&[paths::JOBS, paths::USERS_EXPORTS])?;
        let body = UsersExportRequest {
            format: "json".to_string(),
            limit,
            fields: fields
                .iter()
                .map(|name| JobField { name: name.clone() })
                .collect(),
        };

        let (job, _): (Job, _) = self.send(self.http_client.post(url).json(&body)).await?;
        Ok(job)
    }

    #[instrument(skip(self))]
    pub async fn get_job(&self, id: &str) -> Auth0Result<Job> {
        let url = self.endpoint(&[paths::JOBS, id])?;
        let (job, _): (Job, _) = self.send(self.http_client.get(url)).await?;
        Ok(job)
    }

    /// Downloads a finished job's result.
    ///
    /// The location is a pre-signed storage URL, so no bearer token is sent.
    #[instrument(skip(self))]
    pub async fn download_job_result(&self, location: &str) -> Auth0Result<Vec<u8>> {
        let url = Url::parse(location)?;
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Auth0Error::from_response(status.as_u16(), &body));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

fn export_job(job: Job) -> ExportJob {
    let status = match job.status.as_str() {
        "completed" => ExportJobStatus::Completed,
        "failed" => ExportJobStatus::Failed,
        _ => ExportJobStatus::Pending,
    };
    ExportJob {
        id: job.id,
        status,
        result_location: job.location,
    }
}

#[async_trait]
impl ExportJobClient for Auth0Client {
    async fn submit_export_job(&self, request: &ExportRequest) -> SyncResult<ExportJob> {
        let job = self
            .create_users_export_job(request.record_cap, &request.fields)
            .await?;
        Ok(export_job(job))
    }

    async fn poll_export_job(&self, job_id: &str) -> SyncResult<ExportJob> {
        Ok(export_job(self.get_job(job_id).await?))
    }

    async fn fetch_export_result(&self, location: &str) -> SyncResult<Vec<u8>> {
        Ok(self.download_job_result(location).await?)
    }
}
