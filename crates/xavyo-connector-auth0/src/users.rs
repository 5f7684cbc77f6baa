//! User listing, paged or through a bulk export job.
//!
//! Paged listing of `/api/v2/users` cannot reach past the first 1000 users,
//! so large tenants enable `sync_users_by_job` and receive every user from
//! one export job instead.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;
use xavyo_sync_engine::engine::SyncPage;
use xavyo_sync_engine::error::SyncResult;
use xavyo_sync_engine::export::{ExportRequest, JobPollConfig};
use xavyo_sync_engine::phase::SinglePhase;
use xavyo_sync_engine::plan::{ListingPlan, PageResult, Strategy};

use crate::client::{Auth0Client, USER_EXPORT_FIELDS};
use crate::models::User;
use crate::resource::{
    split_full_name, Entitlement, Grant, Resource, ResourceId, ResourceType, TraitData,
    UserStatus, USER,
};
use crate::syncer::{run, single_page, ResourceSyncer};

/// Build the user resource for an Auth0 user.
pub fn user_resource(user: &User, parent: Option<&ResourceId>) -> Resource {
    let (first_name, last_name) = split_full_name(user.name.as_deref().unwrap_or_default());
    let display_name = user
        .nickname
        .clone()
        .or_else(|| user.email.clone())
        .unwrap_or_else(|| user.user_id.clone());

    Resource::new(&USER, &user.user_id, display_name)
        .with_parent(parent.cloned())
        .with_profile("id", user.user_id.as_str())
        .with_profile("email", user.email.clone())
        .with_profile("first_name", first_name)
        .with_profile("last_name", last_name)
        .with_profile("nickname", user.nickname.clone())
        .with_trait(TraitData::User {
            email: user.email.clone(),
            login: user.email.clone(),
            status: UserStatus::Enabled,
            created_at: user.created_at,
        })
}

struct UserListing<'a> {
    client: &'a Auth0Client,
    parent: Option<&'a ResourceId>,
    export: Option<ExportRequest>,
}

#[async_trait]
impl<'a> ListingPlan for UserListing<'a> {
    type Kind = SinglePhase;
    type Record = Resource;

    fn strategy(&self, _kind: &SinglePhase) -> Strategy {
        match &self.export {
            Some(request) => Strategy::Export(request.clone()),
            None => Strategy::Paged,
        }
    }

    async fn fetch_page(
        &self,
        _kind: &SinglePhase,
        page: u32,
        page_size: u32,
    ) -> SyncResult<PageResult<Resource, SinglePhase>> {
        let users = self.client.get_users(page, page_size).await?;
        let records = users
            .items
            .iter()
            .map(|user| user_resource(user, self.parent))
            .collect();
        Ok(PageResult::new(records, users.total).with_rate_limit(users.rate_limit))
    }

    fn from_export_row(&self, _kind: &SinglePhase, row: Value) -> Result<Resource, String> {
        let user: User = serde_json::from_value(row).map_err(|e| e.to_string())?;
        Ok(user_resource(&user, self.parent))
    }
}

/// Syncs Auth0 users. Users hold no entitlements of their own.
pub struct UserSyncer {
    client: Arc<Auth0Client>,
    poll_config: JobPollConfig,
    export: Option<ExportRequest>,
}

impl UserSyncer {
    pub fn new(client: Arc<Auth0Client>, poll_config: JobPollConfig) -> Self {
        Self {
            client,
            poll_config,
            export: None,
        }
    }

    /// List users through an export job capped at `limit` records.
    pub fn with_export_job(mut self, limit: u32) -> Self {
        self.export = Some(ExportRequest::new(USER_EXPORT_FIELDS, limit));
        self
    }
}

#[async_trait]
impl ResourceSyncer for UserSyncer {
    fn resource_type(&self) -> &'static ResourceType {
        &USER
    }

    #[instrument(skip(self, token), fields(by_job = self.export.is_some()))]
    async fn list(
        &self,
        parent: Option<&ResourceId>,
        token: &str,
        page_size: Option<u32>,
    ) -> SyncResult<SyncPage<Resource>> {
        let plan = UserListing {
            client: &self.client,
            parent,
            export: self.export.clone(),
        };
        run(&plan, &self.client, &self.poll_config, token, page_size).await
    }

    async fn entitlements(
        &self,
        _resource: &Resource,
        _token: &str,
        _page_size: Option<u32>,
    ) -> SyncResult<SyncPage<Entitlement>> {
        Ok(single_page(Vec::new()))
    }

    async fn grants(
        &self,
        _resource: &Resource,
        _token: &str,
        _page_size: Option<u32>,
    ) -> SyncResult<SyncPage<Grant>> {
        Ok(single_page(Vec::new()))
    }
}
