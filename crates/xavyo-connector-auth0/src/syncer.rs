//! Per-resource-type sync entry points.

use async_trait::async_trait;
use tracing::warn;
use xavyo_sync_engine::annotations::{Annotations, RateLimitDescription};
use xavyo_sync_engine::engine::{SyncEngine, SyncPage};
use xavyo_sync_engine::error::SyncResult;
use xavyo_sync_engine::export::JobPollConfig;
use xavyo_sync_engine::plan::ListingPlan;

use crate::client::Auth0Client;
use crate::error::{Auth0Error, Auth0Result};
use crate::resource::{
    entitlement_id, Entitlement, Grant, Resource, ResourceId, ResourceType, USER,
};

/// Lists one resource type, its entitlements and its grants.
///
/// Every method takes the token returned by its previous call (empty to
/// start) and returns one bounded page plus the next token.
#[async_trait]
pub trait ResourceSyncer: Send + Sync {
    fn resource_type(&self) -> &'static ResourceType;

    async fn list(
        &self,
        parent: Option<&ResourceId>,
        token: &str,
        page_size: Option<u32>,
    ) -> SyncResult<SyncPage<Resource>>;

    async fn entitlements(
        &self,
        resource: &Resource,
        token: &str,
        page_size: Option<u32>,
    ) -> SyncResult<SyncPage<Entitlement>>;

    async fn grants(
        &self,
        resource: &Resource,
        token: &str,
        page_size: Option<u32>,
    ) -> SyncResult<SyncPage<Grant>>;

    /// Write-back for this resource type, if the tenant supports it.
    fn provisioner(&self) -> Option<&dyn ResourceProvisioner> {
        None
    }
}

/// Grants and revokes entitlements of one resource type in the tenant.
///
/// Only users can be principals. Anything else is refused with
/// `Auth0Error::Unsupported` before a request is sent.
#[async_trait]
pub trait ResourceProvisioner: Send + Sync {
    async fn grant(
        &self,
        principal: &ResourceId,
        entitlement: &Entitlement,
    ) -> Auth0Result<Annotations>;

    async fn revoke(&self, grant: &Grant) -> Auth0Result<Annotations>;
}

/// A listing that completes in one call.
pub(crate) fn single_page<R>(records: Vec<R>) -> SyncPage<R> {
    SyncPage {
        records,
        next_token: String::new(),
        annotations: Annotations::new(),
    }
}

/// Refuse principals that are not users.
pub(crate) fn require_user(principal: &ResourceId, action: &str) -> Auth0Result<()> {
    if principal.resource_type == USER.id {
        return Ok(());
    }
    warn!(
        principal_type = %principal.resource_type,
        principal_id = %principal.resource,
        "Only users can be {action}"
    );
    Err(Auth0Error::Unsupported(format!(
        "only users can be {action}, got {principal}"
    )))
}

/// Refuse entitlements other than `slug` on a resource of `expected` type.
pub(crate) fn require_entitlement(
    resource: &ResourceId,
    id: &str,
    expected: &ResourceType,
    slug: &str,
) -> Auth0Result<()> {
    if resource.resource_type == expected.id && id == entitlement_id(resource, slug) {
        return Ok(());
    }
    Err(Auth0Error::Unsupported(format!(
        "entitlement {id} is not a {} {slug} entitlement",
        expected.id
    )))
}

pub(crate) fn annotated(rate_limit: Option<RateLimitDescription>) -> Annotations {
    let mut annotations = Annotations::new();
    annotations.with_rate_limit(rate_limit);
    annotations
}

/// Run one engine step of `plan` against `client`.
pub(crate) async fn run<P: ListingPlan>(
    plan: &P,
    client: &Auth0Client,
    poll_config: &JobPollConfig,
    token: &str,
    page_size: Option<u32>,
) -> SyncResult<SyncPage<P::Record>> {
    SyncEngine::new(plan)
        .with_export_client(client)
        .with_poll_config(poll_config.clone())
        .sync(token, page_size)
        .await
}
