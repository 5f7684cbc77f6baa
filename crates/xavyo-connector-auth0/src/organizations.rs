//! Organizations and their members.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};
use xavyo_sync_engine::annotations::Annotations;
use xavyo_sync_engine::engine::SyncPage;
use xavyo_sync_engine::error::SyncResult;
use xavyo_sync_engine::export::JobPollConfig;
use xavyo_sync_engine::phase::SinglePhase;
use xavyo_sync_engine::plan::{ListingPlan, PageResult};

use crate::client::Auth0Client;
use crate::models::Organization;
use crate::resource::{
    Entitlement, Grant, Resource, ResourceId, ResourceType, TraitData, ORGANIZATION, USER,
};
use crate::error::Auth0Result;
use crate::syncer::{
    annotated, require_entitlement, require_user, run, single_page, ResourceProvisioner,
    ResourceSyncer,
};

/// Entitlement slug for organization membership.
pub const MEMBER_ENTITLEMENT: &str = "member";

pub fn organization_resource(org: &Organization, parent: Option<&ResourceId>) -> Resource {
    let display_name = org
        .display_name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| org.name.clone());

    Resource::new(&ORGANIZATION, &org.id, display_name)
        .with_parent(parent.cloned())
        .with_profile("id", org.id.as_str())
        .with_profile("name", org.name.as_str())
        .with_profile("display_name", org.display_name.clone())
        .with_trait(TraitData::Group)
}

struct OrganizationListing<'a> {
    client: &'a Auth0Client,
    parent: Option<&'a ResourceId>,
}

#[async_trait]
impl<'a> ListingPlan for OrganizationListing<'a> {
    type Kind = SinglePhase;
    type Record = Resource;

    async fn fetch_page(
        &self,
        _kind: &SinglePhase,
        page: u32,
        page_size: u32,
    ) -> SyncResult<PageResult<Resource, SinglePhase>> {
        let orgs = self.client.get_organizations(page, page_size).await?;
        let records = orgs
            .items
            .iter()
            .map(|org| organization_resource(org, self.parent))
            .collect();
        Ok(PageResult::new(records, orgs.total).with_rate_limit(orgs.rate_limit))
    }
}

struct MemberListing<'a> {
    client: &'a Auth0Client,
    organization: &'a ResourceId,
}

#[async_trait]
impl<'a> ListingPlan for MemberListing<'a> {
    type Kind = SinglePhase;
    type Record = Grant;

    async fn fetch_page(
        &self,
        _kind: &SinglePhase,
        page: u32,
        page_size: u32,
    ) -> SyncResult<PageResult<Grant, SinglePhase>> {
        let members = self
            .client
            .get_organization_members(&self.organization.resource, page, page_size)
            .await?;
        let grants = members
            .items
            .iter()
            .map(|user| {
                Grant::new(
                    self.organization,
                    MEMBER_ENTITLEMENT,
                    ResourceId::new(&USER, &user.user_id),
                )
            })
            .collect();
        Ok(PageResult::new(grants, members.total).with_rate_limit(members.rate_limit))
    }
}

/// Syncs Auth0 organizations.
pub struct OrganizationSyncer {
    client: Arc<Auth0Client>,
    poll_config: JobPollConfig,
}

impl OrganizationSyncer {
    pub fn new(client: Arc<Auth0Client>, poll_config: JobPollConfig) -> Self {
        Self {
            client,
            poll_config,
        }
    }
}

#[async_trait]
impl ResourceSyncer for OrganizationSyncer {
    fn resource_type(&self) -> &'static ResourceType {
        &ORGANIZATION
    }

    #[instrument(skip(self, token))]
    async fn list(
        &self,
        parent: Option<&ResourceId>,
        token: &str,
        page_size: Option<u32>,
    ) -> SyncResult<SyncPage<Resource>> {
        let plan = OrganizationListing {
            client: &self.client,
            parent,
        };
        run(&plan, &self.client, &self.poll_config, token, page_size).await
    }

    async fn entitlements(
        &self,
        resource: &Resource,
        _token: &str,
        _page_size: Option<u32>,
    ) -> SyncResult<SyncPage<Entitlement>> {
        let entitlement = Entitlement::assignment(resource, MEMBER_ENTITLEMENT)
            .grantable_to(&USER)
            .with_description(format!("Member of the {} organization", resource.display_name));
        Ok(single_page(vec![entitlement]))
    }

    #[instrument(skip(self, resource, token), fields(organization = %resource.id.resource))]
    async fn grants(
        &self,
        resource: &Resource,
        token: &str,
        page_size: Option<u32>,
    ) -> SyncResult<SyncPage<Grant>> {
        let plan = MemberListing {
            client: &self.client,
            organization: &resource.id,
        };
        run(&plan, &self.client, &self.poll_config, token, page_size).await
    }

    fn provisioner(&self) -> Option<&dyn ResourceProvisioner> {
        Some(self)
    }
}

#[async_trait]
impl ResourceProvisioner for OrganizationSyncer {
    #[instrument(skip(self, entitlement), fields(entitlement = %entitlement.id))]
    async fn grant(
        &self,
        principal: &ResourceId,
        entitlement: &Entitlement,
    ) -> Auth0Result<Annotations> {
        require_user(principal, "granted organization membership")?;
        require_entitlement(
            &entitlement.resource,
            &entitlement.id,
            &ORGANIZATION,
            MEMBER_ENTITLEMENT,
        )?;

        let rate_limit = self
            .client
            .add_organization_member(&entitlement.resource.resource, &principal.resource)
            .await?;
        info!(
            organization = %entitlement.resource.resource,
            user = %principal.resource,
            "Organization member added"
        );
        Ok(annotated(rate_limit))
    }

    #[instrument(skip(self, grant), fields(grant = %grant.id))]
    async fn revoke(&self, grant: &Grant) -> Auth0Result<Annotations> {
        require_user(&grant.principal, "revoked organization membership")?;
        require_entitlement(
            &grant.resource,
            &grant.entitlement_id,
            &ORGANIZATION,
            MEMBER_ENTITLEMENT,
        )?;

        let rate_limit = self
            .client
            .remove_organization_member(&grant.resource.resource, &grant.principal.resource)
            .await?;
        info!(
            organization = %grant.resource.resource,
            user = %grant.principal.resource,
            "Organization member removed"
        );
        Ok(annotated(rate_limit))
    }
}
