//! Roles, their `assigned` entitlement and role grants.
//!
//! Role grants run in two phases: the users assigned to the role, then
//! (with `sync_permissions`) the resource server permissions the role
//! carries, emitted as the role holding each scope's `assigned` entitlement.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use xavyo_sync_engine::annotations::Annotations;
use xavyo_sync_engine::engine::SyncPage;
use xavyo_sync_engine::error::SyncResult;
use xavyo_sync_engine::export::JobPollConfig;
use xavyo_sync_engine::phase::SinglePhase;
use xavyo_sync_engine::plan::{ListingPlan, PageResult};

use crate::client::Auth0Client;
use crate::models::Role;
use crate::resource::{
    Entitlement, Grant, Resource, ResourceId, ResourceType, TraitData, ROLE, SCOPE, USER,
};
use crate::scopes::scope_id;
use crate::error::Auth0Result;
use crate::syncer::{
    annotated, require_entitlement, require_user, run, single_page, ResourceProvisioner,
    ResourceSyncer,
};

/// Entitlement slug for role membership.
pub const ROLE_ENTITLEMENT: &str = "assigned";

pub fn role_resource(role: &Role, parent: Option<&ResourceId>) -> Resource {
    Resource::new(&ROLE, &role.id, &role.name)
        .with_description(role.description.clone())
        .with_parent(parent.cloned())
        .with_profile("id", role.id.as_str())
        .with_profile("name", role.name.as_str())
        .with_profile("description", role.description.clone())
        .with_trait(TraitData::Role)
}

struct RoleListing<'a> {
    client: &'a Auth0Client,
    parent: Option<&'a ResourceId>,
}

#[async_trait]
impl<'a> ListingPlan for RoleListing<'a> {
    type Kind = SinglePhase;
    type Record = Resource;

    async fn fetch_page(
        &self,
        _kind: &SinglePhase,
        page: u32,
        page_size: u32,
    ) -> SyncResult<PageResult<Resource, SinglePhase>> {
        let roles = self.client.get_roles(page, page_size).await?;
        let records = roles
            .items
            .iter()
            .map(|role| role_resource(role, self.parent))
            .collect();
        Ok(PageResult::new(records, roles.total).with_rate_limit(roles.rate_limit))
    }
}

/// Phases of a role's grant listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleGrantPhase {
    /// Users assigned to the role.
    #[default]
    Members,
    /// Scopes the role confers.
    Permissions,
}

struct RoleGrantListing<'a> {
    client: &'a Auth0Client,
    role: &'a ResourceId,
    sync_permissions: bool,
}

#[async_trait]
impl<'a> ListingPlan for RoleGrantListing<'a> {
    type Kind = RoleGrantPhase;
    type Record = Grant;

    async fn fetch_page(
        &self,
        kind: &RoleGrantPhase,
        page: u32,
        page_size: u32,
    ) -> SyncResult<PageResult<Grant, RoleGrantPhase>> {
        match kind {
            RoleGrantPhase::Members => {
                let users = self
                    .client
                    .get_role_users(&self.role.resource, page, page_size)
                    .await?;
                let grants = users
                    .items
                    .iter()
                    .map(|user| {
                        Grant::new(
                            self.role,
                            ROLE_ENTITLEMENT,
                            ResourceId::new(&USER, &user.user_id),
                        )
                    })
                    .collect();
                Ok(PageResult::new(grants, users.total).with_rate_limit(users.rate_limit))
            }
            RoleGrantPhase::Permissions => {
                let permissions = self
                    .client
                    .get_role_permissions(&self.role.resource, page, page_size)
                    .await?;
                let grants = permissions
                    .items
                    .iter()
                    .map(|permission| {
                        let scope = ResourceId::new(
                            &SCOPE,
                            scope_id(
                                &permission.resource_server_identifier,
                                &permission.permission_name,
                            ),
                        );
                        Grant::new(&scope, ROLE_ENTITLEMENT, self.role.clone())
                    })
                    .collect();
                Ok(PageResult::new(grants, permissions.total)
                    .with_rate_limit(permissions.rate_limit))
            }
        }
    }

    fn successors(&self, completed: &RoleGrantPhase) -> Vec<RoleGrantPhase> {
        match completed {
            RoleGrantPhase::Members if self.sync_permissions => vec![RoleGrantPhase::Permissions],
            _ => Vec::new(),
        }
    }
}

/// Syncs Auth0 roles.
pub struct RoleSyncer {
    client: Arc<Auth0Client>,
    poll_config: JobPollConfig,
    sync_permissions: bool,
}

impl RoleSyncer {
    pub fn new(client: Arc<Auth0Client>, poll_config: JobPollConfig) -> Self {
        Self {
            client,
            poll_config,
            sync_permissions: false,
        }
    }

    /// Include the permissions phase in role grants.
    pub fn with_permissions(mut self, enabled: bool) -> Self {
        self.sync_permissions = enabled;
        self
    }
}

#[async_trait]
impl ResourceSyncer for RoleSyncer {
    fn resource_type(&self) -> &'static ResourceType {
        &ROLE
    }

    #[instrument(skip(self, token))]
    async fn list(
        &self,
        parent: Option<&ResourceId>,
        token: &str,
        page_size: Option<u32>,
    ) -> SyncResult<SyncPage<Resource>> {
        let plan = RoleListing {
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
        let entitlement = Entitlement::assignment(resource, ROLE_ENTITLEMENT)
            .grantable_to(&USER)
            .with_description(format!("Assigned {} role in Auth0", resource.display_name));
        Ok(single_page(vec![entitlement]))
    }

    #[instrument(skip(self, resource, token), fields(role = %resource.id.resource))]
    async fn grants(
        &self,
        resource: &Resource,
        token: &str,
        page_size: Option<u32>,
    ) -> SyncResult<SyncPage<Grant>> {
        let plan = RoleGrantListing {
            client: &self.client,
            role: &resource.id,
            sync_permissions: self.sync_permissions,
        };
        run(&plan, &self.client, &self.poll_config, token, page_size).await
    }

    fn provisioner(&self) -> Option<&dyn ResourceProvisioner> {
        Some(self)
    }
}

#[async_trait]
impl ResourceProvisioner for RoleSyncer {
    #[instrument(skip(self, entitlement), fields(entitlement = %entitlement.id))]
    async fn grant(
        &self,
        principal: &ResourceId,
        entitlement: &Entitlement,
    ) -> Auth0Result<Annotations> {
        require_user(principal, "granted role membership")?;
        require_entitlement(&entitlement.resource, &entitlement.id, &ROLE, ROLE_ENTITLEMENT)?;

        let rate_limit = self
            .client
            .add_user_to_role(&entitlement.resource.resource, &principal.resource)
            .await?;
        info!(role = %entitlement.resource.resource, user = %principal.resource, "Role assigned");
        Ok(annotated(rate_limit))
    }

    #[instrument(skip(self, grant), fields(grant = %grant.id))]
    async fn revoke(&self, grant: &Grant) -> Auth0Result<Annotations> {
        require_user(&grant.principal, "revoked role membership")?;
        require_entitlement(&grant.resource, &grant.entitlement_id, &ROLE, ROLE_ENTITLEMENT)?;

        let rate_limit = self
            .client
            .remove_user_from_role(&grant.resource.resource, &grant.principal.resource)
            .await?;
        info!(role = %grant.resource.resource, user = %grant.principal.resource, "Role revoked");
        Ok(annotated(rate_limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_resource() {
        let role = Role {
            id: "rol_1".into(),
            name: "Admin".into(),
            description: Some("Full access".into()),
        };
        let resource = role_resource(&role, None);
        assert_eq!(resource.id, ResourceId::new(&ROLE, "rol_1"));
        assert_eq!(resource.display_name, "Admin");
        assert_eq!(resource.description.as_deref(), Some("Full access"));
        assert_eq!(resource.trait_data, Some(TraitData::Role));
    }

    #[test]
    fn test_empty_description_dropped() {
        let role = Role {
            id: "rol_2".into(),
            name: "Viewer".into(),
            description: Some(String::new()),
        };
        assert!(role_resource(&role, None).description.is_none());
    }

    #[test]
    fn test_phase_serialization() {
        assert_eq!(
            serde_json::to_string(&RoleGrantPhase::Permissions).unwrap(),
            "\"permissions\""
        );
    }
}
