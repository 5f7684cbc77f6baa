//! Permission scopes defined by resource servers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;
use xavyo_sync_engine::engine::SyncPage;
use xavyo_sync_engine::error::SyncResult;
use xavyo_sync_engine::export::JobPollConfig;
use xavyo_sync_engine::phase::SinglePhase;
use xavyo_sync_engine::plan::{ListingPlan, PageResult};

use crate::client::Auth0Client;
use crate::models::{ResourceServer, ResourceServerScope};
use crate::resource::{
    Entitlement, Grant, Resource, ResourceId, ResourceType, RESOURCE_SERVER, ROLE, SCOPE,
};
use crate::syncer::{run, single_page, ResourceSyncer};

/// Entitlement slug held by roles that confer a scope.
pub const SCOPE_ENTITLEMENT: &str = "assigned";

/// Scope ids are unique only within their resource server.
pub fn scope_id(server_identifier: &str, value: &str) -> String {
    format!("{server_identifier}:{value}")
}

pub fn scope_resource(scope: &ResourceServerScope, server: &ResourceServer) -> Resource {
    Resource::new(
        &SCOPE,
        scope_id(&server.identifier, &scope.value),
        format!("{}/{}", server.name, scope.value),
    )
    .with_description(scope.description.clone())
    .with_parent(Some(ResourceId::new(&RESOURCE_SERVER, &server.id)))
}

/// Pages over resource servers and flattens their scopes.
struct ScopeListing<'a> {
    client: &'a Auth0Client,
}

#[async_trait]
impl<'a> ListingPlan for ScopeListing<'a> {
    type Kind = SinglePhase;
    type Record = Resource;

    async fn fetch_page(
        &self,
        _kind: &SinglePhase,
        page: u32,
        page_size: u32,
    ) -> SyncResult<PageResult<Resource, SinglePhase>> {
        let servers = self.client.get_resource_servers(page, page_size).await?;
        let records = servers
            .items
            .iter()
            .flat_map(|server| {
                server
                    .scopes
                    .iter()
                    .map(move |scope| scope_resource(scope, server))
            })
            .collect();
        Ok(PageResult::new(records, servers.total)
            .with_fetched(servers.items.len())
            .with_rate_limit(servers.rate_limit))
    }
}

/// Syncs scopes. Their grants come from the role permissions phase.
pub struct ScopeSyncer {
    client: Arc<Auth0Client>,
    poll_config: JobPollConfig,
}

impl ScopeSyncer {
    pub fn new(client: Arc<Auth0Client>, poll_config: JobPollConfig) -> Self {
        Self {
            client,
            poll_config,
        }
    }
}

#[async_trait]
impl ResourceSyncer for ScopeSyncer {
    fn resource_type(&self) -> &'static ResourceType {
        &SCOPE
    }

    #[instrument(skip(self, token))]
    async fn list(
        &self,
        _parent: Option<&ResourceId>,
        token: &str,
        page_size: Option<u32>,
    ) -> SyncResult<SyncPage<Resource>> {
        let plan = ScopeListing {
            client: &self.client,
        };
        run(&plan, &self.client, &self.poll_config, token, page_size).await
    }

    async fn entitlements(
        &self,
        resource: &Resource,
        _token: &str,
        _page_size: Option<u32>,
    ) -> SyncResult<SyncPage<Entitlement>> {
        let entitlement = Entitlement::permission(resource, SCOPE_ENTITLEMENT)
            .grantable_to(&ROLE)
            .with_display_name(format!("{} assigned", resource.display_name))
            .with_description(format!(
                "Roles granted the {} permission in Auth0",
                resource.display_name
            ));
        Ok(single_page(vec![entitlement]))
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
