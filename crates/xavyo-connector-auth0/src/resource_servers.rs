//! Resource servers (APIs) and the scopes they define.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;
use xavyo_sync_engine::engine::SyncPage;
use xavyo_sync_engine::error::SyncResult;
use xavyo_sync_engine::export::JobPollConfig;
use xavyo_sync_engine::phase::SinglePhase;
use xavyo_sync_engine::plan::{ListingPlan, PageResult};

use crate::client::Auth0Client;
use crate::models::ResourceServer;
use crate::resource::{
    Entitlement, Grant, Resource, ResourceId, ResourceType, RESOURCE_SERVER, SCOPE,
};
use crate::scopes::scope_id;
use crate::syncer::{run, single_page, ResourceSyncer};

/// Entitlement slug linking a resource server to its scopes.
pub const RESOURCE_SERVER_ENTITLEMENT: &str = "scope";

pub fn resource_server_resource(server: &ResourceServer, parent: Option<&ResourceId>) -> Resource {
    Resource::new(&RESOURCE_SERVER, &server.id, &server.name)
        .with_parent(parent.cloned())
        .with_profile("identifier", server.identifier.as_str())
}

struct ResourceServerListing<'a> {
    client: &'a Auth0Client,
    parent: Option<&'a ResourceId>,
}

#[async_trait]
impl<'a> ListingPlan for ResourceServerListing<'a> {
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
            .map(|server| resource_server_resource(server, self.parent))
            .collect();
        Ok(PageResult::new(records, servers.total).with_rate_limit(servers.rate_limit))
    }
}

/// One server's scopes, read from a single unpaged response.
struct ServerScopeListing<'a> {
    client: &'a Auth0Client,
    server: &'a ResourceId,
}

#[async_trait]
impl<'a> ListingPlan for ServerScopeListing<'a> {
    type Kind = SinglePhase;
    type Record = Grant;

    async fn fetch_page(
        &self,
        _kind: &SinglePhase,
        _page: u32,
        _page_size: u32,
    ) -> SyncResult<PageResult<Grant, SinglePhase>> {
        let (server, rate_limit) = self.client.get_resource_server(&self.server.resource).await?;
        let grants = server
            .scopes
            .iter()
            .map(|scope| {
                Grant::new(
                    self.server,
                    RESOURCE_SERVER_ENTITLEMENT,
                    ResourceId::new(&SCOPE, scope_id(&server.identifier, &scope.value)),
                )
            })
            .collect();
        // The response holds every scope, so there is never a second page.
        Ok(PageResult::new(grants, 0).with_rate_limit(rate_limit))
    }
}

/// Syncs resource servers.
pub struct ResourceServerSyncer {
    client: Arc<Auth0Client>,
    poll_config: JobPollConfig,
}

impl ResourceServerSyncer {
    pub fn new(client: Arc<Auth0Client>, poll_config: JobPollConfig) -> Self {
        Self {
            client,
            poll_config,
        }
    }
}

#[async_trait]
impl ResourceSyncer for ResourceServerSyncer {
    fn resource_type(&self) -> &'static ResourceType {
        &RESOURCE_SERVER
    }

    #[instrument(skip(self, token))]
    async fn list(
        &self,
        parent: Option<&ResourceId>,
        token: &str,
        page_size: Option<u32>,
    ) -> SyncResult<SyncPage<Resource>> {
        let plan = ResourceServerListing {
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
        let entitlement = Entitlement::permission(resource, RESOURCE_SERVER_ENTITLEMENT)
            .grantable_to(&SCOPE)
            .with_display_name("Scope")
            .with_description(
                "The scope of the resource server, which defines the permissions granted to the resource server.",
            )
            .immutable();
        Ok(single_page(vec![entitlement]))
    }

    #[instrument(skip(self, resource, token), fields(server = %resource.id.resource))]
    async fn grants(
        &self,
        resource: &Resource,
        token: &str,
        page_size: Option<u32>,
    ) -> SyncResult<SyncPage<Grant>> {
        let plan = ServerScopeListing {
            client: &self.client,
            server: &resource.id,
        };
        run(&plan, &self.client, &self.poll_config, token, page_size).await
    }
}
