//! Auth0 Connector for xavyo
//!
//! Mirrors an Auth0 tenant into a resource/entitlement/grant graph through
//! the Management API. Every listing is resumable: calls take the token
//! returned by the previous call and hand back one bounded page.
//!
//! # Resource types
//!
//! - `user` - paged, or a bulk export job when `sync_users_by_job` is set
//! - `role` - `assigned` entitlement; grants to users, then (with
//!   `sync_permissions`) the scopes each role confers
//! - `organization` - `member` entitlement granted to users
//! - `resource_server` - immutable `scope` entitlement granted to its scopes
//! - `scope` - listed across all resource servers
//!
//! Role and organization membership can also be written back: their
//! syncers expose a [`ResourceProvisioner`] that grants an entitlement to a
//! user or revokes an existing grant.
//!
//! # Example
//!
//! ```no_run
//! use xavyo_connector_auth0::{Auth0Config, Auth0Connector, ResourceSyncer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Auth0Config::builder()
//!     .base_url("https://example.us.auth0.com")
//!     .api_token("management-api-token")
//!     .sync_permissions(true)
//!     .build()?;
//!
//! let connector = Auth0Connector::new(config)?;
//! let roles = connector.syncer("role").expect("role syncer");
//! let page = roles.list(None, "", Some(50)).await?;
//! println!("{} roles, done: {}", page.records.len(), page.done());
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod connector;
mod error;
mod models;
mod organizations;
mod rate_limit;
mod resource;
mod resource_servers;
mod roles;
mod scopes;
mod syncer;
mod users;

// Re-exports
pub use client::{Auth0Client, ListPage, USER_EXPORT_FIELDS};
pub use config::{Auth0Config, Auth0ConfigBuilder};
pub use connector::Auth0Connector;
pub use error::{Auth0Error, Auth0Result};
pub use models::{
    Job, Organization, ResourceServer, ResourceServerScope, Role, RolePermission, User,
    UserIdentity,
};
pub use rate_limit::{parse_rate_limit, retry_after_secs};
pub use resource::{
    Entitlement, EntitlementPurpose, Grant, Resource, ResourceId, ResourceTrait, ResourceType,
    TraitData, UserStatus, ORGANIZATION, RESOURCE_SERVER, ROLE, SCOPE, USER,
};
pub use organizations::{OrganizationSyncer, MEMBER_ENTITLEMENT};
pub use resource_servers::{ResourceServerSyncer, RESOURCE_SERVER_ENTITLEMENT};
pub use roles::{RoleGrantPhase, RoleSyncer, ROLE_ENTITLEMENT};
pub use scopes::{scope_id, ScopeSyncer, SCOPE_ENTITLEMENT};
pub use syncer::{ResourceProvisioner, ResourceSyncer};
pub use users::UserSyncer;
pub use xavyo_sync_engine::annotations::{Annotations, RateLimitDescription};
pub use xavyo_sync_engine::engine::SyncPage;
pub use xavyo_sync_engine::error::{SyncError, SyncResult};
