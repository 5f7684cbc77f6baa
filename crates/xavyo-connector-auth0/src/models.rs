//! Auth0 Management API response shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Paging envelope returned with `include_totals=true`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub start: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub total: u64,
}

/// A list response: the named collection plus its paging envelope.
pub trait Paginated: serde::de::DeserializeOwned {
    type Item;

    fn page_info(&self) -> PageInfo;
    fn into_items(self) -> Vec<Self::Item>;
}

macro_rules! paginated_response {
    ($(#[$meta:meta])* $name:ident, $field:ident: $item:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Deserialize)]
        pub struct $name {
            #[serde(default)]
            pub $field: Vec<$item>,
            #[serde(flatten)]
            pub page: PageInfo,
        }

        impl Paginated for $name {
            type Item = $item;

            fn page_info(&self) -> PageInfo {
                self.page
            }

            fn into_items(self) -> Vec<$item> {
                self.$field
            }
        }
    };
}

paginated_response!(
    /// `GET /api/v2/users`
    UsersResponse, users: User
);
paginated_response!(
    /// `GET /api/v2/roles`
    RolesResponse, roles: Role
);
paginated_response!(
    /// `GET /api/v2/roles/{id}/users`
    RoleUsersResponse, users: User
);
paginated_response!(
    /// `GET /api/v2/roles/{id}/permissions`
    RolePermissionsResponse, permissions: RolePermission
);
paginated_response!(
    /// `GET /api/v2/organizations`
    OrganizationsResponse, organizations: Organization
);
paginated_response!(
    /// `GET /api/v2/organizations/{id}/members`
    OrganizationMembersResponse, members: User
);
paginated_response!(
    /// `GET /api/v2/resource-servers`
    ResourceServersResponse, resource_servers: ResourceServer
);

/// Auth0 user.
///
/// Export job rows only carry the requested fields, so everything but
/// `user_id` is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub identities: Vec<UserIdentity>,
}

/// Linked identity of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub connection: String,
    pub provider: String,
    pub user_id: String,
    #[serde(rename = "isSocial", default)]
    pub is_social: bool,
}

/// Auth0 role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A resource server permission assigned to a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermission {
    pub permission_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub resource_server_name: Option<String>,
    pub resource_server_identifier: String,
}

/// Auth0 organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// An API registered in the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceServer {
    pub id: String,
    pub name: String,
    /// Audience identifier, usually a URL.
    pub identifier: String,
    #[serde(default)]
    pub scopes: Vec<ResourceServerScope>,
}

/// A permission defined by a resource server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceServerScope {
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request body for `POST /api/v2/jobs/users-exports`.
#[derive(Debug, Clone, Serialize)]
pub struct UsersExportRequest {
    pub format: String,
    pub limit: u32,
    pub fields: Vec<JobField>,
}

/// Request body for `POST`/`DELETE /api/v2/users/{id}/roles`.
#[derive(Debug, Clone, Serialize)]
pub struct UserRolesRequest {
    pub roles: Vec<String>,
}

/// Request body for `POST`/`DELETE /api/v2/organizations/{id}/members`.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationMembersRequest {
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobField {
    pub name: String,
}

/// Auth0 job as returned by the jobs endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: String,
    #[serde(rename = "type", default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub percentage_done: Option<u32>,
    #[serde(default)]
    pub time_left_seconds: Option<u64>,
}
