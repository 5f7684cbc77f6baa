//! Governance graph records: resources, entitlements and grants.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Capability a resource type advertises to the governance platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceTrait {
    User,
    Group,
    Role,
}

/// A kind of resource the connector syncs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceType {
    pub id: &'static str,
    pub display_name: &'static str,
    pub traits: &'static [ResourceTrait],
}

pub const USER: ResourceType = ResourceType {
    id: "user",
    display_name: "User",
    traits: &[ResourceTrait::User],
};

pub const ORGANIZATION: ResourceType = ResourceType {
    id: "organization",
    display_name: "Organization",
    traits: &[ResourceTrait::Group],
};

pub const ROLE: ResourceType = ResourceType {
    id: "role",
    display_name: "Role",
    traits: &[ResourceTrait::Role],
};

pub const RESOURCE_SERVER: ResourceType = ResourceType {
    id: "resource_server",
    display_name: "Resource Server",
    traits: &[],
};

pub const SCOPE: ResourceType = ResourceType {
    id: "scope",
    display_name: "Scope",
    traits: &[],
};

/// Typed reference to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceId {
    pub resource_type: String,
    pub resource: String,
}

impl ResourceId {
    pub fn new(resource_type: &ResourceType, resource: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.id.to_string(),
            resource: resource.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.resource)
    }
}

/// Account status reported for user resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Enabled,
    Disabled,
}

/// Trait-specific attributes of a resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "trait", rename_all = "snake_case")]
pub enum TraitData {
    User {
        email: Option<String>,
        login: Option<String>,
        status: UserStatus,
        created_at: Option<DateTime<Utc>>,
    },
    Group,
    Role,
}

/// A synced resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub id: ResourceId,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ResourceId>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub profile: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trait_data: Option<TraitData>,
}

impl Resource {
    pub fn new(
        resource_type: &ResourceType,
        id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: ResourceId::new(resource_type, id),
            display_name: display_name.into(),
            description: None,
            parent: None,
            profile: Map::new(),
            trait_data: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.is_empty());
        self
    }

    pub fn with_parent(mut self, parent: Option<ResourceId>) -> Self {
        self.parent = parent;
        self
    }

    /// Adds a profile attribute; `null` values are dropped.
    pub fn with_profile(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.profile.insert(key.to_string(), value);
        }
        self
    }

    pub fn with_trait(mut self, trait_data: TraitData) -> Self {
        self.trait_data = Some(trait_data);
        self
    }
}

/// Why an entitlement exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementPurpose {
    /// Membership or assignment.
    Assignment,
    /// A permission the resource confers.
    Permission,
}

/// Something a principal can hold on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entitlement {
    /// `<resource type>:<resource id>:<slug>`
    pub id: String,
    pub resource: ResourceId,
    pub slug: String,
    pub display_name: String,
    pub description: String,
    pub purpose: EntitlementPurpose,
    /// Resource types that may hold this entitlement.
    pub grantable_to: Vec<String>,
    /// Managed by the source; cannot be granted or revoked through the connector.
    pub immutable: bool,
}

impl Entitlement {
    fn new(resource: &Resource, slug: &str, purpose: EntitlementPurpose) -> Self {
        Self {
            id: entitlement_id(&resource.id, slug),
            resource: resource.id.clone(),
            slug: slug.to_string(),
            display_name: format!("{} {}", resource.display_name, slug),
            description: String::new(),
            purpose,
            grantable_to: Vec::new(),
            immutable: false,
        }
    }

    /// Membership-style entitlement.
    pub fn assignment(resource: &Resource, slug: &str) -> Self {
        Self::new(resource, slug, EntitlementPurpose::Assignment)
    }

    /// Permission-style entitlement.
    pub fn permission(resource: &Resource, slug: &str) -> Self {
        Self::new(resource, slug, EntitlementPurpose::Permission)
    }

    pub fn grantable_to(mut self, resource_type: &ResourceType) -> Self {
        self.grantable_to.push(resource_type.id.to_string());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }
}

/// Entitlement id for `slug` on `resource`.
pub fn entitlement_id(resource: &ResourceId, slug: &str) -> String {
    format!("{resource}:{slug}")
}

/// A principal holding an entitlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grant {
    /// `<entitlement id>:<principal type>:<principal id>`
    pub id: String,
    pub entitlement_id: String,
    /// Resource the entitlement belongs to.
    pub resource: ResourceId,
    pub principal: ResourceId,
}

impl Grant {
    pub fn new(resource: &ResourceId, slug: &str, principal: ResourceId) -> Self {
        let entitlement_id = entitlement_id(resource, slug);
        Self {
            id: format!("{entitlement_id}:{principal}"),
            entitlement_id,
            resource: resource.clone(),
            principal,
        }
    }
}

/// Split a full name into first name and the rest.
pub fn split_full_name(name: &str) -> (String, String) {
    let mut parts = name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let rest = parts.collect::<Vec<_>>().join(" ");
    (first, rest)
}
