use serde::Serialize;

use super::{Permission, ResourceType};

/// Where in the space/repo tree a permission check applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Scope {
    pub space_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub repo: String,
}

impl Scope {
    /// The scope of resources living outside the space tree (users, services).
    #[must_use]
    pub fn global() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn space(space_path: impl Into<String>) -> Self {
        Self {
            space_path: space_path.into(),
            repo: String::new(),
        }
    }

    #[must_use]
    pub fn repo(space_path: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            space_path: space_path.into(),
            repo: repo.into(),
        }
    }
}

/// The object being acted on. An empty name denotes a "create under this scope" check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub resource_type: ResourceType,
    pub name: String,
}

impl Resource {
    #[must_use]
    pub fn new(resource_type: ResourceType, name: impl Into<String>) -> Self {
        Self {
            resource_type,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PermissionCheck {
    pub scope: Scope,
    pub resource: Resource,
    pub permission: Permission,
}
