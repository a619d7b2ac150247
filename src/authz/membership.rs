use std::sync::Arc;

use super::Authorizer;
use super::permission_cache::{PermissionCache, PermissionCacheKey};
use crate::auth::{Metadata, Session};
use crate::error::{Error, Result};
use crate::paths;
use crate::store::SpaceStore;
use crate::types::{MembershipRole, Permission, Resource, ResourceType, Scope};

/// Authorizes through space memberships, inherited down the space tree.
pub struct MembershipAuthorizer {
    permission_cache: Arc<PermissionCache>,
    spaces: Arc<dyn SpaceStore>,
}

impl MembershipAuthorizer {
    pub fn new(permission_cache: Arc<PermissionCache>, spaces: Arc<dyn SpaceStore>) -> Self {
        Self {
            permission_cache,
            spaces,
        }
    }

    /// Evaluates a membership carried by the credential instead of stored memberships.
    fn check_with_membership_metadata(
        &self,
        space_ref: &str,
        space_id: i64,
        role: MembershipRole,
        permission: Permission,
    ) -> Result<bool> {
        if !role.has_permission(permission) {
            return Ok(false);
        }

        let Some(granted) = self.spaces.find_space(space_id)? else {
            tracing::debug!(space_id, "membership claim references a missing space");
            return Ok(false);
        };
        let requested = self
            .spaces
            .find_space_by_path(space_ref)?
            .ok_or_else(|| Error::not_found(format!("space '{space_ref}'")))?;

        Ok(paths::is_ancestor_or_self(&granted.path, &requested.path))
    }
}

impl Authorizer for MembershipAuthorizer {
    fn check(
        &self,
        session: &Session,
        scope: &Scope,
        resource: &Resource,
        permission: Permission,
    ) -> Result<bool> {
        let principal = &session.principal;

        tracing::debug!(
            principal = %principal.uid,
            resource_type = %resource.resource_type,
            resource = %resource.name,
            space = %scope.space_path,
            repo = %scope.repo,
            permission = permission.as_str(),
            "checking permission"
        );

        if principal.admin {
            return Ok(true);
        }

        match resource.resource_type {
            // users may only view and edit themselves; everything else on users is admin-only
            ResourceType::User => {
                return Ok(resource.name == principal.uid
                    && matches!(permission, Permission::UserView | Permission::UserEdit));
            }
            ResourceType::Service => return Ok(false),
            _ => {}
        }

        let space_ref = match resource.resource_type {
            ResourceType::Space => paths::concatenate(&scope.space_path, &resource.name),
            _ => scope.space_path.clone(),
        };
        if space_ref.is_empty() {
            tracing::debug!(
                resource_type = %resource.resource_type,
                "no space to authorize against"
            );
            return Ok(false);
        }

        match &session.metadata {
            Metadata::Token { grants, .. } if !grants.has(permission.required_grant()) => {
                tracing::debug!(
                    permission = permission.as_str(),
                    grants = %grants,
                    "token grants do not cover permission"
                );
                Ok(false)
            }
            Metadata::Membership { space_id, role } => {
                self.check_with_membership_metadata(&space_ref, *space_id, *role, permission)
            }
            Metadata::Empty | Metadata::Token { .. } => {
                self.permission_cache.get(&PermissionCacheKey {
                    principal_id: principal.id,
                    space_ref,
                    permission,
                })
            }
        }
    }
}
