use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::cache::{CacheStats, TtlCache};
use crate::error::{Error, Result};
use crate::store::{MembershipStore, SpaceStore};
use crate::types::{MembershipKey, Permission};

/// How long a resolved permission decision is reused.
pub const PERMISSION_CACHE_TTL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionCacheKey {
    pub principal_id: i64,
    pub space_ref: String,
    pub permission: Permission,
}

/// Memoizes hierarchical membership lookups.
///
/// A decision is a pure function of the memberships on the path from the
/// requested space to the root. Membership changes become visible once the
/// cached decision expires.
pub struct PermissionCache {
    spaces: Arc<dyn SpaceStore>,
    memberships: Arc<dyn MembershipStore>,
    cache: TtlCache<PermissionCacheKey, bool>,
}

impl PermissionCache {
    pub fn new(
        spaces: Arc<dyn SpaceStore>,
        memberships: Arc<dyn MembershipStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            spaces,
            memberships,
            cache: TtlCache::new(ttl),
        }
    }

    pub fn get(&self, key: &PermissionCacheKey) -> Result<bool> {
        self.cache.get_or_fetch(key, |key| self.resolve(key))
    }

    fn resolve(&self, key: &PermissionCacheKey) -> Result<bool> {
        let mut space = self
            .spaces
            .find_space_by_path(&key.space_ref)?
            .ok_or_else(|| Error::not_found(format!("space '{}'", key.space_ref)))?;

        let mut visited = HashSet::new();
        loop {
            if !visited.insert(space.id) {
                tracing::warn!(space = %space.path, "cycle in space hierarchy");
                return Ok(false);
            }

            let membership = self.memberships.find_membership(MembershipKey {
                space_id: space.id,
                principal_id: key.principal_id,
            })?;

            if let Some(membership) = membership {
                if membership.role.has_permission(key.permission) {
                    tracing::debug!(
                        principal_id = key.principal_id,
                        space = %space.path,
                        role = membership.role.as_str(),
                        permission = key.permission.as_str(),
                        "permission granted by membership"
                    );
                    return Ok(true);
                }
            }

            let Some(parent_id) = space.parent_id else {
                return Ok(false);
            };
            space = self
                .spaces
                .find_space(parent_id)?
                .ok_or_else(|| Error::not_found(format!("parent space {parent_id}")))?;
        }
    }

    /// Drops expired decisions.
    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
