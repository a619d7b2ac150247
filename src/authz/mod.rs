//! Authorization of sessions against scoped resources.

mod cache;
mod membership;
mod permission_cache;

pub use cache::{CacheStats, TtlCache};
pub use membership::MembershipAuthorizer;
pub use permission_cache::{PERMISSION_CACHE_TTL, PermissionCache, PermissionCacheKey};

use crate::auth::Session;
use crate::error::Result;
use crate::types::{Permission, PermissionCheck, Resource, Scope};

/// Decides whether a session may perform a permission on a resource.
///
/// `Ok(false)` is a denial. `Err` means the decision could not be made, for
/// example because the space does not exist or the store failed.
pub trait Authorizer: Send + Sync {
    fn check(
        &self,
        session: &Session,
        scope: &Scope,
        resource: &Resource,
        permission: Permission,
    ) -> Result<bool>;

    /// Grants only if every check grants. Stops at the first denial.
    fn check_all(&self, session: &Session, checks: &[PermissionCheck]) -> Result<bool> {
        for check in checks {
            if !self.check(session, &check.scope, &check.resource, check.permission)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
