mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Lookup and persistence of principals (users, services, service accounts).
pub trait PrincipalStore: Send + Sync {
    fn create_principal(&self, principal: &Principal) -> Result<i64>;
    fn find_principal(&self, id: i64) -> Result<Option<Principal>>;
    fn find_principal_by_uid(&self, uid: &str) -> Result<Option<Principal>>;
    fn update_principal(&self, principal: &Principal) -> Result<()>;
    fn delete_principal(&self, id: i64) -> Result<bool>;
}

/// Persisted access and session tokens.
pub trait TokenStore: Send + Sync {
    fn create_token(&self, token: &Token) -> Result<i64>;
    fn find_token(&self, id: i64) -> Result<Option<Token>>;
    fn list_principal_tokens(&self, principal_id: i64, token_type: TokenType) -> Result<Vec<Token>>;
    fn delete_token(&self, id: i64) -> Result<bool>;
}

/// Space memberships, keyed by `(space_id, principal_id)`.
pub trait MembershipStore: Send + Sync {
    fn find_membership(&self, key: MembershipKey) -> Result<Option<Membership>>;
    fn upsert_membership(&self, membership: &Membership) -> Result<()>;
    fn delete_membership(&self, key: MembershipKey) -> Result<bool>;
    fn list_space_memberships(&self, space_id: i64) -> Result<Vec<Membership>>;
}

pub trait SpaceStore: Send + Sync {
    fn create_space(&self, space: &Space) -> Result<i64>;
    fn find_space(&self, id: i64) -> Result<Option<Space>>;
    /// Finds a space by its (case-insensitive) path. Numeric paths are paths, never ids.
    fn find_space_by_path(&self, path: &str) -> Result<Option<Space>>;
}

pub trait RepoStore: Send + Sync {
    fn create_repo(&self, repo: &Repository) -> Result<i64>;
    fn find_repo(&self, id: i64) -> Result<Option<Repository>>;
    /// Finds a repository by its (case-insensitive) path.
    fn find_repo_by_path(&self, path: &str) -> Result<Option<Repository>>;
}

/// Store combines every collaborator the access-control core reads from.
pub trait Store: PrincipalStore + TokenStore + MembershipStore + SpaceStore + RepoStore {
    fn initialize(&self) -> Result<()>;
}
