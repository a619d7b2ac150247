//! Resolves the scope and resource of an object and runs the permission check.
//!
//! Every `check_*` helper returns `Ok(())` when access is granted,
//! [`Error::NotAuthenticated`] for anonymous callers and
//! [`Error::NotAuthorized`] when the authorizer denies.

use crate::auth::Session;
use crate::authz::Authorizer;
use crate::error::{Error, Result};
use crate::paths;
use crate::store::{RepoStore, SpaceStore};
use crate::types::{
    ParentResourceType, Permission, PermissionCheck, Principal, Repository, Resource,
    ResourceType, Scope, Space,
};

pub fn check(
    authorizer: &dyn Authorizer,
    session: Option<&Session>,
    scope: &Scope,
    resource: &Resource,
    permission: Permission,
) -> Result<()> {
    let session = session.ok_or(Error::NotAuthenticated)?;

    if !authorizer.check(session, scope, resource, permission)? {
        tracing::debug!(
            principal = %session.principal.uid,
            resource_type = %resource.resource_type,
            resource = %resource.name,
            permission = permission.as_str(),
            "access denied"
        );
        return Err(Error::NotAuthorized);
    }

    Ok(())
}

pub fn check_all(
    authorizer: &dyn Authorizer,
    session: Option<&Session>,
    checks: &[PermissionCheck],
) -> Result<()> {
    let session = session.ok_or(Error::NotAuthenticated)?;

    if !authorizer.check_all(session, checks)? {
        return Err(Error::NotAuthorized);
    }

    Ok(())
}

/// Checks a permission on an existing space, evaluated against the space itself.
pub fn check_space(
    authorizer: &dyn Authorizer,
    session: Option<&Session>,
    space: &Space,
    permission: Permission,
) -> Result<()> {
    let (parent, name) = if space.parent_id.is_none() {
        (String::new(), space.path.clone())
    } else {
        paths::disect_leaf(&space.path)?
    };

    check(
        authorizer,
        session,
        &Scope::space(parent),
        &Resource::new(ResourceType::Space, name),
        permission,
    )
}

/// Checks a permission on resources of `resource_type` directly inside `space`,
/// for example creating a repository in it.
pub fn check_space_scope(
    authorizer: &dyn Authorizer,
    session: Option<&Session>,
    space: &Space,
    resource_type: ResourceType,
    permission: Permission,
) -> Result<()> {
    check(
        authorizer,
        session,
        &Scope::space(space.path.clone()),
        &Resource::new(resource_type, ""),
        permission,
    )
}

pub fn check_repo(
    authorizer: &dyn Authorizer,
    session: Option<&Session>,
    repo: &Repository,
    permission: Permission,
) -> Result<()> {
    let (parent, name) = paths::disect_leaf(&repo.path)?;

    check(
        authorizer,
        session,
        &Scope::space(parent),
        &Resource::new(ResourceType::Repo, name),
        permission,
    )
}

pub fn check_user(
    authorizer: &dyn Authorizer,
    session: Option<&Session>,
    user: &Principal,
    permission: Permission,
) -> Result<()> {
    check(
        authorizer,
        session,
        &Scope::global(),
        &Resource::new(ResourceType::User, user.uid.clone()),
        permission,
    )
}

pub fn check_service(
    authorizer: &dyn Authorizer,
    session: Option<&Session>,
    service: &Principal,
    permission: Permission,
) -> Result<()> {
    check(
        authorizer,
        session,
        &Scope::global(),
        &Resource::new(ResourceType::Service, service.uid.clone()),
        permission,
    )
}

/// Checks a permission on a service account, scoped by the space or repository owning it.
pub fn check_service_account<S>(
    authorizer: &dyn Authorizer,
    store: &S,
    session: Option<&Session>,
    service_account: &Principal,
    permission: Permission,
) -> Result<()>
where
    S: SpaceStore + RepoStore + ?Sized,
{
    let parent_type = service_account.parent_type.as_deref().unwrap_or_default();
    let parent_id = service_account.parent_id.ok_or_else(|| {
        Error::BadRequest(format!(
            "service account '{}' has no parent",
            service_account.uid
        ))
    })?;

    check_child(
        authorizer,
        store,
        session,
        parent_type,
        parent_id,
        ResourceType::ServiceAccount,
        &service_account.uid,
        permission,
    )
}

/// Checks a permission on a resource owned by a space or repository.
///
/// `parent_type` is the raw discriminator stored with the resource; values
/// other than `space` and `repo` are rejected.
#[allow(clippy::too_many_arguments)]
pub fn check_child<S>(
    authorizer: &dyn Authorizer,
    store: &S,
    session: Option<&Session>,
    parent_type: &str,
    parent_id: i64,
    resource_type: ResourceType,
    name: &str,
    permission: Permission,
) -> Result<()>
where
    S: SpaceStore + RepoStore + ?Sized,
{
    let scope = match parent_type.parse::<ParentResourceType>()? {
        ParentResourceType::Repo => {
            let repo = store
                .find_repo(parent_id)?
                .ok_or_else(|| Error::not_found(format!("parent repository {parent_id}")))?;
            repo_scope(&repo)?
        }
        ParentResourceType::Space => {
            let space = store
                .find_space(parent_id)?
                .ok_or_else(|| Error::not_found(format!("parent space {parent_id}")))?;
            Scope::space(space.path)
        }
    };

    check(
        authorizer,
        session,
        &scope,
        &Resource::new(resource_type, name),
        permission,
    )
}

pub fn check_pipeline(
    authorizer: &dyn Authorizer,
    session: Option<&Session>,
    repo_path: &str,
    pipeline_uid: &str,
    permission: Permission,
) -> Result<()> {
    let (space_path, repo_name) = paths::disect_leaf(repo_path)?;

    check(
        authorizer,
        session,
        &Scope::repo(space_path, repo_name),
        &Resource::new(ResourceType::Pipeline, pipeline_uid),
        permission,
    )
}

pub fn check_secret(
    authorizer: &dyn Authorizer,
    session: Option<&Session>,
    space_path: &str,
    secret_uid: &str,
    permission: Permission,
) -> Result<()> {
    check_space_child(
        authorizer,
        session,
        space_path,
        ResourceType::Secret,
        secret_uid,
        permission,
    )
}

pub fn check_connector(
    authorizer: &dyn Authorizer,
    session: Option<&Session>,
    space_path: &str,
    connector_uid: &str,
    permission: Permission,
) -> Result<()> {
    check_space_child(
        authorizer,
        session,
        space_path,
        ResourceType::Connector,
        connector_uid,
        permission,
    )
}

pub fn check_template(
    authorizer: &dyn Authorizer,
    session: Option<&Session>,
    space_path: &str,
    template_uid: &str,
    permission: Permission,
) -> Result<()> {
    check_space_child(
        authorizer,
        session,
        space_path,
        ResourceType::Template,
        template_uid,
        permission,
    )
}

/// Checks a permission on the status checks of a repository, such as reporting a commit check.
pub fn check_commit_check(
    authorizer: &dyn Authorizer,
    session: Option<&Session>,
    repo: &Repository,
    permission: Permission,
) -> Result<()> {
    check(
        authorizer,
        session,
        &repo_scope(repo)?,
        &Resource::new(ResourceType::Check, ""),
        permission,
    )
}

fn check_space_child(
    authorizer: &dyn Authorizer,
    session: Option<&Session>,
    space_path: &str,
    resource_type: ResourceType,
    name: &str,
    permission: Permission,
) -> Result<()> {
    check(
        authorizer,
        session,
        &Scope::space(space_path),
        &Resource::new(resource_type, name),
        permission,
    )
}

fn repo_scope(repo: &Repository) -> Result<Scope> {
    let (space_path, repo_name) = paths::disect_leaf(&repo.path)?;
    Ok(Scope::repo(space_path, repo_name))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Utc;

    use super::*;
    use crate::auth::Metadata;
    use crate::store::{SqliteStore, Store};
    use crate::types::PrincipalType;

    /// Records every check and answers with a fixed decision.
    struct RecordingAuthorizer {
        decision: bool,
        seen: Mutex<Vec<(Scope, Resource, Permission)>>,
    }

    impl RecordingAuthorizer {
        fn new(decision: bool) -> Self {
            Self {
                decision,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn last(&self) -> (Scope, Resource, Permission) {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl Authorizer for RecordingAuthorizer {
        fn check(
            &self,
            _session: &Session,
            scope: &Scope,
            resource: &Resource,
            permission: Permission,
        ) -> Result<bool> {
            self.seen
                .lock()
                .unwrap()
                .push((scope.clone(), resource.clone(), permission));
            Ok(self.decision)
        }
    }

    fn principal(uid: &str, kind: PrincipalType) -> Principal {
        let now = Utc::now();
        Principal {
            id: 1,
            uid: uid.into(),
            display_name: uid.into(),
            principal_type: kind,
            admin: false,
            blocked: false,
            salt: String::new(),
            password_hash: None,
            parent_type: None,
            parent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn session() -> Session {
        Session::new(principal("alice", PrincipalType::User), Metadata::Empty)
    }

    fn space(id: i64, parent_id: Option<i64>, path: &str) -> Space {
        let now = Utc::now();
        Space {
            id,
            parent_id,
            uid: path.rsplit('/').next().unwrap_or(path).into(),
            path: path.into(),
            description: None,
            created_by: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn repo(id: i64, parent_id: i64, path: &str) -> Repository {
        let now = Utc::now();
        Repository {
            id,
            parent_id,
            uid: path.rsplit('/').next().unwrap_or(path).into(),
            path: path.into(),
            description: None,
            created_by: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_anonymous_is_not_authenticated() {
        let authz = RecordingAuthorizer::new(true);
        let result = check_repo(&authz, None, &repo(1, 1, "acme/api"), Permission::RepoView);
        assert!(matches!(result, Err(Error::NotAuthenticated)));
    }

    #[test]
    fn test_denied_is_not_authorized() {
        let authz = RecordingAuthorizer::new(false);
        let s = session();
        let result = check_repo(&authz, Some(&s), &repo(1, 1, "acme/api"), Permission::RepoView);
        assert!(matches!(result, Err(Error::NotAuthorized)));
    }

    #[test]
    fn test_repo_scope() {
        let authz = RecordingAuthorizer::new(true);
        let s = session();
        check_repo(&authz, Some(&s), &repo(1, 1, "acme/platform/api"), Permission::RepoPush).unwrap();

        let (scope, resource, permission) = authz.last();
        assert_eq!(scope, Scope::space("acme/platform"));
        assert_eq!(resource, Resource::new(ResourceType::Repo, "api"));
        assert_eq!(permission, Permission::RepoPush);
    }

    #[test]
    fn test_nested_and_root_space_scope() {
        let authz = RecordingAuthorizer::new(true);
        let s = session();

        check_space(&authz, Some(&s), &space(2, Some(1), "acme/platform"), Permission::SpaceView)
            .unwrap();
        let (scope, resource, _) = authz.last();
        assert_eq!(scope, Scope::space("acme"));
        assert_eq!(resource, Resource::new(ResourceType::Space, "platform"));

        check_space(&authz, Some(&s), &space(1, None, "acme"), Permission::SpaceView).unwrap();
        let (scope, resource, _) = authz.last();
        assert_eq!(scope, Scope::global());
        assert_eq!(resource, Resource::new(ResourceType::Space, "acme"));
    }

    #[test]
    fn test_space_scope_uses_empty_name() {
        let authz = RecordingAuthorizer::new(true);
        let s = session();
        check_space_scope(
            &authz,
            Some(&s),
            &space(1, None, "acme"),
            ResourceType::Repo,
            Permission::RepoEdit,
        )
        .unwrap();

        let (scope, resource, _) = authz.last();
        assert_eq!(scope, Scope::space("acme"));
        assert_eq!(resource, Resource::new(ResourceType::Repo, ""));
    }

    #[test]
    fn test_pipeline_scope_includes_repo() {
        let authz = RecordingAuthorizer::new(true);
        let s = session();
        check_pipeline(&authz, Some(&s), "acme/platform/api", "build", Permission::PipelineExecute)
            .unwrap();

        let (scope, resource, _) = authz.last();
        assert_eq!(scope, Scope::repo("acme/platform", "api"));
        assert_eq!(resource, Resource::new(ResourceType::Pipeline, "build"));
    }

    #[test]
    fn test_space_children_scope() {
        let authz = RecordingAuthorizer::new(true);
        let s = session();

        check_secret(&authz, Some(&s), "acme", "db-password", Permission::SecretAccess).unwrap();
        assert_eq!(
            authz.last().1,
            Resource::new(ResourceType::Secret, "db-password")
        );
        check_connector(&authz, Some(&s), "acme", "github", Permission::ConnectorView).unwrap();
        assert_eq!(authz.last().1.resource_type, ResourceType::Connector);
        check_template(&authz, Some(&s), "acme", "stage", Permission::TemplateView).unwrap();
        assert_eq!(authz.last().0, Scope::space("acme"));
    }

    #[test]
    fn test_users_and_services_are_global() {
        let authz = RecordingAuthorizer::new(true);
        let s = session();

        check_user(&authz, Some(&s), &principal("bob", PrincipalType::User), Permission::UserView)
            .unwrap();
        assert_eq!(authz.last().0, Scope::global());
        assert_eq!(authz.last().1, Resource::new(ResourceType::User, "bob"));

        check_service(
            &authz,
            Some(&s),
            &principal("ci", PrincipalType::Service),
            Permission::ServiceView,
        )
        .unwrap();
        assert_eq!(authz.last().1, Resource::new(ResourceType::Service, "ci"));
    }

    #[test]
    fn test_commit_check_scope() {
        let authz = RecordingAuthorizer::new(true);
        let s = session();
        check_commit_check(
            &authz,
            Some(&s),
            &repo(1, 1, "acme/api"),
            Permission::RepoReportCommitCheck,
        )
        .unwrap();

        let (scope, resource, _) = authz.last();
        assert_eq!(scope, Scope::repo("acme", "api"));
        assert_eq!(resource.resource_type, ResourceType::Check);
    }

    fn store_with_tree() -> (SqliteStore, i64, i64) {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().unwrap();
        let acme = store.create_space(&space(0, None, "acme")).unwrap();
        let api = store.create_repo(&repo(0, acme, "acme/api")).unwrap();
        (store, acme, api)
    }

    #[test]
    fn test_child_of_repo_and_space() {
        let (store, acme, api) = store_with_tree();
        let authz = RecordingAuthorizer::new(true);
        let s = session();

        check_child(
            &authz,
            &store,
            Some(&s),
            "repo",
            api,
            ResourceType::ServiceAccount,
            "deployer",
            Permission::ServiceAccountView,
        )
        .unwrap();
        assert_eq!(authz.last().0, Scope::repo("acme", "api"));

        check_child(
            &authz,
            &store,
            Some(&s),
            "space",
            acme,
            ResourceType::ServiceAccount,
            "deployer",
            Permission::ServiceAccountView,
        )
        .unwrap();
        assert_eq!(authz.last().0, Scope::space("acme"));
    }

    #[test]
    fn test_unknown_parent_type_fails_before_authorization() {
        let (store, acme, _) = store_with_tree();
        let authz = RecordingAuthorizer::new(true);
        let s = session();

        let result = check_child(
            &authz,
            &store,
            Some(&s),
            "organization",
            acme,
            ResourceType::ServiceAccount,
            "deployer",
            Permission::ServiceAccountView,
        );
        assert!(matches!(result, Err(Error::ParentResourceTypeUnknown(_))));
        assert!(authz.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_service_account_uses_its_parent() {
        let (store, acme, _) = store_with_tree();
        let authz = RecordingAuthorizer::new(true);
        let s = session();

        let mut sa = principal("deployer", PrincipalType::ServiceAccount);
        sa.parent_type = Some("space".into());
        sa.parent_id = Some(acme);
        check_service_account(&authz, &store, Some(&s), &sa, Permission::ServiceAccountEdit)
            .unwrap();

        let (scope, resource, _) = authz.last();
        assert_eq!(scope, Scope::space("acme"));
        assert_eq!(
            resource,
            Resource::new(ResourceType::ServiceAccount, "deployer")
        );
    }

    #[test]
    fn test_check_all_denies_when_any_denies() {
        let authz = RecordingAuthorizer::new(false);
        let s = session();
        let checks = [PermissionCheck {
            scope: Scope::space("acme"),
            resource: Resource::new(ResourceType::Repo, "api"),
            permission: Permission::RepoView,
        }];

        assert!(matches!(
            check_all(&authz, Some(&s), &checks),
            Err(Error::NotAuthorized)
        ));
        assert!(matches!(
            check_all(&authz, None, &checks),
            Err(Error::NotAuthenticated)
        ));
    }

    #[test]
    fn test_store_backed_store_is_usable_as_trait_object() {
        let (store, acme, _) = store_with_tree();
        let store: Arc<dyn Store> = Arc::new(store);
        let authz = RecordingAuthorizer::new(true);
        let s = session();

        check_child(
            &authz,
            store.as_ref(),
            Some(&s),
            "space",
            acme,
            ResourceType::ServiceAccount,
            "deployer",
            Permission::ServiceAccountDelete,
        )
        .unwrap();
    }
}
