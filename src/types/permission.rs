use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of object a permission check is performed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Space,
    Repo,
    User,
    Service,
    ServiceAccount,
    Pipeline,
    Secret,
    Connector,
    Template,
    Check,
}

impl ResourceType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Space => "space",
            Self::Repo => "repo",
            Self::User => "user",
            Self::Service => "service",
            Self::ServiceAccount => "service_account",
            Self::Pipeline => "pipeline",
            Self::Secret => "secret",
            Self::Connector => "connector",
            Self::Template => "template",
            Self::Check => "check",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminates the owner of resources that live below either a space or a repo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentResourceType {
    Space,
    Repo,
}

impl ParentResourceType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Space => "space",
            Self::Repo => "repo",
        }
    }
}

impl FromStr for ParentResourceType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "space" => Ok(Self::Space),
            "repo" => Ok(Self::Repo),
            other => Err(crate::error::Error::ParentResourceTypeUnknown(
                other.to_string(),
            )),
        }
    }
}

impl fmt::Display for ParentResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (resource type, action) capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "space_view")]
    SpaceView,
    #[serde(rename = "space_edit")]
    SpaceEdit,
    #[serde(rename = "space_delete")]
    SpaceDelete,

    #[serde(rename = "repo_view")]
    RepoView,
    #[serde(rename = "repo_edit")]
    RepoEdit,
    #[serde(rename = "repo_delete")]
    RepoDelete,
    #[serde(rename = "repo_push")]
    RepoPush,
    #[serde(rename = "repo_reportCommitCheck")]
    RepoReportCommitCheck,

    #[serde(rename = "user_view")]
    UserView,
    #[serde(rename = "user_edit")]
    UserEdit,
    #[serde(rename = "user_delete")]
    UserDelete,
    #[serde(rename = "user_editAdmin")]
    UserEditAdmin,

    #[serde(rename = "serviceaccount_view")]
    ServiceAccountView,
    #[serde(rename = "serviceaccount_edit")]
    ServiceAccountEdit,
    #[serde(rename = "serviceaccount_delete")]
    ServiceAccountDelete,

    #[serde(rename = "service_view")]
    ServiceView,
    #[serde(rename = "service_edit")]
    ServiceEdit,
    #[serde(rename = "service_delete")]
    ServiceDelete,
    #[serde(rename = "service_editAdmin")]
    ServiceEditAdmin,

    #[serde(rename = "pipeline_view")]
    PipelineView,
    #[serde(rename = "pipeline_edit")]
    PipelineEdit,
    #[serde(rename = "pipeline_delete")]
    PipelineDelete,
    #[serde(rename = "pipeline_execute")]
    PipelineExecute,

    #[serde(rename = "secret_view")]
    SecretView,
    #[serde(rename = "secret_edit")]
    SecretEdit,
    #[serde(rename = "secret_delete")]
    SecretDelete,
    #[serde(rename = "secret_access")]
    SecretAccess,

    #[serde(rename = "connector_view")]
    ConnectorView,
    #[serde(rename = "connector_edit")]
    ConnectorEdit,
    #[serde(rename = "connector_delete")]
    ConnectorDelete,
    #[serde(rename = "connector_access")]
    ConnectorAccess,

    #[serde(rename = "template_view")]
    TemplateView,
    #[serde(rename = "template_edit")]
    TemplateEdit,
    #[serde(rename = "template_delete")]
    TemplateDelete,
    #[serde(rename = "template_access")]
    TemplateAccess,
}

impl Permission {
    pub const ALL: [Permission; 35] = [
        Self::SpaceView,
        Self::SpaceEdit,
        Self::SpaceDelete,
        Self::RepoView,
        Self::RepoEdit,
        Self::RepoDelete,
        Self::RepoPush,
        Self::RepoReportCommitCheck,
        Self::UserView,
        Self::UserEdit,
        Self::UserDelete,
        Self::UserEditAdmin,
        Self::ServiceAccountView,
        Self::ServiceAccountEdit,
        Self::ServiceAccountDelete,
        Self::ServiceView,
        Self::ServiceEdit,
        Self::ServiceDelete,
        Self::ServiceEditAdmin,
        Self::PipelineView,
        Self::PipelineEdit,
        Self::PipelineDelete,
        Self::PipelineExecute,
        Self::SecretView,
        Self::SecretEdit,
        Self::SecretDelete,
        Self::SecretAccess,
        Self::ConnectorView,
        Self::ConnectorEdit,
        Self::ConnectorDelete,
        Self::ConnectorAccess,
        Self::TemplateView,
        Self::TemplateEdit,
        Self::TemplateDelete,
        Self::TemplateAccess,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SpaceView => "space_view",
            Self::SpaceEdit => "space_edit",
            Self::SpaceDelete => "space_delete",
            Self::RepoView => "repo_view",
            Self::RepoEdit => "repo_edit",
            Self::RepoDelete => "repo_delete",
            Self::RepoPush => "repo_push",
            Self::RepoReportCommitCheck => "repo_reportCommitCheck",
            Self::UserView => "user_view",
            Self::UserEdit => "user_edit",
            Self::UserDelete => "user_delete",
            Self::UserEditAdmin => "user_editAdmin",
            Self::ServiceAccountView => "serviceaccount_view",
            Self::ServiceAccountEdit => "serviceaccount_edit",
            Self::ServiceAccountDelete => "serviceaccount_delete",
            Self::ServiceView => "service_view",
            Self::ServiceEdit => "service_edit",
            Self::ServiceDelete => "service_delete",
            Self::ServiceEditAdmin => "service_editAdmin",
            Self::PipelineView => "pipeline_view",
            Self::PipelineEdit => "pipeline_edit",
            Self::PipelineDelete => "pipeline_delete",
            Self::PipelineExecute => "pipeline_execute",
            Self::SecretView => "secret_view",
            Self::SecretEdit => "secret_edit",
            Self::SecretDelete => "secret_delete",
            Self::SecretAccess => "secret_access",
            Self::ConnectorView => "connector_view",
            Self::ConnectorEdit => "connector_edit",
            Self::ConnectorDelete => "connector_delete",
            Self::ConnectorAccess => "connector_access",
            Self::TemplateView => "template_view",
            Self::TemplateEdit => "template_edit",
            Self::TemplateDelete => "template_delete",
            Self::TemplateAccess => "template_access",
        }
    }

    /// Converts a permission string to its enum value.
    pub fn parse(s: &str) -> Option<Permission> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }

    /// Returns true for permissions that can only be held through a space membership.
    #[must_use]
    pub const fn is_space_scoped(self) -> bool {
        !matches!(
            self,
            Self::UserView
                | Self::UserEdit
                | Self::UserDelete
                | Self::UserEditAdmin
                | Self::ServiceView
                | Self::ServiceEdit
                | Self::ServiceDelete
                | Self::ServiceEditAdmin
        )
    }

    /// The token grant a credential must carry to exercise this permission.
    #[must_use]
    pub const fn required_grant(self) -> AccessGrant {
        match self {
            Self::SpaceView
            | Self::RepoView
            | Self::UserView
            | Self::ServiceAccountView
            | Self::ServiceView
            | Self::PipelineView
            | Self::SecretView
            | Self::ConnectorView
            | Self::TemplateView => AccessGrant::VIEW,
            Self::SpaceDelete
            | Self::RepoDelete
            | Self::UserDelete
            | Self::ServiceAccountDelete
            | Self::ServiceDelete
            | Self::PipelineDelete
            | Self::SecretDelete
            | Self::ConnectorDelete
            | Self::TemplateDelete => AccessGrant::DELETE,
            Self::PipelineExecute
            | Self::SecretAccess
            | Self::ConnectorAccess
            | Self::TemplateAccess
            | Self::RepoReportCommitCheck => AccessGrant::EXECUTE,
            Self::UserEditAdmin | Self::ServiceEditAdmin => AccessGrant::ADMIN,
            Self::SpaceEdit
            | Self::RepoEdit
            | Self::RepoPush
            | Self::UserEdit
            | Self::ServiceAccountEdit
            | Self::ServiceEdit
            | Self::PipelineEdit
            | Self::SecretEdit
            | Self::ConnectorEdit
            | Self::TemplateEdit => AccessGrant::EDIT,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AccessGrant is a bitmask restricting what a personal access token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessGrant(u32);

impl AccessGrant {
    pub const NONE: AccessGrant = AccessGrant(0);
    pub const VIEW: AccessGrant = AccessGrant(1 << 0); // 1
    pub const EDIT: AccessGrant = AccessGrant(1 << 1); // 2
    pub const DELETE: AccessGrant = AccessGrant(1 << 2); // 4
    pub const EXECUTE: AccessGrant = AccessGrant(1 << 3); // 8
    pub const ADMIN: AccessGrant = AccessGrant(1 << 4); // 16
    pub const ALL: AccessGrant = AccessGrant(0b1_1111);

    pub const fn new(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if this grant contains the required grant.
    #[must_use]
    pub const fn has(self, required: AccessGrant) -> bool {
        self.0 & required.0 == required.0
    }

    #[must_use]
    pub const fn union(self, other: AccessGrant) -> AccessGrant {
        AccessGrant(self.0 | other.0)
    }

    pub fn parse(s: &str) -> Option<AccessGrant> {
        match s {
            "view" => Some(Self::VIEW),
            "edit" => Some(Self::EDIT),
            "delete" => Some(Self::DELETE),
            "execute" => Some(Self::EXECUTE),
            "admin" => Some(Self::ADMIN),
            "all" => Some(Self::ALL),
            _ => None,
        }
    }

    /// Converts a slice of grant strings to a combined bitmask.
    pub fn parse_many<S: AsRef<str>>(strs: &[S]) -> Option<AccessGrant> {
        let mut result = AccessGrant::NONE;
        for s in strs {
            result = result.union(Self::parse(s.as_ref())?);
        }
        Some(result)
    }

    #[must_use]
    pub fn to_strings(self) -> Vec<&'static str> {
        let mut grants = Vec::new();
        if self.has(Self::VIEW) {
            grants.push("view");
        }
        if self.has(Self::EDIT) {
            grants.push("edit");
        }
        if self.has(Self::DELETE) {
            grants.push("delete");
        }
        if self.has(Self::EXECUTE) {
            grants.push("execute");
        }
        if self.has(Self::ADMIN) {
            grants.push("admin");
        }
        grants
    }
}

impl fmt::Display for AccessGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_strings().join(", "))
    }
}

impl From<i64> for AccessGrant {
    fn from(bits: i64) -> Self {
        Self::new(bits as u32)
    }
}

impl From<AccessGrant> for i64 {
    fn from(g: AccessGrant) -> Self {
        g.0 as i64
    }
}

/// Role of a principal within a space. Roles are inherited by every descendant space and repo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipRole {
    Reader,
    Executor,
    Contributor,
    SpaceOwner,
}

const READER_PERMISSIONS: &[Permission] = &[
    Permission::RepoView,
    Permission::SpaceView,
    Permission::ServiceAccountView,
    Permission::PipelineView,
    Permission::SecretView,
    Permission::ConnectorView,
    Permission::TemplateView,
];

const EXECUTOR_PERMISSIONS: &[Permission] = &[
    Permission::RepoReportCommitCheck,
    Permission::PipelineExecute,
    Permission::SecretAccess,
    Permission::ConnectorAccess,
    Permission::TemplateAccess,
];

const CONTRIBUTOR_PERMISSIONS: &[Permission] = &[Permission::RepoPush];

impl MembershipRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Executor => "executor",
            Self::Contributor => "contributor",
            Self::SpaceOwner => "space_owner",
        }
    }

    pub fn parse(s: &str) -> Option<MembershipRole> {
        match s {
            "reader" => Some(Self::Reader),
            "executor" => Some(Self::Executor),
            "contributor" => Some(Self::Contributor),
            "space_owner" => Some(Self::SpaceOwner),
            _ => None,
        }
    }

    /// Returns true if this role implies the given permission.
    #[must_use]
    pub fn has_permission(self, permission: Permission) -> bool {
        match self {
            Self::SpaceOwner => permission.is_space_scoped(),
            Self::Reader => READER_PERMISSIONS.contains(&permission),
            Self::Executor => {
                READER_PERMISSIONS.contains(&permission)
                    || EXECUTOR_PERMISSIONS.contains(&permission)
            }
            Self::Contributor => {
                READER_PERMISSIONS.contains(&permission)
                    || CONTRIBUTOR_PERMISSIONS.contains(&permission)
            }
        }
    }
}

impl fmt::Display for MembershipRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_string_round_trip() {
        for p in Permission::ALL {
            assert_eq!(Permission::parse(p.as_str()), Some(p));
            let json = serde_json::to_string(&p).unwrap();
            assert_eq!(json, format!("\"{}\"", p.as_str()));
        }
        assert_eq!(Permission::parse("repo_fly"), None);
    }

    #[test]
    fn test_reader_cannot_push() {
        assert!(MembershipRole::Reader.has_permission(Permission::RepoView));
        assert!(!MembershipRole::Reader.has_permission(Permission::RepoPush));
        assert!(MembershipRole::Contributor.has_permission(Permission::RepoPush));
        assert!(!MembershipRole::Contributor.has_permission(Permission::PipelineExecute));
        assert!(MembershipRole::Executor.has_permission(Permission::PipelineExecute));
    }

    #[test]
    fn test_space_owner_has_no_user_permissions() {
        assert!(MembershipRole::SpaceOwner.has_permission(Permission::SpaceDelete));
        assert!(MembershipRole::SpaceOwner.has_permission(Permission::SecretAccess));
        assert!(!MembershipRole::SpaceOwner.has_permission(Permission::UserView));
        assert!(!MembershipRole::SpaceOwner.has_permission(Permission::ServiceEditAdmin));
    }

    #[test]
    fn test_parent_resource_type_unknown() {
        assert_eq!(
            "repo".parse::<ParentResourceType>().unwrap(),
            ParentResourceType::Repo
        );
        let err = "pipeline".parse::<ParentResourceType>().unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::ParentResourceTypeUnknown(ref t) if t == "pipeline"
        ));
    }

    #[test]
    fn test_access_grant_parse_and_has() {
        let g = AccessGrant::parse_many(&["view", "edit"]).unwrap();
        assert!(g.has(AccessGrant::VIEW));
        assert!(g.has(Permission::RepoPush.required_grant()));
        assert!(!g.has(Permission::RepoDelete.required_grant()));
        assert_eq!(AccessGrant::parse_many(&["view", "bogus"]), None);
        assert!(AccessGrant::ALL.has(AccessGrant::ADMIN));
    }
}
