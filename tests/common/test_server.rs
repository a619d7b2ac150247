use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use canopy::auth::{Argon2Hasher, PasswordHasher, TokenRequest, generate_salt, issue_token};
use canopy::config::ServerConfig;
use canopy::paths;
use canopy::server::{AppState, create_router};
use canopy::store::{MembershipStore, PrincipalStore, SpaceStore, SqliteStore, Store};
use canopy::types::{
    AccessGrant, Membership, MembershipRole, Principal, PrincipalType, Space, TokenType,
};

pub const TEST_GIT_HOST: &str = "git.canopy.test";

/// A server running in-process on an ephemeral port, backed by a temporary data directory.
pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    pub admin_token: String,
    pub admin: Principal,
    pub store: Arc<SqliteStore>,
    server: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");

        let config = ServerConfig {
            data_dir: temp_dir.path().to_path_buf(),
            git_host: Some(TEST_GIT_HOST.to_string()),
            ..ServerConfig::default()
        };

        let store = Arc::new(SqliteStore::new(config.db_path()).expect("open store"));
        store.initialize().expect("initialize store");

        let state = Arc::new(AppState::new(store.clone(), config));
        let app = create_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        let mut test_server = Self {
            temp_dir,
            base_url: format!("http://127.0.0.1:{port}"),
            admin_token: String::new(),
            admin: placeholder_principal(),
            store,
            server,
        };

        let (admin, admin_token) = test_server.create_user("admin", None, true);
        test_server.admin = admin;
        test_server.admin_token = admin_token;
        test_server
    }

    pub fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Creates a user and returns it with a full-grant personal access token.
    ///
    /// Only users created with a password can log in.
    pub fn create_user(&self, uid: &str, password: Option<&str>, admin: bool) -> (Principal, String) {
        let mut user = principal(uid, PrincipalType::User);
        user.admin = admin;
        user.password_hash = password.map(|p| Argon2Hasher::new().hash(p).expect("hash"));
        user.id = self.store.create_principal(&user).expect("create user");

        let token = self.create_pat(&user, AccessGrant::ALL);
        (user, token)
    }

    pub fn create_principal(&self, uid: &str, kind: PrincipalType) -> Principal {
        let mut p = principal(uid, kind);
        p.id = self.store.create_principal(&p).expect("create principal");
        p
    }

    pub fn create_pat(&self, principal: &Principal, grants: AccessGrant) -> String {
        let (_, raw) = issue_token(
            self.store.as_ref(),
            principal,
            TokenRequest {
                uid: format!("pat-{}-{}", principal.uid, grants.bits()),
                token_type: TokenType::Pat,
                grants,
                lifetime: Some(Duration::hours(1)),
                created_by: principal.id,
            },
        )
        .expect("issue token");
        raw
    }

    /// Creates the space at `path`, creating missing ancestors on the way.
    pub fn create_space(&self, path: &str) -> Space {
        let mut parent: Option<Space> = None;
        for segment in paths::segments(path) {
            let full = paths::concatenate(parent.as_ref().map_or("", |p| p.path.as_str()), segment);
            if let Some(existing) = self.store.find_space_by_path(&full).expect("find space") {
                parent = Some(existing);
                continue;
            }

            let now = Utc::now();
            let mut space = Space {
                id: 0,
                parent_id: parent.as_ref().map(|p| p.id),
                uid: segment.to_string(),
                path: full,
                description: None,
                created_by: self.admin.id,
                created_at: now,
                updated_at: now,
            };
            space.id = self.store.create_space(&space).expect("create space");
            parent = Some(space);
        }
        parent.expect("non-empty space path")
    }

    pub fn add_member(&self, space: &Space, principal: &Principal, role: MembershipRole) {
        let now = Utc::now();
        self.store
            .upsert_membership(&Membership {
                space_id: space.id,
                principal_id: principal.id,
                role,
                created_by: self.admin.id,
                created_at: now,
                updated_at: now,
            })
            .expect("add member");
    }
}

fn principal(uid: &str, kind: PrincipalType) -> Principal {
    let now = Utc::now();
    Principal {
        id: 0,
        uid: uid.to_string(),
        display_name: uid.to_string(),
        principal_type: kind,
        admin: false,
        blocked: false,
        salt: generate_salt(),
        password_hash: None,
        parent_type: None,
        parent_id: None,
        created_at: now,
        updated_at: now,
    }
}

fn placeholder_principal() -> Principal {
    principal("", PrincipalType::User)
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.abort();
    }
}
