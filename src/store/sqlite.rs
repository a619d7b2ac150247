use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::schema::SCHEMA;
use super::{MembershipStore, PrincipalStore, RepoStore, SpaceStore, Store, TokenStore};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database, mostly useful for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_column<T>(idx: usize, value: String, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(&value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid value '{value}'").into(),
        )
    })
}

fn map_constraint(err: rusqlite::Error) -> Error {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            Error::AlreadyExists
        }
        other => Error::Database(other),
    }
}

const PRINCIPAL_COLUMNS: &str = "id, uid, display_name, principal_type, admin, blocked, salt, \
     password_hash, parent_type, parent_id, created_at, updated_at";

fn row_to_principal(row: &Row<'_>) -> rusqlite::Result<Principal> {
    Ok(Principal {
        id: row.get(0)?,
        uid: row.get(1)?,
        display_name: row.get(2)?,
        principal_type: parse_column(3, row.get(3)?, PrincipalType::parse)?,
        admin: row.get(4)?,
        blocked: row.get(5)?,
        salt: row.get(6)?,
        password_hash: row.get(7)?,
        parent_type: row.get(8)?,
        parent_id: row.get(9)?,
        created_at: parse_datetime(&row.get::<_, String>(10)?),
        updated_at: parse_datetime(&row.get::<_, String>(11)?),
    })
}

const TOKEN_COLUMNS: &str =
    "id, uid, token_type, principal_id, grants, issued_at, expires_at, created_by";

fn row_to_token(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        uid: row.get(1)?,
        token_type: parse_column(2, row.get(2)?, TokenType::parse)?,
        principal_id: row.get(3)?,
        grants: AccessGrant::from(row.get::<_, i64>(4)?),
        issued_at: parse_datetime(&row.get::<_, String>(5)?),
        expires_at: row
            .get::<_, Option<String>>(6)?
            .map(|s| parse_datetime(&s)),
        created_by: row.get(7)?,
    })
}

const MEMBERSHIP_COLUMNS: &str =
    "space_id, principal_id, role, created_by, created_at, updated_at";

fn row_to_membership(row: &Row<'_>) -> rusqlite::Result<Membership> {
    Ok(Membership {
        space_id: row.get(0)?,
        principal_id: row.get(1)?,
        role: parse_column(2, row.get(2)?, MembershipRole::parse)?,
        created_by: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

const SPACE_COLUMNS: &str =
    "id, parent_id, uid, path, description, created_by, created_at, updated_at";

fn row_to_space(row: &Row<'_>) -> rusqlite::Result<Space> {
    Ok(Space {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        uid: row.get(2)?,
        path: row.get(3)?,
        description: row.get(4)?,
        created_by: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

const REPO_COLUMNS: &str =
    "id, parent_id, uid, path, description, created_by, created_at, updated_at";

fn row_to_repo(row: &Row<'_>) -> rusqlite::Result<Repository> {
    Ok(Repository {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        uid: row.get(2)?,
        path: row.get(3)?,
        description: row.get(4)?,
        created_by: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }
}

impl PrincipalStore for SqliteStore {
    fn create_principal(&self, principal: &Principal) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO principals (uid, display_name, principal_type, admin, blocked, salt,
                 password_hash, parent_type, parent_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                principal.uid,
                principal.display_name,
                principal.principal_type.as_str(),
                principal.admin,
                principal.blocked,
                principal.salt,
                principal.password_hash,
                principal.parent_type,
                principal.parent_id,
                format_datetime(&principal.created_at),
                format_datetime(&principal.updated_at),
            ],
        )
        .map_err(map_constraint)?;
        Ok(conn.last_insert_rowid())
    }

    fn find_principal(&self, id: i64) -> Result<Option<Principal>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE id = ?1"),
            params![id],
            row_to_principal,
        )
        .optional()
        .map_err(Error::from)
    }

    fn find_principal_by_uid(&self, uid: &str) -> Result<Option<Principal>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE uid = ?1"),
            params![uid],
            row_to_principal,
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_principal(&self, principal: &Principal) -> Result<()> {
        let updated = self.conn().execute(
            "UPDATE principals SET display_name = ?1, admin = ?2, blocked = ?3, salt = ?4,
                 password_hash = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                principal.display_name,
                principal.admin,
                principal.blocked,
                principal.salt,
                principal.password_hash,
                format_datetime(&Utc::now()),
                principal.id,
            ],
        )?;
        if updated == 0 {
            return Err(Error::not_found(format!("principal {}", principal.id)));
        }
        Ok(())
    }

    fn delete_principal(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM principals WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

impl TokenStore for SqliteStore {
    fn create_token(&self, token: &Token) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO tokens (uid, principal_id, token_type, grants, issued_at, expires_at, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                token.uid,
                token.principal_id,
                token.token_type.as_str(),
                i64::from(token.grants),
                format_datetime(&token.issued_at),
                token.expires_at.as_ref().map(format_datetime),
                token.created_by,
            ],
        )
        .map_err(map_constraint)?;
        Ok(conn.last_insert_rowid())
    }

    fn find_token(&self, id: i64) -> Result<Option<Token>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE id = ?1"),
            params![id],
            row_to_token,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_principal_tokens(&self, principal_id: i64, token_type: TokenType) -> Result<Vec<Token>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens
             WHERE principal_id = ?1 AND token_type = ?2 ORDER BY id"
        ))?;
        let tokens = stmt
            .query_map(params![principal_id, token_type.as_str()], row_to_token)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tokens)
    }

    fn delete_token(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM tokens WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

impl MembershipStore for SqliteStore {
    fn find_membership(&self, key: MembershipKey) -> Result<Option<Membership>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {MEMBERSHIP_COLUMNS} FROM memberships
                 WHERE space_id = ?1 AND principal_id = ?2"
            ),
            params![key.space_id, key.principal_id],
            row_to_membership,
        )
        .optional()
        .map_err(Error::from)
    }

    fn upsert_membership(&self, membership: &Membership) -> Result<()> {
        self.conn().execute(
            "INSERT INTO memberships (space_id, principal_id, role, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(space_id, principal_id) DO UPDATE SET
                 role = excluded.role,
                 updated_at = excluded.updated_at",
            params![
                membership.space_id,
                membership.principal_id,
                membership.role.as_str(),
                membership.created_by,
                format_datetime(&membership.created_at),
                format_datetime(&membership.updated_at),
            ],
        )?;
        Ok(())
    }

    fn delete_membership(&self, key: MembershipKey) -> Result<bool> {
        let deleted = self.conn().execute(
            "DELETE FROM memberships WHERE space_id = ?1 AND principal_id = ?2",
            params![key.space_id, key.principal_id],
        )?;
        Ok(deleted > 0)
    }

    fn list_space_memberships(&self, space_id: i64) -> Result<Vec<Membership>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE space_id = ?1 ORDER BY principal_id"
        ))?;
        let memberships = stmt
            .query_map(params![space_id], row_to_membership)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(memberships)
    }
}

impl SpaceStore for SqliteStore {
    fn create_space(&self, space: &Space) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO spaces (parent_id, uid, path, description, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                space.parent_id,
                space.uid,
                space.path,
                space.description,
                space.created_by,
                format_datetime(&space.created_at),
                format_datetime(&space.updated_at),
            ],
        )
        .map_err(map_constraint)?;
        Ok(conn.last_insert_rowid())
    }

    fn find_space(&self, id: i64) -> Result<Option<Space>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SPACE_COLUMNS} FROM spaces WHERE id = ?1"),
            params![id],
            row_to_space,
        )
        .optional()
        .map_err(Error::from)
    }

    fn find_space_by_path(&self, path: &str) -> Result<Option<Space>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SPACE_COLUMNS} FROM spaces WHERE path = ?1"),
            params![path.trim_matches('/')],
            row_to_space,
        )
        .optional()
        .map_err(Error::from)
    }
}

impl RepoStore for SqliteStore {
    fn create_repo(&self, repo: &Repository) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO repositories (parent_id, uid, path, description, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                repo.parent_id,
                repo.uid,
                repo.path,
                repo.description,
                repo.created_by,
                format_datetime(&repo.created_at),
                format_datetime(&repo.updated_at),
            ],
        )
        .map_err(map_constraint)?;
        Ok(conn.last_insert_rowid())
    }

    fn find_repo(&self, id: i64) -> Result<Option<Repository>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {REPO_COLUMNS} FROM repositories WHERE id = ?1"),
            params![id],
            row_to_repo,
        )
        .optional()
        .map_err(Error::from)
    }

    fn find_repo_by_path(&self, path: &str) -> Result<Option<Repository>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {REPO_COLUMNS} FROM repositories WHERE path = ?1"),
            params![path.trim_matches('/')],
            row_to_repo,
        )
        .optional()
        .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (temp, store)
    }

    fn principal(uid: &str) -> Principal {
        let now = Utc::now();
        Principal {
            id: 0,
            uid: uid.to_string(),
            display_name: uid.to_string(),
            principal_type: PrincipalType::User,
            admin: false,
            blocked: false,
            salt: "salt".to_string(),
            password_hash: None,
            parent_type: None,
            parent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn space(parent_id: Option<i64>, uid: &str, path: &str) -> Space {
        let now = Utc::now();
        Space {
            id: 0,
            parent_id,
            uid: uid.to_string(),
            path: path.to_string(),
            description: None,
            created_by: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let (_temp, store) = test_store();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in ["principals", "tokens", "spaces", "repositories", "memberships"] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_principal_crud() {
        let (_temp, store) = test_store();

        let id = store.create_principal(&principal("alice")).unwrap();
        let found = store.find_principal(id).unwrap().unwrap();
        assert_eq!(found.uid, "alice");
        assert_eq!(found.salt, "salt");

        let by_uid = store.find_principal_by_uid("ALICE").unwrap().unwrap();
        assert_eq!(by_uid.id, id);

        assert!(matches!(
            store.create_principal(&principal("alice")),
            Err(Error::AlreadyExists)
        ));

        assert!(store.delete_principal(id).unwrap());
        assert!(store.find_principal(id).unwrap().is_none());
    }

    #[test]
    fn test_space_lookup_by_path() {
        let (_temp, store) = test_store();

        let root = store.create_space(&space(None, "acme", "acme")).unwrap();
        let child = store
            .create_space(&space(Some(root), "platform", "acme/platform"))
            .unwrap();

        let by_path = store.find_space_by_path("Acme/Platform").unwrap().unwrap();
        assert_eq!(by_path.id, child);
        assert_eq!(by_path.parent_id, Some(root));

        assert!(store.find_space_by_path("acme/missing").unwrap().is_none());
    }

    #[test]
    fn test_numeric_path_is_not_an_id() {
        let (_temp, store) = test_store();

        let acme = store.create_space(&space(None, "acme", "acme")).unwrap();
        let numeric = store.create_space(&space(None, "1", "1")).unwrap();
        assert_eq!(acme, 1);

        let found = store.find_space_by_path("1").unwrap().unwrap();
        assert_eq!(found.id, numeric);
        assert_eq!(found.path, "1");

        assert!(store.find_space_by_path(&numeric.to_string()).unwrap().is_none());
    }

    #[test]
    fn test_membership_upsert_replaces_role() {
        let (_temp, store) = test_store();

        let pid = store.create_principal(&principal("bob")).unwrap();
        let sid = store.create_space(&space(None, "acme", "acme")).unwrap();
        let now = Utc::now();
        let mut membership = Membership {
            space_id: sid,
            principal_id: pid,
            role: MembershipRole::Reader,
            created_by: pid,
            created_at: now,
            updated_at: now,
        };
        store.upsert_membership(&membership).unwrap();

        membership.role = MembershipRole::SpaceOwner;
        store.upsert_membership(&membership).unwrap();

        let found = store.find_membership(membership.key()).unwrap().unwrap();
        assert_eq!(found.role, MembershipRole::SpaceOwner);
        assert_eq!(store.list_space_memberships(sid).unwrap().len(), 1);

        assert!(store.delete_membership(membership.key()).unwrap());
        assert!(store.find_membership(membership.key()).unwrap().is_none());
    }

    #[test]
    fn test_token_round_trip() {
        let (_temp, store) = test_store();

        let pid = store.create_principal(&principal("carol")).unwrap();
        let token = Token {
            id: 0,
            uid: "ci".to_string(),
            token_type: TokenType::Pat,
            principal_id: pid,
            grants: AccessGrant::VIEW,
            issued_at: Utc::now(),
            expires_at: None,
            created_by: pid,
        };
        let id = store.create_token(&token).unwrap();

        let found = store.find_token(id).unwrap().unwrap();
        assert_eq!(found.principal_id, pid);
        assert_eq!(found.grants, AccessGrant::VIEW);
        assert_eq!(found.token_type, TokenType::Pat);
        assert_eq!(
            store.list_principal_tokens(pid, TokenType::Pat).unwrap().len(),
            1
        );

        assert!(store.delete_token(id).unwrap());
        assert!(store.find_token(id).unwrap().is_none());
    }
}
