use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use chrono::{Duration, Utc};
use rand::Rng;

use super::jwt;
use crate::error::{Error, Result};
use crate::store::TokenStore;
use crate::types::{AccessGrant, Principal, Token, TokenType};

const ARGON2_MEMORY: u32 = 64 * 1024; // KiB
const ARGON2_ITERATIONS: u32 = 1;
const ARGON2_PARALLELISM: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

const SALT_BYTES: usize = 32;

/// Hashes and verifies login passwords.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String>;
    fn verify(&self, password: &str, hash: &str) -> Result<bool>;
}

pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Argon2Hasher {
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(
            ARGON2_MEMORY,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        )
        .unwrap_or_default();

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Token(format!("failed to hash password: {e}")))?;
        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| Error::Token(format!("invalid hash format: {e}")))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Token(format!("failed to verify password: {e}"))),
        }
    }
}

/// Generates a fresh per-principal signing salt.
#[must_use]
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Generates a random token uid for tokens the caller did not name.
#[must_use]
pub fn generate_uid(token_type: TokenType) -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", token_type.as_str(), &uuid[..12])
}

/// Parameters of a token to be issued.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub uid: String,
    pub token_type: TokenType,
    pub grants: AccessGrant,
    /// None issues a token that never expires.
    pub lifetime: Option<Duration>,
    pub created_by: i64,
}

impl TokenRequest {
    /// A login session for `principal` with full grants.
    #[must_use]
    pub fn session(principal: &Principal, lifetime: Duration) -> Self {
        Self {
            uid: generate_uid(TokenType::Session),
            token_type: TokenType::Session,
            grants: AccessGrant::ALL,
            lifetime: Some(lifetime),
            created_by: principal.id,
        }
    }
}

/// Persists a token for `principal` and returns it with its signed credential.
///
/// The credential is only returned here; it is never stored.
pub fn issue_token<T: TokenStore + ?Sized>(
    tokens: &T,
    principal: &Principal,
    request: TokenRequest,
) -> Result<(Token, String)> {
    if request.lifetime.is_some_and(|l| l <= Duration::zero()) {
        return Err(Error::BadRequest("token lifetime must be positive".into()));
    }

    let issued_at = Utc::now();
    let mut token = Token {
        id: 0,
        uid: request.uid,
        token_type: request.token_type,
        principal_id: principal.id,
        grants: request.grants,
        issued_at,
        expires_at: request
            .lifetime
            .map(|l| {
                issued_at
                    .checked_add_signed(l)
                    .ok_or_else(|| Error::BadRequest("token lifetime is too long".into()))
            })
            .transpose()?,
        created_by: request.created_by,
    };
    token.id = tokens.create_token(&token)?;

    let raw = jwt::generate_for_token(&token, &principal.salt)?;

    tracing::debug!(
        principal_id = principal.id,
        token_id = token.id,
        token_type = token.token_type.as_str(),
        "issued token"
    );

    Ok((token, raw))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::{PrincipalStore, SqliteStore, Store};
    use crate::types::PrincipalType;

    fn principal(store: &SqliteStore) -> Principal {
        let now = Utc::now();
        let mut p = Principal {
            id: 0,
            uid: "alice".into(),
            display_name: "Alice".into(),
            principal_type: PrincipalType::User,
            admin: false,
            blocked: false,
            salt: generate_salt(),
            password_hash: None,
            parent_type: None,
            parent_id: None,
            created_at: now,
            updated_at: now,
        };
        p.id = store.create_principal(&p).unwrap();
        p
    }

    #[test]
    fn test_password_verification() {
        let hasher = Argon2Hasher::new();
        let hash = hasher.hash("hunter2").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("hunter2", &hash).unwrap());
        assert!(!hasher.verify("hunter3", &hash).unwrap());
    }

    #[test]
    fn test_invalid_hash_is_error() {
        let hasher = Argon2Hasher::new();
        assert!(hasher.verify("pw", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_salts_are_unique_hex() {
        let a = generate_salt();
        let b = generate_salt();
        assert_eq!(a.len(), SALT_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_issue_token_persists_and_signs() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store.initialize().unwrap();
        let alice = principal(&store);

        let (token, raw) = issue_token(
            store.as_ref(),
            &alice,
            TokenRequest {
                uid: "laptop".into(),
                token_type: TokenType::Pat,
                grants: AccessGrant::VIEW,
                lifetime: Some(Duration::days(30)),
                created_by: alice.id,
            },
        )
        .unwrap();

        let stored = store.find_token(token.id).unwrap().unwrap();
        assert_eq!(stored.uid, "laptop");
        assert_eq!(stored.grants, AccessGrant::VIEW);

        let claims = jwt::verify(&raw, &alice.salt).unwrap();
        assert_eq!(claims.pid, alice.id);
        assert_eq!(claims.token.unwrap().id, token.id);
    }

    #[test]
    fn test_non_positive_lifetime_is_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().unwrap();
        let alice = principal(&store);

        let mut request = TokenRequest::session(&alice, Duration::zero());
        request.lifetime = Some(Duration::seconds(-1));
        assert!(matches!(
            issue_token(&store, &alice, request),
            Err(Error::BadRequest(_))
        ));
    }
}
