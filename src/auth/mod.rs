mod authn;
mod helpers;
pub mod jwt;
mod middleware;
mod session;
mod token;

pub use authn::{Authenticator, JwtAuthenticator};
pub use helpers::{extract_basic_auth_password, extract_token};
pub use middleware::{MaybeAuth, RequireAuth, attach_session, attempt_auth};
pub use session::{Metadata, Session};
pub use token::{
    Argon2Hasher, PasswordHasher, TokenRequest, generate_salt, generate_uid, issue_token,
};
