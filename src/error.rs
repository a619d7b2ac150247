use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists")]
    AlreadyExists,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// No credential was supplied at all. Callers with optional auth treat this as anonymous.
    #[error("no authentication data")]
    NoAuthData,

    /// A credential was supplied but did not verify. The cause is for server logs only.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("not authorized")]
    NotAuthorized,

    #[error("unknown parent resource type '{0}'")]
    ParentResourceTypeUnknown(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("path encoding failed: {0}")]
    PathEncoding(String),

    #[error("token error: {0}")]
    Token(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn auth_failed(cause: impl Into<String>) -> Self {
        Self::AuthenticationFailed(cause.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
