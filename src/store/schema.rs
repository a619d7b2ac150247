pub const SCHEMA: &str = r#"
-- Principals are users, services and service accounts
CREATE TABLE IF NOT EXISTS principals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uid TEXT NOT NULL UNIQUE COLLATE NOCASE,
    display_name TEXT NOT NULL,
    principal_type TEXT NOT NULL,
    admin INTEGER NOT NULL DEFAULT 0,
    blocked INTEGER NOT NULL DEFAULT 0,

    -- HMAC secret for tokens issued to this principal
    salt TEXT NOT NULL,
    password_hash TEXT,

    -- Service accounts only: owning space or repo
    parent_type TEXT,
    parent_id INTEGER,

    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Tokens are persisted so they can be revoked before expiry
CREATE TABLE IF NOT EXISTS tokens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uid TEXT NOT NULL,
    principal_id INTEGER NOT NULL REFERENCES principals(id) ON DELETE CASCADE,
    token_type TEXT NOT NULL,
    grants INTEGER NOT NULL DEFAULT 0,
    issued_at TEXT NOT NULL,
    expires_at TEXT,
    created_by INTEGER NOT NULL,

    UNIQUE(principal_id, uid)
);

-- Spaces form a tree; path is the full materialized path from the root
CREATE TABLE IF NOT EXISTS spaces (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id INTEGER REFERENCES spaces(id) ON DELETE CASCADE,
    uid TEXT NOT NULL,
    path TEXT NOT NULL UNIQUE COLLATE NOCASE,
    description TEXT,
    created_by INTEGER NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS repositories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id INTEGER NOT NULL REFERENCES spaces(id) ON DELETE CASCADE,
    uid TEXT NOT NULL,
    path TEXT NOT NULL UNIQUE COLLATE NOCASE,
    description TEXT,
    created_by INTEGER NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Memberships grant a role in a space and every space below it
CREATE TABLE IF NOT EXISTS memberships (
    space_id INTEGER NOT NULL REFERENCES spaces(id) ON DELETE CASCADE,
    principal_id INTEGER NOT NULL REFERENCES principals(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    created_by INTEGER NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (space_id, principal_id)
);

CREATE INDEX IF NOT EXISTS idx_tokens_principal ON tokens(principal_id);
CREATE INDEX IF NOT EXISTS idx_spaces_parent ON spaces(parent_id);
CREATE INDEX IF NOT EXISTS idx_repositories_parent ON repositories(parent_id);
CREATE INDEX IF NOT EXISTS idx_memberships_principal ON memberships(principal_id);
"#;
