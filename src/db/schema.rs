//! SQL DDL for initializing the credential store.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema with:
/// - `id` INTEGER PRIMARY KEY AUTOINCREMENT
/// - `github_username` and `linkedin_id` nullable but UNIQUE, so a row is
///   addressable by either provider identity
/// - per-provider tokens, overwritten on every re-authentication
/// - `created_at` RFC3339 text, written once on insert
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    github_username TEXT NULL UNIQUE,
    linkedin_id TEXT NULL UNIQUE,
    github_token TEXT NULL,
    linkedin_token TEXT NULL,
    github_profileurl TEXT NULL,
    created_at TEXT NOT NULL
);
"#;
