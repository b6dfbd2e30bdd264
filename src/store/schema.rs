pub const SCHEMA: &str = r#"
-- Key/value state: each logical record (journal, scout profile) lives
-- under its own key as a JSON document.
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;

/// Idempotent migrations for databases created before the current schema.
/// Failures are ignored: a migration that already applied is not an error.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE kv ADD COLUMN updated_at TEXT",
];
