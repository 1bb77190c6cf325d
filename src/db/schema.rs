//! SQL DDL for the intake tables.
//!
//! Defines the `submissions` table and the `schema_meta` key/value table. All
//! DDL uses `IF NOT EXISTS` for idempotent initialization. The partial unique
//! index on `email` is the storage-layer enforcement of the one-submission-
//! per-submitter rule; error records are excluded so a failed submission does
//! not permanently burn an address.

use rusqlite::Connection;

/// All schema DDL statements for the intake tables.
const SCHEMA_SQL: &str = r#"
-- Accepted applications, one row per submission
CREATE TABLE IF NOT EXISTS submissions (
    application_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    age INTEGER NOT NULL,
    phone TEXT NOT NULL,
    address TEXT NOT NULL,
    photo_file TEXT NOT NULL,
    content_fingerprint TEXT NOT NULL,
    embedding BLOB,
    verdict TEXT NOT NULL DEFAULT 'pending' CHECK(verdict IN ('pending','unique','duplicate','error')),
    best_match_id TEXT,
    best_confidence REAL,
    top_matches TEXT NOT NULL DEFAULT '[]',
    match_threshold REAL,
    status TEXT NOT NULL CHECK(status IN ('submitted','processed','error')),
    created_at TEXT NOT NULL,
    CHECK (embedding IS NOT NULL OR verdict = 'error')
);

-- One non-error submission per email address
CREATE UNIQUE INDEX IF NOT EXISTS idx_submissions_email
    ON submissions(email) WHERE status != 'error';

CREATE INDEX IF NOT EXISTS idx_submissions_created ON submissions(created_at);
CREATE INDEX IF NOT EXISTS idx_submissions_verdict ON submissions(verdict);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"submissions".to_string()));
        assert!(tables.contains(&"schema_meta".to_string()));
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap(); // second call should not error
    }

    #[test]
    fn email_unique_index_ignores_error_records() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO submissions (application_id, name, email, age, phone, address, \
             photo_file, content_fingerprint, embedding, verdict, status, created_at) \
             VALUES ('A1', 'n', 'x@y.z', 30, '1234567890', 'addr', 'A1_1.png', 'f', \
             x'00000000', 'unique', 'processed', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        // Second non-error row for the same email must violate the index
        let dup = conn.execute(
            "INSERT INTO submissions (application_id, name, email, age, phone, address, \
             photo_file, content_fingerprint, embedding, verdict, status, created_at) \
             VALUES ('A2', 'n', 'x@y.z', 30, '1234567890', 'addr', 'A2_1.png', 'f', \
             x'00000000', 'unique', 'processed', '2026-01-01T00:00:01Z')",
            [],
        );
        assert!(dup.is_err());

        // An error record for the same email is allowed
        conn.execute(
            "INSERT INTO submissions (application_id, name, email, age, phone, address, \
             photo_file, content_fingerprint, embedding, verdict, status, created_at) \
             VALUES ('A3', 'n', 'x@y.z', 30, '1234567890', 'addr', 'A3_1.png', 'f', \
             NULL, 'error', 'error', '2026-01-01T00:00:02Z')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn missing_embedding_requires_error_verdict() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let bad = conn.execute(
            "INSERT INTO submissions (application_id, name, email, age, phone, address, \
             photo_file, content_fingerprint, embedding, verdict, status, created_at) \
             VALUES ('B1', 'n', 'a@b.c', 30, '1234567890', 'addr', 'B1_1.png', 'f', \
             NULL, 'unique', 'processed', '2026-01-01T00:00:00Z')",
            [],
        );
        assert!(bad.is_err());
    }
}
