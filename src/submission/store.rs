//! Persistence store for submission records.
//!
//! [`insert_submission`] is the single write path: one atomic insert per
//! accepted submission, relying on the partial unique email index as the
//! hard enforcement of the one-submission-per-submitter rule. Records are
//! immutable after insertion; there is no update path.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;

use crate::submission::search::GalleryEntry;
use crate::submission::types::{
    MatchEntry, MatchResult, Status, SubmitterIdentity, Submission, Verdict,
};
use crate::submission::{bytes_to_embedding, embedding_to_bytes};

/// Insert one submission record. Atomic: the record is either fully visible
/// or absent.
pub fn insert_submission(conn: &Connection, record: &Submission) -> rusqlite::Result<()> {
    let embedding_blob = record.embedding.as_deref().map(embedding_to_bytes);
    let top_matches_json = serde_json::to_string(&record.match_result.top_matches)
        .unwrap_or_else(|_| "[]".to_string());

    conn.execute(
        "INSERT INTO submissions (application_id, name, email, age, phone, address, \
         photo_file, content_fingerprint, embedding, verdict, best_match_id, \
         best_confidence, top_matches, match_threshold, status, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            record.application_id,
            record.identity.name,
            record.identity.email,
            record.identity.age,
            record.identity.phone,
            record.identity.address,
            record.photo_file,
            record.content_fingerprint,
            embedding_blob,
            record.match_result.verdict.as_str(),
            record.match_result.best_match_id,
            record.match_result.best_confidence,
            top_matches_json,
            record.match_threshold,
            record.status.as_str(),
            record.created_at,
        ],
    )?;
    Ok(())
}

/// Whether an insert failure was the email uniqueness index firing.
pub fn is_email_conflict(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg)) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation
                && (msg.contains("idx_submissions_email") || msg.contains("submissions.email"))
        }
        _ => false,
    }
}

/// Find the non-error submission for an email address, if one exists.
pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<Submission>> {
    let row = conn
        .query_row(
            &format!("{SELECT_COLUMNS} WHERE email = ?1 AND status != 'error'"),
            params![email],
            map_row,
        )
        .optional()?;
    row.map(build_submission).transpose()
}

/// All records ordered by insertion time.
pub fn list_all(conn: &Connection) -> Result<Vec<Submission>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY created_at, application_id"))?;
    let rows = stmt
        .query_map([], map_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(build_submission).collect()
}

/// Delete every record. Returns the number removed. Administrative reset
/// only; the gallery otherwise grows monotonically.
pub fn delete_all(conn: &Connection) -> Result<usize> {
    let count = conn.execute("DELETE FROM submissions", [])?;
    Ok(count)
}

/// Materialize the gallery: every non-error record's (id, embedding,
/// filename, threshold), ordered by insertion time so tie-breaks are
/// deterministic for a fixed snapshot.
pub fn load_gallery(conn: &Connection) -> Result<Vec<GalleryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT application_id, photo_file, embedding, match_threshold FROM submissions \
         WHERE status != 'error' AND embedding IS NOT NULL \
         ORDER BY created_at, application_id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
                row.get::<_, Option<f64>>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut gallery = Vec::with_capacity(rows.len());
    for (application_id, photo_reference, blob, threshold) in rows {
        let embedding = bytes_to_embedding(&blob)
            .ok_or_else(|| anyhow!("malformed embedding blob for {application_id}"))?;
        gallery.push(GalleryEntry {
            application_id,
            photo_reference,
            embedding,
            threshold,
        });
    }
    Ok(gallery)
}

// ── Stats ─────────────────────────────────────────────────────────────────────

/// Aggregate counts for the results view and the `stats` command.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_submissions: u64,
    pub unique_applications: u64,
    pub potential_duplicates: u64,
    pub errored: u64,
    pub db_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_submission: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_submission: Option<String>,
}

/// Compute store statistics. `db_path` is used for file size calculation;
/// pass None for in-memory databases.
pub fn submission_stats(conn: &Connection, db_path: Option<&Path>) -> Result<StatsResponse> {
    let count_for = |verdict: &str| -> rusqlite::Result<u64> {
        conn.query_row(
            "SELECT COUNT(*) FROM submissions WHERE verdict = ?1",
            params![verdict],
            |row| row.get::<_, i64>(0).map(|n| n as u64),
        )
    };

    let total: u64 = conn.query_row("SELECT COUNT(*) FROM submissions", [], |row| {
        row.get::<_, i64>(0).map(|n| n as u64)
    })?;
    let (oldest, newest): (Option<String>, Option<String>) = conn.query_row(
        "SELECT MIN(created_at), MAX(created_at) FROM submissions",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(StatsResponse {
        total_submissions: total,
        unique_applications: count_for("unique")?,
        potential_duplicates: count_for("duplicate")?,
        errored: count_for("error")?,
        db_size_bytes,
        oldest_submission: oldest,
        newest_submission: newest,
    })
}

// ── Internal row plumbing ─────────────────────────────────────────────────────

const SELECT_COLUMNS: &str = "SELECT application_id, name, email, age, phone, address, \
     photo_file, content_fingerprint, embedding, verdict, best_match_id, best_confidence, \
     top_matches, match_threshold, status, created_at FROM submissions";

struct SubmissionRow {
    application_id: String,
    name: String,
    email: String,
    age: u32,
    phone: String,
    address: String,
    photo_file: String,
    content_fingerprint: String,
    embedding: Option<Vec<u8>>,
    verdict: String,
    best_match_id: Option<String>,
    best_confidence: Option<f64>,
    top_matches: String,
    match_threshold: Option<f64>,
    status: String,
    created_at: String,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubmissionRow> {
    Ok(SubmissionRow {
        application_id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        age: row.get(3)?,
        phone: row.get(4)?,
        address: row.get(5)?,
        photo_file: row.get(6)?,
        content_fingerprint: row.get(7)?,
        embedding: row.get(8)?,
        verdict: row.get(9)?,
        best_match_id: row.get(10)?,
        best_confidence: row.get(11)?,
        top_matches: row.get(12)?,
        match_threshold: row.get(13)?,
        status: row.get(14)?,
        created_at: row.get(15)?,
    })
}

fn build_submission(row: SubmissionRow) -> Result<Submission> {
    let verdict = Verdict::from_str(&row.verdict).map_err(|e| anyhow!(e))?;
    let status = Status::from_str(&row.status).map_err(|e| anyhow!(e))?;
    let top_matches: Vec<MatchEntry> = serde_json::from_str(&row.top_matches)?;
    let embedding = match row.embedding {
        Some(blob) => Some(
            bytes_to_embedding(&blob)
                .ok_or_else(|| anyhow!("malformed embedding blob for {}", row.application_id))?,
        ),
        None => None,
    };

    Ok(Submission {
        application_id: row.application_id,
        identity: SubmitterIdentity {
            name: row.name,
            email: row.email,
            age: row.age,
            phone: row.phone,
            address: row.address,
        },
        photo_file: row.photo_file,
        content_fingerprint: row.content_fingerprint,
        embedding,
        match_result: MatchResult {
            verdict,
            best_match_id: row.best_match_id,
            best_confidence: row.best_confidence,
            top_matches,
        },
        match_threshold: row.match_threshold,
        status,
        created_at: row.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_db() -> Connection {
        db::open_memory_database().unwrap()
    }

    fn spike(dim: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; 8];
        v[dim] = 1.0;
        v
    }

    fn record(id: &str, email: &str, verdict: Verdict, embedding: Option<Vec<f32>>) -> Submission {
        let status = if verdict == Verdict::Error {
            Status::Error
        } else {
            Status::Processed
        };
        Submission {
            application_id: id.to_string(),
            identity: SubmitterIdentity {
                name: "Asha Rao".into(),
                email: email.to_string(),
                age: 29,
                phone: "9876543210".into(),
                address: "12 Lake Road".into(),
            },
            photo_file: format!("{id}_20260101_120000.png"),
            content_fingerprint: "deadbeef".into(),
            embedding,
            match_result: MatchResult {
                verdict,
                best_match_id: None,
                best_confidence: None,
                top_matches: Vec::new(),
            },
            match_threshold: None,
            status,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn insert_and_read_back_round_trip() {
        let conn = test_db();
        let mut rec = record("APP1", "a@example.com", Verdict::Unique, Some(spike(0)));
        rec.match_result.best_match_id = Some("APP0".into());
        rec.match_result.best_confidence = Some(70.0);
        rec.match_result.top_matches = vec![MatchEntry {
            candidate_id: "APP0".into(),
            photo_reference: "APP0_1.png".into(),
            distance: 0.3,
            confidence: 70.0,
        }];
        rec.match_threshold = Some(0.35);

        insert_submission(&conn, &rec).unwrap();

        let loaded = find_by_email(&conn, "a@example.com").unwrap().unwrap();
        assert_eq!(loaded.application_id, "APP1");
        assert_eq!(loaded.identity.name, "Asha Rao");
        assert_eq!(loaded.embedding.as_deref(), Some(&spike(0)[..]));
        assert_eq!(loaded.match_result.verdict, Verdict::Unique);
        assert_eq!(loaded.match_result.best_match_id.as_deref(), Some("APP0"));
        assert_eq!(loaded.match_result.top_matches.len(), 1);
        assert_eq!(loaded.match_result.top_matches[0].confidence, 70.0);
        assert_eq!(loaded.match_threshold, Some(0.35));
    }

    #[test]
    fn find_by_email_skips_error_records() {
        let conn = test_db();
        insert_submission(&conn, &record("APP1", "a@example.com", Verdict::Error, None)).unwrap();

        assert!(find_by_email(&conn, "a@example.com").unwrap().is_none());
    }

    #[test]
    fn second_insert_for_same_email_is_a_conflict() {
        let conn = test_db();
        insert_submission(&conn, &record("APP1", "a@example.com", Verdict::Unique, Some(spike(0))))
            .unwrap();

        let err = insert_submission(
            &conn,
            &record("APP2", "a@example.com", Verdict::Unique, Some(spike(1))),
        )
        .unwrap_err();

        assert!(is_email_conflict(&err));
    }

    #[test]
    fn error_record_does_not_burn_the_email() {
        let conn = test_db();
        insert_submission(&conn, &record("APP1", "a@example.com", Verdict::Error, None)).unwrap();
        insert_submission(&conn, &record("APP2", "a@example.com", Verdict::Unique, Some(spike(0))))
            .unwrap();
    }

    #[test]
    fn list_all_orders_by_created_at() {
        let conn = test_db();
        let mut first = record("APP1", "a@example.com", Verdict::Unique, Some(spike(0)));
        first.created_at = "2026-01-01T00:00:00Z".into();
        let mut second = record("APP2", "b@example.com", Verdict::Unique, Some(spike(1)));
        second.created_at = "2026-01-02T00:00:00Z".into();

        insert_submission(&conn, &second).unwrap();
        insert_submission(&conn, &first).unwrap();

        let all = list_all(&conn).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].application_id, "APP1");
        assert_eq!(all[1].application_id, "APP2");
    }

    #[test]
    fn gallery_contains_only_usable_entries() {
        let conn = test_db();
        insert_submission(&conn, &record("APP1", "a@example.com", Verdict::Unique, Some(spike(0))))
            .unwrap();
        insert_submission(&conn, &record("APP2", "b@example.com", Verdict::Error, None)).unwrap();
        let mut with_threshold =
            record("APP3", "c@example.com", Verdict::Duplicate, Some(spike(1)));
        with_threshold.match_threshold = Some(0.5);
        insert_submission(&conn, &with_threshold).unwrap();

        let gallery = load_gallery(&conn).unwrap();

        assert_eq!(gallery.len(), 2);
        assert!(gallery.iter().all(|e| e.application_id != "APP2"));
        let app3 = gallery.iter().find(|e| e.application_id == "APP3").unwrap();
        assert_eq!(app3.threshold, Some(0.5));
        assert_eq!(app3.embedding, spike(1));
    }

    #[test]
    fn delete_all_reports_count() {
        let conn = test_db();
        insert_submission(&conn, &record("APP1", "a@example.com", Verdict::Unique, Some(spike(0))))
            .unwrap();
        insert_submission(&conn, &record("APP2", "b@example.com", Verdict::Unique, Some(spike(1))))
            .unwrap();

        assert_eq!(delete_all(&conn).unwrap(), 2);
        assert!(list_all(&conn).unwrap().is_empty());
    }

    #[test]
    fn stats_count_by_verdict() {
        let conn = test_db();
        insert_submission(&conn, &record("APP1", "a@example.com", Verdict::Unique, Some(spike(0))))
            .unwrap();
        insert_submission(&conn, &record("APP2", "b@example.com", Verdict::Duplicate, Some(spike(1))))
            .unwrap();
        insert_submission(&conn, &record("APP3", "c@example.com", Verdict::Error, None)).unwrap();

        let stats = submission_stats(&conn, None).unwrap();
        assert_eq!(stats.total_submissions, 3);
        assert_eq!(stats.unique_applications, 1);
        assert_eq!(stats.potential_duplicates, 1);
        assert_eq!(stats.errored, 1);
    }
}
