//! Submission pipeline: the write path from validated form to persisted
//! record.
//!
//! [`process_submission`] sequences the steps in a fixed order: email
//! uniqueness gate, photo ingestion, embed + search + classify under a time
//! budget, one atomic record insert, then best-effort notification. Failures
//! at or before ingestion reject the submission with nothing written;
//! matching failures degrade to a persisted error-verdict record; an insert
//! failure fails the submission (the stored photo may be orphaned, which is
//! acceptable at this scale).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

use crate::config::MatchingConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::SubmissionError;
use crate::notify::{notify_receipt, Notifier};
use crate::storage::FileStorage;
use crate::submission::classify::classify;
use crate::submission::ingest::ingest_photo;
use crate::submission::search::nearest_neighbors;
use crate::submission::store::{find_by_email, insert_submission, is_email_conflict, load_gallery};
use crate::submission::types::{MatchResult, Status, SubmitterIdentity, Submission, Verdict};

/// A validated submission ready for processing.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    /// Assigned at session start by the caller; opaque here.
    pub application_id: String,
    pub identity: SubmitterIdentity,
    /// Filename as uploaded; only its extension matters.
    pub photo_filename: String,
    pub photo_bytes: Vec<u8>,
}

/// What the submitter is told once the record is persisted.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubmissionReceipt {
    pub application_id: String,
    pub verdict: Verdict,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_match_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_confidence: Option<f64>,
}

/// Run the full pipeline for one submission.
pub async fn process_submission(
    db: Arc<Mutex<Connection>>,
    embedding: Arc<dyn EmbeddingProvider>,
    storage: Arc<FileStorage>,
    notifier: Arc<dyn Notifier>,
    matching: MatchingConfig,
    submission: NewSubmission,
) -> Result<SubmissionReceipt, SubmissionError> {
    let NewSubmission {
        application_id,
        identity,
        photo_filename,
        photo_bytes,
    } = submission;

    // 1. Email uniqueness gate, before any image work, so a rejected
    //    resubmission never creates an orphan file. The unique index on the
    //    insert below is the hard enforcement; this check is the fast path.
    let email = identity.email.clone();
    let gate_db = Arc::clone(&db);
    let existing = tokio::task::spawn_blocking(move || {
        let conn = gate_db
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
        find_by_email(&conn, &email)
    })
    .await
    .map_err(|e| SubmissionError::Persistence(e.to_string()))?
    .map_err(|e| SubmissionError::Persistence(e.to_string()))?;

    if existing.is_some() {
        return Err(SubmissionError::DuplicateSubmitter(identity.email));
    }

    // 2. Ingest the photo. Terminal on failure, nothing recorded.
    let ingest_storage = Arc::clone(&storage);
    let ingest_id = application_id.clone();
    let ingest_name = photo_filename.clone();
    let ingest_bytes = photo_bytes.clone();
    let stored = tokio::task::spawn_blocking(move || {
        ingest_photo(&ingest_storage, &ingest_id, &ingest_name, &ingest_bytes)
    })
    .await
    .map_err(|e| SubmissionError::Persistence(e.to_string()))??;

    tracing::info!(
        application_id = %application_id,
        file = %stored.filename,
        "photo ingested"
    );

    // 3. Embed, search, classify: bounded, and never fatal. Any failure in
    //    here becomes an error-verdict record.
    let (photo_embedding, match_result) = run_matching(
        Arc::clone(&db),
        embedding,
        &matching,
        photo_bytes,
        stored.filename.clone(),
    )
    .await;

    let status = match match_result.verdict {
        Verdict::Error => Status::Error,
        _ => Status::Processed,
    };

    let record = Submission {
        application_id: application_id.clone(),
        identity,
        photo_file: stored.filename,
        content_fingerprint: stored.fingerprint,
        embedding: photo_embedding,
        match_result,
        match_threshold: None,
        status,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    // 4. Single atomic insert. A constraint hit here means another
    //    submission for the same email raced past the gate.
    let insert_db = Arc::clone(&db);
    let to_insert = record.clone();
    tokio::task::spawn_blocking(move || {
        let conn = insert_db
            .lock()
            .map_err(|e| SubmissionError::Persistence(format!("db lock poisoned: {e}")))?;
        insert_submission(&conn, &to_insert).map_err(|e| {
            if is_email_conflict(&e) {
                SubmissionError::DuplicateSubmitter(to_insert.identity.email.clone())
            } else {
                SubmissionError::Persistence(e.to_string())
            }
        })
    })
    .await
    .map_err(|e| SubmissionError::Persistence(e.to_string()))??;

    tracing::info!(
        application_id = %record.application_id,
        verdict = %record.match_result.verdict,
        "submission persisted"
    );

    // 5. Best-effort notification. Never blocks, never fails the submission.
    notify_receipt(
        notifier.as_ref(),
        &record.identity.email,
        &record.application_id,
        record.match_result.verdict,
        record.status,
    );

    Ok(SubmissionReceipt {
        application_id: record.application_id,
        verdict: record.match_result.verdict,
        status: record.status,
        best_match_id: record.match_result.best_match_id,
        best_confidence: record.match_result.best_confidence,
    })
}

/// Embed the photo and evaluate it against a gallery snapshot, within the
/// configured time budget. Returns the embedding (when it was produced) and
/// the match outcome; every failure path yields [`MatchResult::error`].
async fn run_matching(
    db: Arc<Mutex<Connection>>,
    embedding: Arc<dyn EmbeddingProvider>,
    matching: &MatchingConfig,
    photo_bytes: Vec<u8>,
    stored_filename: String,
) -> (Option<Vec<f32>>, MatchResult) {
    let top_k = matching.top_k;
    let default_threshold = matching.default_threshold;
    let budget = Duration::from_secs(matching.timeout_secs);

    let task = tokio::task::spawn_blocking(move || -> anyhow::Result<(Vec<f32>, MatchResult)> {
        let probe = embedding.embed_image(&photo_bytes)?;

        // Gallery snapshot: all prior embeddings at this moment. A record
        // inserted concurrently after this point is simply not seen; an
        // accepted race in this design.
        let gallery = {
            let conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            load_gallery(&conn)?
        };

        let neighbors = nearest_neighbors(&probe, &gallery, top_k, &stored_filename);
        let result = classify(&neighbors, default_threshold);
        Ok((probe, result))
    });

    match tokio::time::timeout(budget, task).await {
        Ok(Ok(Ok((probe, result)))) => (Some(probe), result),
        Ok(Ok(Err(e))) => {
            tracing::warn!(error = %e, "matching failed, recording error verdict");
            (None, MatchResult::error())
        }
        Ok(Err(join_err)) => {
            tracing::warn!(error = %join_err, "matching task died, recording error verdict");
            (None, MatchResult::error())
        }
        Err(_) => {
            tracing::warn!(budget_secs = budget.as_secs(), "matching timed out, recording error verdict");
            (None, MatchResult::error())
        }
    }
}
