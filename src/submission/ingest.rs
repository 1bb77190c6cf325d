//! Image ingestion: format gate, persistence, integrity check, fingerprint.
//!
//! [`ingest_photo`] is the single entry point. Order matters: the extension
//! gate runs before any write, the decode check runs against the stored bytes
//! (and removes them on failure), and the fingerprint is computed from what
//! was actually stored. Every failure here is terminal for the submission;
//! the caller must re-upload.

use sha2::{Digest, Sha256};

use crate::error::SubmissionError;
use crate::storage::FileStorage;

/// Extensions accepted by the intake form, matched case-insensitively.
const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// A photo that survived ingestion.
#[derive(Debug, Clone)]
pub struct StoredPhoto {
    /// Name the bytes were stored under: `{application_id}_{timestamp}{ext}`.
    pub filename: String,
    /// SHA-256 hex digest of the stored bytes.
    pub fingerprint: String,
}

/// Validate, persist, verify, and fingerprint an uploaded photograph.
pub fn ingest_photo(
    storage: &FileStorage,
    application_id: &str,
    original_filename: &str,
    bytes: &[u8],
) -> Result<StoredPhoto, SubmissionError> {
    let extension = allowed_extension(original_filename)
        .ok_or_else(|| SubmissionError::UnsupportedFormat(original_filename.to_string()))?;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let filename = format!("{application_id}_{timestamp}.{extension}");

    storage
        .write(&filename, bytes)
        .map_err(|e| SubmissionError::Persistence(e.to_string()))?;

    // Verify what landed on disk, not the request buffer
    let stored = storage
        .read(&filename)
        .map_err(|e| SubmissionError::Persistence(e.to_string()))?;

    if let Err(decode_err) = image::load_from_memory(&stored) {
        // No orphaned invalid files survive ingestion
        if let Err(e) = storage.delete(&filename) {
            tracing::warn!(file = %filename, error = %e, "failed to remove invalid upload");
        }
        return Err(SubmissionError::CorruptImage(decode_err.to_string()));
    }

    let fingerprint = hex::encode(Sha256::digest(&stored));
    tracing::debug!(file = %filename, fingerprint = %fingerprint, "photo stored");

    Ok(StoredPhoto {
        filename,
        fingerprint,
    })
}

/// Return the lowercased extension if it is one of the allowed formats.
fn allowed_extension(filename: &str) -> Option<String> {
    let extension = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}
