//! Submission error taxonomy.
//!
//! Variants map one-to-one onto the outcomes a submitter can hit: rejections
//! before any record exists (format, corruption, duplicate email), degraded
//! matching outcomes (detection failure, timeout), and hard storage failures.

use thiserror::Error;

/// Errors raised while processing a submission.
///
/// `UnsupportedFormat`, `CorruptImage` and `DuplicateSubmitter` reject the
/// submission before any record is written. `Detection` and `Timeout` are
/// recovered by the orchestrator into a persisted record with an error
/// verdict. `Persistence` fails the submission entirely.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Uploaded filename does not end in .png, .jpg or .jpeg.
    #[error("unsupported image format: {0:?} (allowed: png, jpg, jpeg)")]
    UnsupportedFormat(String),

    /// Stored bytes do not decode as a valid image. The file has already
    /// been removed by the time this is returned.
    #[error("uploaded file is not a valid image: {0}")]
    CorruptImage(String),

    /// A non-error submission already exists for this email address.
    #[error("a submission already exists for {0}")]
    DuplicateSubmitter(String),

    /// The embedding provider or search step failed.
    #[error("photo matching failed: {0}")]
    Detection(String),

    /// The matching step exceeded its time budget.
    #[error("photo matching timed out")]
    Timeout,

    /// The record could not be inserted. No record exists for the
    /// submission; the stored photo may be orphaned.
    #[error("failed to persist submission: {0}")]
    Persistence(String),
}
