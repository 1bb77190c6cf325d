//! Core submission type definitions.
//!
//! Defines [`Verdict`] (the photo-match decision), [`Status`] (record
//! lifecycle), [`SubmitterIdentity`] (contact/demographic fields),
//! [`MatchEntry`]/[`MatchResult`] (ranked neighbor context), and
//! [`Submission`] (a full persisted record).

#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// Outcome of evaluating a submitted photo against the gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Not yet evaluated.
    Pending,
    /// No gallery photo within the duplicate threshold.
    Unique,
    /// The nearest gallery photo is within its duplicate threshold.
    Duplicate,
    /// The matching step failed; the record is kept with no neighbor data.
    Error,
}

impl Verdict {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Unique => "unique",
            Self::Duplicate => "duplicate",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "unique" => Ok(Self::Unique),
            "duplicate" => Ok(Self::Duplicate),
            "error" => Ok(Self::Error),
            _ => Err(format!("unknown verdict: {s}")),
        }
    }
}

/// Lifecycle state of a submission record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Accepted but not yet evaluated.
    Submitted,
    /// Evaluated against the gallery.
    Processed,
    /// Accepted, but the matching step failed.
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Processed => "processed",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(Self::Submitted),
            "processed" => Ok(Self::Processed),
            "error" => Ok(Self::Error),
            _ => Err(format!("unknown status: {s}")),
        }
    }
}

/// Contact and demographic fields for one submitter.
///
/// `email` is the uniqueness key: at most one non-error submission per
/// address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitterIdentity {
    pub name: String,
    pub email: String,
    pub age: u32,
    pub phone: String,
    pub address: String,
}

/// One ranked gallery neighbor, kept as audit context on the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEntry {
    /// Application id of the matched record.
    pub candidate_id: String,
    /// Stored filename of the matched photo.
    pub photo_reference: String,
    /// Cosine distance to the probe (lower is more similar).
    pub distance: f64,
    /// `(1 − distance) × 100`, rounded to 2 decimals.
    pub confidence: f64,
}

/// The full match outcome stored on a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub verdict: Verdict,
    /// Display heuristic derived from the nearest neighbor's filename,
    /// never a lookup key.
    pub best_match_id: Option<String>,
    /// Confidence of the nearest neighbor, 0–100.
    pub best_confidence: Option<f64>,
    /// Up to 5 neighbors, ascending by distance, self excluded.
    pub top_matches: Vec<MatchEntry>,
}

impl MatchResult {
    /// The degraded outcome used when embedding or search fails: error
    /// verdict, no neighbor data.
    pub fn error() -> Self {
        Self {
            verdict: Verdict::Error,
            best_match_id: None,
            best_confidence: None,
            top_matches: Vec::new(),
        }
    }
}

/// A submission record, matching the `submissions` table schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// Opaque id assigned at session start (`APP{date}_{hex}`), immutable.
    pub application_id: String,
    #[serde(flatten)]
    pub identity: SubmitterIdentity,
    /// Stored filename: `{application_id}_{timestamp}{ext}`.
    pub photo_file: String,
    /// SHA-256 hex of the stored bytes. Exact-byte dedup only, never
    /// similarity.
    pub content_fingerprint: String,
    /// Photo embedding; `None` only on error records.
    #[serde(skip_serializing, default)]
    pub embedding: Option<Vec<f32>>,
    pub match_result: MatchResult,
    /// Per-record duplicate threshold applied when this record is a gallery
    /// candidate; classifier default when absent.
    pub match_threshold: Option<f64>,
    pub status: Status,
    /// RFC 3339 insertion timestamp, immutable.
    pub created_at: String,
}
