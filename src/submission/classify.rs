//! Duplicate classification over a ranked neighbor list.
//!
//! The verdict is decided by the single nearest neighbor against that
//! neighbor's own threshold; the rest of the list is audit context only.

use crate::submission::search::Neighbor;
use crate::submission::types::{MatchEntry, MatchResult, Verdict};

/// Threshold applied when a gallery entry carries none of its own.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.40;

/// `(1 − distance) × 100`, rounded to 2 decimals.
pub fn confidence_from_distance(distance: f64) -> f64 {
    ((1.0 - distance) * 100.0 * 100.0).round() / 100.0
}

/// Derive the display id for a matched photo from its stored filename: the
/// token before the first `_`, or the whole name when there is none.
///
/// With `{application_id}_{timestamp}{ext}` names whose ids themselves
/// contain `_`, this yields the id's date-stamped prefix. Good enough for
/// display and audit, never a lookup key.
pub fn best_match_id(photo_reference: &str) -> String {
    photo_reference
        .split_once('_')
        .map_or(photo_reference, |(prefix, _)| prefix)
        .to_string()
}

/// Classify a probe from its ranked neighbor list.
///
/// Empty list → `Unique` with no best match. Otherwise the nearest
/// neighbor's distance is compared against its threshold (default
/// [`DEFAULT_MATCH_THRESHOLD`]): strictly below → `Duplicate`, else
/// `Unique`. Whenever a nearest neighbor exists, `best_match_id` and
/// `best_confidence` are populated from it regardless of the verdict.
pub fn classify(neighbors: &[Neighbor], default_threshold: f64) -> MatchResult {
    let top_matches: Vec<MatchEntry> = neighbors
        .iter()
        .map(|n| MatchEntry {
            candidate_id: n.application_id.clone(),
            photo_reference: n.photo_reference.clone(),
            distance: n.distance,
            confidence: confidence_from_distance(n.distance),
        })
        .collect();

    let Some(nearest) = neighbors.first() else {
        return MatchResult {
            verdict: Verdict::Unique,
            best_match_id: None,
            best_confidence: None,
            top_matches,
        };
    };

    let threshold = nearest.threshold.unwrap_or(default_threshold);
    let verdict = if nearest.distance < threshold {
        Verdict::Duplicate
    } else {
        Verdict::Unique
    };

    MatchResult {
        verdict,
        best_match_id: Some(best_match_id(&nearest.photo_reference)),
        best_confidence: Some(confidence_from_distance(nearest.distance)),
        top_matches,
    }
}
