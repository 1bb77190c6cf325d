//! Nearest-neighbor search over the gallery of prior photo embeddings.
//!
//! [`nearest_neighbors`] is a pure function of (probe, gallery): it never
//! mutates either, and its output depends only on the snapshot it was handed.
//! That keeps the interface substitutable: an indexed structure could replace
//! the linear scan without touching callers. At this system's scale (dozens
//! to low hundreds of gallery entries) the scan is enough.

use serde::Serialize;

/// Default number of neighbors returned per probe.
pub const TOP_K: usize = 5;

/// One gallery candidate: a prior submission's embedding plus the metadata
/// needed for self-exclusion and classification.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub application_id: String,
    /// Stored filename; self-exclusion compares against this, not the id.
    pub photo_reference: String,
    pub embedding: Vec<f32>,
    /// Per-entry duplicate threshold, if the record carries one.
    pub threshold: Option<f64>,
}

/// A ranked search hit.
#[derive(Debug, Clone, Serialize)]
pub struct Neighbor {
    pub application_id: String,
    pub photo_reference: String,
    /// Cosine distance in [0, 2]; lower is more similar.
    pub distance: f64,
    #[serde(skip)]
    pub threshold: Option<f64>,
}

/// Cosine distance: `1 − (a·b)/(‖a‖‖b‖)`.
///
/// Zero-norm or length-mismatched inputs get the neutral distance 1.0 rather
/// than NaN, so a malformed gallery entry ranks as unrelated instead of
/// poisoning the sort.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 1.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Return up to `k` nearest gallery entries by ascending cosine distance.
///
/// Entries whose `photo_reference` equals `exclude_file` are skipped, so the
/// probe's own just-written photo never matches itself. Ties on distance keep
/// gallery iteration order (the sort is stable), so results are deterministic
/// for a fixed snapshot. Duplicate ids in the gallery are ranked like any
/// other entry.
pub fn nearest_neighbors(
    probe: &[f32],
    gallery: &[GalleryEntry],
    k: usize,
    exclude_file: &str,
) -> Vec<Neighbor> {
    let mut neighbors: Vec<Neighbor> = gallery
        .iter()
        .filter(|entry| entry.photo_reference != exclude_file)
        .map(|entry| Neighbor {
            application_id: entry.application_id.clone(),
            photo_reference: entry.photo_reference.clone(),
            distance: cosine_distance(probe, &entry.embedding),
            threshold: entry.threshold,
        })
        .collect();

    neighbors.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    neighbors.truncate(k);
    neighbors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, file: &str, embedding: Vec<f32>) -> GalleryEntry {
        GalleryEntry {
            application_id: id.to_string(),
            photo_reference: file.to_string(),
            embedding,
            threshold: None,
        }
    }

    /// Unit vector along the given dimension.
    fn axis(dim: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; 8];
        v[dim] = 1.0;
        v
    }

    #[test]
    fn cosine_distance_of_identical_vectors_is_zero() {
        let v = vec![0.3f32, 0.4, 0.5];
        assert!(cosine_distance(&v, &v).abs() < 1e-9);
    }

    #[test]
    fn cosine_distance_of_orthogonal_vectors_is_one() {
        assert!((cosine_distance(&axis(0), &axis(1)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_distance_tolerates_zero_and_mismatched_vectors() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn results_are_sorted_ascending_and_capped() {
        let probe = axis(0);
        let gallery: Vec<GalleryEntry> = (0..8)
            .map(|i| entry(&format!("A{i}"), &format!("A{i}_1.png"), axis(i)))
            .collect();

        let neighbors = nearest_neighbors(&probe, &gallery, TOP_K, "probe.png");

        assert_eq!(neighbors.len(), TOP_K);
        assert_eq!(neighbors[0].application_id, "A0");
        for pair in neighbors.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn probe_own_file_is_excluded() {
        let probe = axis(0);
        let gallery = vec![
            entry("ME", "ME_1.png", axis(0)),
            entry("OTHER", "OTHER_1.png", axis(1)),
        ];

        let neighbors = nearest_neighbors(&probe, &gallery, TOP_K, "ME_1.png");

        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].application_id, "OTHER");
    }

    #[test]
    fn empty_gallery_after_exclusion_yields_empty_list() {
        let probe = axis(0);
        let gallery = vec![entry("ME", "ME_1.png", axis(0))];
        assert!(nearest_neighbors(&probe, &gallery, TOP_K, "ME_1.png").is_empty());
        assert!(nearest_neighbors(&probe, &[], TOP_K, "ME_1.png").is_empty());
    }

    #[test]
    fn ties_keep_gallery_order() {
        let probe = axis(0);
        // B and C are both orthogonal to the probe, so equal distance
        let gallery = vec![
            entry("B", "B_1.png", axis(1)),
            entry("C", "C_1.png", axis(2)),
        ];

        let neighbors = nearest_neighbors(&probe, &gallery, TOP_K, "probe.png");

        assert_eq!(neighbors[0].application_id, "B", "first-seen wins on ties");
        assert_eq!(neighbors[1].application_id, "C");
    }

    #[test]
    fn duplicate_ids_do_not_break_the_search() {
        let probe = axis(0);
        let gallery = vec![
            entry("X", "X_1.png", axis(0)),
            entry("X", "X_2.png", axis(1)),
        ];

        let neighbors = nearest_neighbors(&probe, &gallery, TOP_K, "probe.png");
        assert_eq!(neighbors.len(), 2);
    }

    #[test]
    fn gallery_and_probe_are_not_mutated() {
        let probe = axis(0);
        let gallery = vec![entry("A", "A_1.png", axis(1))];
        let before = gallery[0].embedding.clone();

        let _ = nearest_neighbors(&probe, &gallery, TOP_K, "probe.png");

        assert_eq!(gallery[0].embedding, before);
        assert_eq!(probe, axis(0));
    }
}
