#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use intake::embedding::{EmbeddingProvider, EMBEDDING_DIM};
use intake::storage::FileStorage;
use intake::submission::store::insert_submission;
use intake::submission::types::{
    MatchResult, Status, SubmitterIdentity, Submission, Verdict,
};
use rusqlite::Connection;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    intake::db::schema::init_schema(&conn).unwrap();
    intake::db::migrations::run_migrations(&conn).unwrap();
    conn
}

/// Fresh upload storage backed by a temp dir. Keep the TempDir alive for the
/// duration of the test.
pub fn test_storage() -> (tempfile::TempDir, Arc<FileStorage>) {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
    (dir, storage)
}

/// Generate a deterministic embedding with a spike at position `seed`.
/// Each seed produces a distinct, orthogonal vector.
pub fn test_embedding(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[seed % EMBEDDING_DIM] = 1.0;
    v
}

/// Generate an embedding similar to `base` with small perturbation.
/// The result has cosine distance well under the 0.40 default threshold.
pub fn similar_embedding(base: &[f32]) -> Vec<f32> {
    let mut v = base.to_vec();
    for i in 0..5 {
        v[(i * 37) % EMBEDDING_DIM] += 0.05;
    }
    // L2 normalize
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// An embedding at an exact cosine similarity to the unit vector along
/// dimension 0. `at_cosine(0.7)` sits at distance 0.30 from `test_embedding(0)`.
pub fn at_cosine(similarity: f32) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[0] = similarity;
    v[1] = (1.0 - similarity * similarity).sqrt();
    v
}

/// Valid PNG bytes, produced by the image encoder rather than a baked blob.
pub fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([64, 128, 192]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// A plausible submitter for the given email.
pub fn identity(email: &str) -> SubmitterIdentity {
    SubmitterIdentity {
        name: "Asha Rao".into(),
        email: email.to_string(),
        age: 29,
        phone: "9876543210".into(),
        address: "12 Lake Road, Mysuru".into(),
    }
}

/// Insert a processed record directly via the store. Returns the stored
/// filename.
pub fn insert_record(
    conn: &Connection,
    application_id: &str,
    email: &str,
    embedding: Vec<f32>,
    threshold: Option<f64>,
) -> String {
    let photo_file = format!("{application_id}_20260101_120000.png");
    let record = Submission {
        application_id: application_id.to_string(),
        identity: identity(email),
        photo_file: photo_file.clone(),
        content_fingerprint: "0".repeat(64),
        embedding: Some(embedding),
        match_result: MatchResult {
            verdict: Verdict::Unique,
            best_match_id: None,
            best_confidence: None,
            top_matches: Vec::new(),
        },
        match_threshold: threshold,
        status: Status::Processed,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    insert_submission(conn, &record).unwrap();
    photo_file
}

/// Embedding provider that replays a scripted sequence of vectors, one per
/// call, regardless of input bytes.
pub struct ScriptedEmbedder {
    responses: Mutex<Vec<Vec<f32>>>,
}

impl ScriptedEmbedder {
    pub fn new(responses: Vec<Vec<f32>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
        })
    }
}

impl EmbeddingProvider for ScriptedEmbedder {
    fn embed_image(&self, _image_bytes: &[u8]) -> anyhow::Result<Vec<f32>> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            anyhow::bail!("scripted embedder exhausted");
        }
        Ok(responses.remove(0))
    }
}

/// Embedding provider that always fails, like a detector that finds no face.
pub struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn embed_image(&self, _image_bytes: &[u8]) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("no face detected in image")
    }
}

/// Embedding provider that stalls long enough to trip any timeout budget.
pub struct SlowEmbedder;

impl EmbeddingProvider for SlowEmbedder {
    fn embed_image(&self, _image_bytes: &[u8]) -> anyhow::Result<Vec<f32>> {
        std::thread::sleep(std::time::Duration::from_millis(300));
        Ok(test_embedding(0))
    }
}
