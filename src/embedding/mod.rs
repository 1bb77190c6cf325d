//! Photo-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait and a local implementation using
//! a face-recognition ONNX model (512 dimensions, L2-normalized). The
//! provider is created via [`create_provider`] from configuration. The core
//! pipeline treats this as an external capability: it only ever sees the
//! trait.

pub mod local;

use anyhow::Result;

/// Number of dimensions in the embedding vectors (ResNet-50 face encoder).
pub const EMBEDDING_DIM: usize = 512;

/// Trait for embedding photographs into vectors.
///
/// Implementations must be deterministic — the same image bytes yield the
/// same (or near-identical) vector across calls, or similarity search is
/// meaningless. Vectors are L2-normalized with exactly [`EMBEDDING_DIM`]
/// dimensions. All methods are synchronous — callers in async contexts
/// should use `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one encoded image (PNG/JPEG bytes) into a vector.
    fn embed_image(&self, image_bytes: &[u8]) -> Result<Vec<f32>>;

    /// Return the number of dimensions this provider produces.
    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Create an embedding provider from config.
///
/// Currently only `"local"` is supported (ONNX Runtime face encoder).
/// Returns an error if model files are not found — run `intake model
/// download` first.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = local::LocalEmbeddingProvider::new(config)?;
            Ok(Box::new(provider))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local"),
    }
}
