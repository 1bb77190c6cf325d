//! Local ONNX Runtime embedding provider.
//!
//! Implements [`EmbeddingProvider`] using a ResNet-50 face encoder via
//! `ort`. Handles decoding, resize to the model's input square, channel
//! normalization, inference, and L2 normalization of the output vector.

use std::sync::Mutex;

use anyhow::{Context, Result};
use image::imageops::FilterType;
use ort::session::Session;
use ort::value::Tensor;

use super::{EmbeddingProvider, EMBEDDING_DIM};
use crate::config::EmbeddingConfig;

/// Input square expected by the face encoder.
const INPUT_SIZE: u32 = 112;

/// Local ONNX-based embedding provider.
pub struct LocalEmbeddingProvider {
    session: Mutex<Session>,
}

impl LocalEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let cache_dir = crate::config::expand_tilde(&config.cache_dir);
        let model_path = cache_dir.join("model.onnx");

        anyhow::ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `intake model download` first.",
            model_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow::anyhow!("{e}"))?
            .with_intra_threads(4)
            .map_err(|e| anyhow::anyhow!("{e}"))?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        tracing::info!(model = %model_path.display(), "ONNX model loaded");

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl EmbeddingProvider for LocalEmbeddingProvider {
    fn embed_image(&self, image_bytes: &[u8]) -> Result<Vec<f32>> {
        // Step 1: Decode and preprocess
        let img = image::load_from_memory(image_bytes).context("failed to decode image")?;
        let (shape, pixels) = preprocess(&img);

        let input_tensor = Tensor::from_array((shape, pixels.into_boxed_slice()))?;

        // Step 2: Run ONNX inference
        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;

        let outputs = session.run(ort::inputs! {
            "data" => input_tensor,
        })?;

        // Step 3: Extract the embedding — shape [1, 512]
        // The output name varies by ONNX export. Try the common name, fall
        // back to index 0.
        let embedding_value = outputs.get("fc1").unwrap_or_else(|| &outputs[0]);

        let (shape, data) = embedding_value
            .try_extract_tensor::<f32>()
            .context("failed to extract embedding tensor")?;

        let dims: &[i64] = &shape;
        anyhow::ensure!(
            dims.last() == Some(&(EMBEDDING_DIM as i64)),
            "unexpected embedding shape: {dims:?}, expected [.., {EMBEDDING_DIM}]"
        );

        // Step 4: L2 normalize
        Ok(l2_normalize(&data[..EMBEDDING_DIM]))
    }
}

/// Resize to the model's input square and lay pixels out as normalized NCHW
/// floats, `(value − 127.5) / 128`.
fn preprocess(img: &image::DynamicImage) -> (Vec<i64>, Vec<f32>) {
    let resized = img.resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);
    let rgb = resized.to_rgb8();
    let size = INPUT_SIZE as usize;

    let shape = vec![1, 3, size as i64, size as i64];
    let mut data = vec![0.0f32; 3 * size * size];

    for y in 0..size {
        for x in 0..size {
            let px = rgb.get_pixel(x as u32, y as u32);
            let idx = y * size + x;
            data[idx] = (f32::from(px[0]) - 127.5) / 128.0;
            data[size * size + idx] = (f32::from(px[1]) - 127.5) / 128.0;
            data[2 * size * size + idx] = (f32::from(px[2]) - 127.5) / 128.0;
        }
    }

    (shape, data)
}

/// L2-normalize a vector. Returns a zero vector if the input norm is zero.
fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}
