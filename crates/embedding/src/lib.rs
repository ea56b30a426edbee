//! Sentence-embedding encoders.
//!
//! The production encoder loads a fastembed model by name and owns the model
//! handle for the lifetime of the process; callers share it by reference
//! across tasks. Every produced vector is L2-normalized and checked against
//! the configured dimension. A deterministic hashed encoder stands in for
//! the model in tests.

use anyhow::{anyhow, Context, Result};
use fastembed::{InitOptions, TextEmbedding};
use sha2::{Digest, Sha256};
use tracing::info;

/// A loaded sentence-embedding model.
///
/// Implementations must return vectors of exactly `dimension()` elements.
/// Embedding may be CPU- or GPU-bound; callers are expected to move calls
/// off their I/O threads.
pub trait TextEncoder: Send + Sync {
    fn model_name(&self) -> &str;

    /// The fixed length of every produced vector.
    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// fastembed-backed encoder, resolved from a model name at startup.
pub struct FastembedEncoder {
    model: TextEmbedding,
    name: String,
    dimension: usize,
}

impl FastembedEncoder {
    /// Load the model named by `model_name` and verify it produces vectors
    /// of `dimension` elements. A mismatch is a configuration error, not
    /// something to silently adapt to.
    pub fn load(model_name: &str, dimension: usize) -> Result<Self> {
        let info = TextEmbedding::list_supported_models()
            .into_iter()
            .find(|info| info.model_code.eq_ignore_ascii_case(model_name))
            .ok_or_else(|| anyhow!("unknown embedding model '{model_name}'"))?;

        if info.dim != dimension {
            return Err(anyhow!(
                "embedding model '{model_name}' produces {}-dimensional vectors, \
                 but {dimension} were configured",
                info.dim
            ));
        }

        let model = TextEmbedding::try_new(
            InitOptions::new(info.model.clone()).with_show_download_progress(false),
        )
        .with_context(|| format!("failed to load embedding model '{model_name}'"))?;

        info!(model = %model_name, dimension, "embedding model loaded");
        Ok(Self {
            model,
            name: model_name.to_string(),
            dimension,
        })
    }
}

impl TextEncoder for FastembedEncoder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.embed_batch(std::slice::from_ref(&text.to_string()))?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("model returned no embedding"))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = self
            .model
            .embed(texts.to_vec(), None)
            .with_context(|| format!("embedding failed for model '{}'", self.name))?;

        for vector in &mut vectors {
            if vector.len() != self.dimension {
                return Err(anyhow!(
                    "model '{}' returned a {}-dimensional vector, expected {}",
                    self.name,
                    vector.len(),
                    self.dimension
                ));
            }
            l2_normalize(vector)?;
        }

        Ok(vectors)
    }
}

/// Deterministic encoder for tests: tokens hash into fixed buckets, so equal
/// texts embed identically and overlapping texts land near each other, with
/// no model download involved.
pub struct HashedEncoder {
    dimension: usize,
}

impl HashedEncoder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl TextEncoder for HashedEncoder {
    fn model_name(&self) -> &str {
        "hashed-test-encoder"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text.split_whitespace() {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let raw = u64::from_le_bytes(digest[..8].try_into().expect("digest slice"));
            let bucket = (raw % self.dimension as u64) as usize;
            let sign = if digest[8] % 2 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        if vector.iter().all(|v| *v == 0.0) {
            vector[0] = 1.0;
        }
        l2_normalize(&mut vector)?;
        Ok(vector)
    }
}

fn l2_normalize(values: &mut [f32]) -> Result<()> {
    let norm = values.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(anyhow!(
            "embedding vector norm must be finite and non-zero for normalization"
        ));
    }

    for value in values.iter_mut() {
        *value /= norm;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn hashed_encoder_is_deterministic_and_normalized() {
        let encoder = HashedEncoder::new(16);
        let first = encoder.embed("alpha beta gamma").expect("embed");
        let second = encoder.embed("alpha beta gamma").expect("embed");
        assert_eq!(first, second);
        assert_eq!(first.len(), 16);

        let norm: f32 = first.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn similar_texts_score_higher_than_unrelated_ones() {
        let encoder = HashedEncoder::new(64);
        let base = encoder.embed("rust memory safety borrow checker").expect("embed");
        let related = encoder.embed("rust borrow checker rules").expect("embed");
        let unrelated = encoder.embed("banana smoothie recipe").expect("embed");

        assert!(cosine(&base, &related) > cosine(&base, &unrelated));
    }

    #[test]
    fn empty_text_embeds_to_a_unit_vector() {
        let encoder = HashedEncoder::new(8);
        let vector = encoder.embed("").expect("embed");
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn batch_embeds_each_text() {
        let encoder = HashedEncoder::new(8);
        let texts = vec!["one".to_string(), "two".to_string()];
        let vectors = encoder.embed_batch(&texts).expect("batch");
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], encoder.embed("one").expect("embed"));
    }

    #[test]
    fn unknown_model_name_is_rejected() {
        let result = FastembedEncoder::load("definitely-not-a-model", 384);
        assert!(result.is_err());
    }
}
