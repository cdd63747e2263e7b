//! Embedding backends.
//!
//! The index talks to embeddings through `EmbedderBackend`; every backend
//! returns row-normalized vectors and preserves input order. Two
//! implementations exist:
//!
//! - `HashEmbedder` — a deterministic byte-fold embedding that needs no
//!   model or network. It keeps the index operational everywhere and makes
//!   tests hermetic.
//! - `BgeEmbedder` (feature `model`) — a BGE-small sentence encoder run
//!   through Candle; see `embedder_bge`.
//!
//! `load_default_embedder` prefers the model when the feature is compiled
//! in and the weights load, and falls back to hashing otherwise.

use std::sync::Arc;

use crate::error::Result;

/// Default embedding dimension (matches the BGE-small output).
pub const DEFAULT_DIM: usize = 384;

/// A source of dense text embeddings.
pub trait EmbedderBackend: Send + Sync {
    /// Output dimension of `embed`.
    fn dim(&self) -> usize;

    /// Embed `texts` into unit-norm rows, one per input, in input order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Human-readable backend name for logs.
    fn name(&self) -> &'static str;
}

/// Deterministic byte-fold embedding.
///
/// Each byte `b` at position `j` of the UTF-8 text adds `b` to
/// `vec[j % dim]`; the vector is then L2-normalized. Identical text always
/// produces the identical vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self { dim: DEFAULT_DIM }
    }

    pub fn with_dim(dim: usize) -> Self {
        Self { dim }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbedderBackend for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; self.dim];
                for (j, byte) in text.bytes().enumerate() {
                    vector[j % self.dim] += byte as f32;
                }
                l2_normalize(&mut vector);
                vector
            })
            .collect();
        Ok(vectors)
    }

    fn name(&self) -> &'static str {
        "hash"
    }
}

/// Normalize a vector to unit L2 norm in place.
///
/// The small epsilon keeps the all-zero vector at zero instead of NaN.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt() + 1e-6;
    for v in vector.iter_mut() {
        *v /= norm;
    }
}

/// Cosine similarity of two unit vectors (a plain dot product).
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Load the best available embedder.
///
/// With the `model` feature, tries the BGE backend first and logs the
/// downgrade on failure; otherwise hashing is used directly. Queries work
/// either way, rank quality is best-effort without the model.
pub fn load_default_embedder() -> Arc<dyn EmbedderBackend> {
    #[cfg(feature = "model")]
    {
        match crate::embedder_bge::BgeEmbedder::load() {
            Ok(embedder) => {
                tracing::info!("loaded BGE embedding model");
                return Arc::new(embedder);
            }
            Err(e) => {
                tracing::warn!(error = %e, "embedding model unavailable, using hash fallback");
            }
        }
    }
    Arc::new(HashEmbedder::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed(&["the same text".to_string()]).unwrap();
        let b = embedder.embed(&["the same text".to_string()]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_vectors_are_unit_norm() {
        let embedder = HashEmbedder::new();
        let vectors = embedder
            .embed(&[
                "a".to_string(),
                "a considerably longer sentence with many bytes in it".to_string(),
            ])
            .unwrap();
        for v in &vectors {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4, "norm {norm}");
        }
    }

    #[test]
    fn test_empty_text_stays_zero() {
        let embedder = HashEmbedder::new();
        let vectors = embedder.embed(&[String::new()]).unwrap();
        assert!(vectors[0].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_output_order_matches_input() {
        let embedder = HashEmbedder::with_dim(8);
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let vectors = embedder.embed(&texts).unwrap();
        let alpha = embedder.embed(&[texts[0].clone()]).unwrap();
        let beta = embedder.embed(&[texts[1].clone()]).unwrap();
        assert_eq!(vectors[0], alpha[0]);
        assert_eq!(vectors[1], beta[0]);
    }

    #[test]
    fn test_byte_folding_wraps_positions() {
        let embedder = HashEmbedder::with_dim(4);
        let vectors = embedder.embed(&["abcdefgh".to_string()]).unwrap();
        // Positions 0..8 fold onto 0..4: ('a'+'e', 'b'+'f', 'c'+'g', 'd'+'h').
        let raw = [
            (b'a' + b'e') as f32,
            (b'b' + b'f') as f32,
            (b'c' + b'g') as f32,
            (b'd' + b'h') as f32,
        ];
        let norm = raw.iter().map(|v| v * v).sum::<f32>().sqrt() + 1e-6;
        for (got, want) in vectors[0].iter().zip(raw.iter().map(|v| v / norm)) {
            assert!((got - want).abs() < 1e-6);
        }
    }
}
