//! Embedder trait, the deterministic hash embedder, and vector utilities.
//!
//! Network-backed embedders (OpenAI, Ollama) live in the `notebook-rag` app
//! crate; everything here is pure.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Dimensionality of [`HashEmbedder`] vectors unless configured otherwise.
pub const DEFAULT_DIMS: usize = 384;

/// Maps a text segment to a fixed-length vector.
///
/// Implementations must be deterministic (same text, same vector, no
/// dependence on call order) and always return exactly [`dims`](Embedder::dims)
/// values.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Hash-derived placeholder embedder.
///
/// Seeds a 32-bit linear congruential generator from the first four bytes
/// (little-endian) of the text's SHA-256 digest and emits
/// `seed / 2^32 - 0.5` per dimension. Identical text always yields the
/// identical vector; there is no semantic signal.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    /// Synchronous core of [`Embedder::embed`].
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        let mut seed = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
        (0..self.dims)
            .map(|_| {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (seed as f64 / 4_294_967_296.0 - 0.5) as f32
            })
            .collect()
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMS)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-lcg"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use notebook_rag_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-magnitude operand.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance (`1 - similarity`); smaller is more similar.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_hash_embedder_deterministic() {
        let e = HashEmbedder::default();
        let a = e.embed_sync("the quick brown fox");
        let b = e.embed_sync("the quick brown fox");
        assert_eq!(a, b);
        assert_ne!(a, e.embed_sync("the quick brown fox."));
    }

    #[test]
    fn test_hash_embedder_fixed_dims() {
        let e = HashEmbedder::new(64);
        for text in ["", "a", "a much longer piece of text with ünïcödé"] {
            let v = e.embed_sync(text);
            assert_eq!(v.len(), 64);
            assert!(v.iter().all(|x| (-0.5..0.5).contains(x)));
        }
    }

    #[test]
    fn test_hash_embedder_independent_of_call_order() {
        let e = HashEmbedder::default();
        let first = e.embed_sync("alpha");
        e.embed_sync("beta");
        e.embed_sync("gamma");
        assert_eq!(e.embed_sync("alpha"), first);
        assert_eq!(HashEmbedder::default().embed_sync("alpha"), first);
    }

    #[tokio::test]
    async fn test_embed_trait_matches_sync() {
        let e = HashEmbedder::default();
        assert_eq!(e.embed("x").await.unwrap(), e.embed_sync("x"));
        assert_eq!(e.dims(), DEFAULT_DIMS);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
