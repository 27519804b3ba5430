//! Embedding provider trait, deterministic fallback, and vector codec.
//!
//! Real backends (network calls, batching, retry) live in the
//! `shop-assist` app crate. This module defines the interface they
//! implement, the fallback embedder used for offline operation and as
//! automatic recovery when a backend errors, and the byte-level codec
//! used at the storage boundary.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Fixed dimensionality of every embedding vector in the system.
pub const EMBEDDING_DIMS: usize = 1536;

/// Trait for embedding providers.
///
/// Implementations must produce vectors of exactly [`dims`] components
/// — never ragged output. A backend that cannot be reached fails with
/// [`Error::ProviderUnavailable`].
///
/// [`dims`]: EmbeddingProvider::dims
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Deterministic, offline embedding provider.
///
/// Hashes the input text into a seed and expands it through a fixed
/// trigonometric formula, so identical text always yields bit-identical
/// vectors. This makes tests reproducible and keeps reindexing and
/// search operational when no real backend is reachable. The output
/// carries no semantic signal — keyword matching in the ranking layer
/// is what keeps results usable under this provider.
pub struct FallbackEmbedder {
    dims: usize,
}

impl FallbackEmbedder {
    pub fn new() -> Self {
        Self {
            dims: EMBEDDING_DIMS,
        }
    }

    /// A fallback with a non-standard dimensionality, for tests that
    /// don't want to carry 1536-float vectors around.
    pub fn with_dims(dims: usize) -> Self {
        Self { dims }
    }
}

impl Default for FallbackEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for FallbackEmbedder {
    fn model_name(&self) -> &str {
        "deterministic-fallback"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(deterministic_embedding(text, self.dims))
    }
}

/// Pure function behind [`FallbackEmbedder`].
///
/// Component `i` is `sin(seed · (i + 1) · 0.001)` where `seed` is the
/// SHA-256 of the text folded into a small integer.
pub fn deterministic_embedding(text: &str, dims: usize) -> Vec<f32> {
    let digest = Sha256::digest(text.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let seed = (u64::from_le_bytes(bytes) % 1_000_000) as f64;

    (0..dims)
        .map(|i| (seed * (i as f64 + 1.0) * 0.001).sin() as f32)
        .collect()
}

/// Encode a vector as little-endian `f32` bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector. Trailing partial values are
/// dropped; use [`decode_embedding`] when the dimensionality must hold.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Decode a stored embedding, enforcing the expected dimensionality.
///
/// A blob of the wrong length is a [`Error::MalformedEmbedding`] —
/// callers typically log it and rank the chunk as a zero vector rather
/// than failing the whole search.
pub fn decode_embedding(blob: &[u8], dims: usize) -> Result<Vec<f32>> {
    if blob.len() != dims * 4 {
        return Err(Error::MalformedEmbedding {
            expected: dims,
            found: blob.len() / 4,
        });
    }
    Ok(blob_to_vec(blob))
}
