//! Storage layer: persistent key-value stores backing the pipeline.
//!
//! Every store is a JSON file that is loaded once at startup, mutated in
//! place, and rewritten to disk after each mutation. Entries carry an
//! insertion sequence number so that stores with a size cap can evict the
//! oldest entries first.

pub mod kv;
pub mod models;

use std::path::Path;

pub use kv::{KvStore, StoreError};
pub use models::{CategoryEmbedding, HashRecord};

/// Content hash -> record of the first placement of that content.
pub type HashIndex = KvStore<HashRecord>;

/// Content hash -> extracted text sample (including error placeholders).
pub type ContentCache = KvStore<String>;

/// Embedding cache: per-category vectors (invalidated when the keyword set
/// changes, tracked via a fingerprint) and per-sample vectors keyed by
/// content hash.
pub struct EmbeddingCache {
    categories: KvStore<CategoryEmbedding>,
    samples: KvStore<Vec<f32>>,
}

impl EmbeddingCache {
    pub fn open(dir: &Path, sample_cap: usize) -> Result<Self, StoreError> {
        Ok(Self {
            // One slot per category; the cap only matters for samples.
            categories: KvStore::open(&dir.join("embedding_categories.json"), usize::MAX)?,
            samples: KvStore::open(&dir.join("embedding_samples.json"), sample_cap)?,
        })
    }

    /// Returns the cached vector for a category only if it was derived from
    /// the same keyword set (same fingerprint).
    pub fn category(&self, name: &str, fingerprint: &str) -> Option<Vec<f32>> {
        self.categories
            .get(name)
            .filter(|e| e.fingerprint == fingerprint)
            .map(|e| e.vector.clone())
    }

    pub fn set_category(
        &mut self,
        name: &str,
        fingerprint: &str,
        vector: Vec<f32>,
    ) -> Result<(), StoreError> {
        self.categories.insert(
            name.to_string(),
            CategoryEmbedding {
                fingerprint: fingerprint.to_string(),
                vector,
            },
        )
    }

    /// Drops the cached vector for a category, forcing re-derivation on the
    /// next classification.
    pub fn invalidate_category(&mut self, name: &str) -> Result<(), StoreError> {
        self.categories.remove(name)?;
        Ok(())
    }

    pub fn sample(&self, hash: &str) -> Option<&Vec<f32>> {
        self.samples.get(hash)
    }

    pub fn set_sample(&mut self, hash: &str, vector: Vec<f32>) -> Result<(), StoreError> {
        self.samples.insert(hash.to_string(), vector)
    }
}
