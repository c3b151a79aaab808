use serde::{Deserialize, Serialize};

/// One record per distinct content hash ever placed. Written once when a
/// non-duplicate file is placed, then only read to detect later duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashRecord {
    pub hash: String,
    /// Final path the file was placed at.
    pub canonical_path: String,
    pub file_name: String,
    pub category: String,
    pub file_size: u64,
    pub date_added: String,
}

/// Vector derived from a category's name plus its keyword list. The
/// fingerprint identifies the keyword set the vector was derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEmbedding {
    pub fingerprint: String,
    pub vector: Vec<f32>,
}
