//! Content-hash deduplication.
//!
//! Small files are hashed in full; files above the configured threshold are
//! hashed from three fixed windows (start, middle, end). Two large files
//! that agree on all three windows but differ in the interior will collide;
//! that approximation is an accepted performance trade-off.

use crate::config::{DedupConfig, DedupPolicy};
use crate::placement;
use anyhow::Context;
use chrono::Local;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use storage::{HashIndex, HashRecord};
use tracing::{info, warn};

/// Result of looking an incoming file up in the hash index.
#[derive(Debug)]
pub struct DedupCheck {
    pub hash: String,
    pub existing: Option<HashRecord>,
}

#[derive(Debug, Clone)]
pub struct DedupManager {
    policy: DedupPolicy,
    large_file_threshold: u64,
    sample_window: u64,
    duplicates_dir: PathBuf,
}

impl DedupManager {
    pub fn new(cfg: &DedupConfig, duplicates_dir: PathBuf) -> Self {
        Self {
            policy: cfg.policy,
            large_file_threshold: cfg.large_file_threshold,
            sample_window: cfg.sample_window,
            duplicates_dir,
        }
    }

    pub fn compute_hash(&self, path: &Path) -> anyhow::Result<String> {
        compute_hash(path, self.large_file_threshold, self.sample_window)
    }

    pub fn check(&self, path: &Path, index: &HashIndex) -> anyhow::Result<DedupCheck> {
        let hash = self.compute_hash(path)?;
        let existing = index.get(&hash).cloned();
        Ok(DedupCheck { hash, existing })
    }

    /// Applies the configured duplicate policy. Returns `true` when the
    /// file was handled here and the pipeline must stop for it.
    pub fn handle_duplicate(&self, path: &Path, existing: &HashRecord) -> anyhow::Result<bool> {
        let name = file_name(path);
        match self.policy {
            DedupPolicy::Skip => {
                // Deliberate data discard: the incoming copy is deleted
                // without being classified or recorded.
                warn!(file = %name, original = %existing.canonical_path, "skip policy: deleting duplicate");
                if let Err(e) = fs::remove_file(path) {
                    warn!(file = %name, error = %e, "failed to delete duplicate");
                }
                Ok(true)
            }
            DedupPolicy::Move => {
                fs::create_dir_all(&self.duplicates_dir)?;
                let timestamp = Local::now().format("%Y%m%d_%H%M%S");
                let new_name = format!("duplicate_{}_{}", timestamp, name);
                let dest =
                    placement::resolve_collision(&self.duplicates_dir.join(&new_name));
                placement::move_file(path, &dest)
                    .with_context(|| format!("moving duplicate {:?}", path))?;
                info!(file = %name, dest = %dest.display(), "moved duplicate");
                Ok(true)
            }
            DedupPolicy::Process => {
                info!(file = %name, original = %existing.canonical_path, "processing re-occurrence of known content");
                Ok(false)
            }
        }
    }

    /// Records a freshly placed non-duplicate file.
    pub fn record(
        &self,
        index: &mut HashIndex,
        hash: &str,
        placed_at: &Path,
        category: &str,
    ) -> anyhow::Result<()> {
        let size = fs::metadata(placed_at).map(|m| m.len()).unwrap_or(0);
        let record = HashRecord {
            hash: hash.to_string(),
            canonical_path: placed_at.to_string_lossy().into_owned(),
            file_name: file_name(placed_at),
            category: category.to_string(),
            file_size: size,
            date_added: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        index.insert(hash.to_string(), record)?;
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// blake3 of the full byte stream at or below the threshold; above it,
/// three fixed-size windows from the start, middle, and end.
pub fn compute_hash(path: &Path, threshold: u64, window: u64) -> anyhow::Result<String> {
    let meta = fs::metadata(path).with_context(|| format!("stat {:?}", path))?;
    let size = meta.len();
    let mut file = File::open(path).with_context(|| format!("open {:?}", path))?;
    let mut hasher = blake3::Hasher::new();

    if size <= threshold {
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
    } else {
        let window = window.min(size);
        hash_window(&mut file, &mut hasher, 0, window)?;
        hash_window(&mut file, &mut hasher, size / 2, window)?;
        hash_window(&mut file, &mut hasher, size.saturating_sub(window), window)?;
    }

    Ok(hasher.finalize().to_hex().to_string())
}

fn hash_window(
    file: &mut File,
    hasher: &mut blake3::Hasher,
    offset: u64,
    window: u64,
) -> anyhow::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    let mut remaining = window as usize;
    let mut buf = [0u8; 64 * 1024];
    while remaining > 0 {
        let want = remaining.min(buf.len());
        let n = file.read(&mut buf[..want])?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        remaining -= n;
    }
    Ok(())
}
