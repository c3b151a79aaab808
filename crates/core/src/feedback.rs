//! Correction-driven learning loop.
//!
//! Users correct a misfiled document by dropping it into
//! `feedback/<correct-category>/` under a `<original-category>--<name>`
//! file name. The sweep records the correction, accumulates word
//! frequencies from the document, promotes recurring words into the
//! corrected category's keyword list, and re-files the document. To make
//! corrections cheap, every normally placed file also leaves a
//! `<category>--<name>` link in `feedback/recent/`.

use crate::config::AppConfig;
use crate::extract::text::{decode_bytes, read_prefix};
use crate::keywords::SharedKeywords;
use crate::models::FeedbackCorrection;
use crate::placement;
use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use storage::EmbeddingCache;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const WORD_MIN_LEN: usize = 3;
const WORD_MAX_LEN: usize = 15;

/// Corrections log plus the per-category word frequency counters the
/// keyword promotion is based on. One JSON file, rewritten after each
/// sweep that changed it.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CorrectionsLog {
    corrections: Vec<FeedbackCorrection>,
    word_counts: HashMap<String, HashMap<String, u32>>,
}

impl CorrectionsLog {
    fn load(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(log) => log,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "corrections log unreadable, starting fresh");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        let encoded = serde_json::to_vec_pretty(self)?;
        fs::write(&tmp, encoded)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

pub struct FeedbackLoop {
    keywords: SharedKeywords,
    feedback_dir: PathBuf,
    recent_dir: PathBuf,
    organized_dir: PathBuf,
    corrections_path: PathBuf,
    categories: Vec<String>,
    sample_length: usize,
    interval: Duration,
    min_word_count: u32,
    max_new_keywords_per_cycle: usize,
    recent_limit: usize,
    symlink: bool,
}

impl FeedbackLoop {
    pub fn new(cfg: &AppConfig, keywords: SharedKeywords, symlink: bool) -> Self {
        Self {
            keywords,
            feedback_dir: cfg.feedback_dir(),
            recent_dir: cfg.feedback_recent_dir(),
            organized_dir: cfg.organized_dir(),
            corrections_path: cfg.corrections_path(),
            categories: cfg.categories.clone(),
            sample_length: cfg.sample_length,
            interval: Duration::from_millis(cfg.feedback.interval_ms),
            min_word_count: cfg.feedback.min_word_count,
            max_new_keywords_per_cycle: cfg.feedback.max_new_keywords_per_cycle,
            recent_limit: cfg.feedback.recent_limit,
            symlink,
        }
    }

    /// Periodic sweep until shutdown. Sweep errors are logged, never fatal.
    pub async fn run(&self, embeddings: &Mutex<EmbeddingCache>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep(embeddings) {
                        Ok(0) => {}
                        Ok(n) => info!(corrections = n, "feedback sweep applied corrections"),
                        Err(e) => warn!(error = %e, "feedback sweep failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }

    /// One pass over the feedback area. Returns the number of corrections
    /// applied.
    pub fn sweep(&self, embeddings: &Mutex<EmbeddingCache>) -> Result<usize> {
        let mut log = CorrectionsLog::load(&self.corrections_path);
        let mut applied = 0;
        let mut touched_categories = Vec::new();

        for category in &self.categories {
            let dir = self.feedback_dir.join(category);
            if !dir.is_dir() {
                continue;
            }
            let mut files: Vec<PathBuf> = fs::read_dir(&dir)
                .with_context(|| format!("reading feedback dir {:?}", dir))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect();
            files.sort();

            for file in files {
                match self.apply_correction(&file, category, &mut log) {
                    Ok(true) => {
                        applied += 1;
                        touched_categories.push(category.clone());
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(file = %file.display(), error = %e, "failed to apply correction")
                    }
                }
            }
        }

        if applied > 0 {
            for category in &touched_categories {
                self.promote_keywords(category, &log);
                let mut cache = embeddings.lock().expect("embedding cache mutex poisoned");
                if let Err(e) = cache.invalidate_category(category) {
                    warn!(category = %category, error = %e, "failed to invalidate category embedding");
                }
            }
            log.save(&self.corrections_path)?;
        }
        Ok(applied)
    }

    /// Handles a single file found in `feedback/<corrected>/`. Files that do
    /// not follow the `<original>--<name>` convention are left alone.
    fn apply_correction(
        &self,
        file: &Path,
        corrected: &str,
        log: &mut CorrectionsLog,
    ) -> Result<bool> {
        let name = match file.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => return Ok(false),
        };
        let (original, bare_name) = match name.split_once("--") {
            Some((orig, rest)) if self.categories.iter().any(|c| c == orig) && !rest.is_empty() => {
                (orig.to_string(), rest.to_string())
            }
            _ => {
                debug!(file = %name, "ignoring feedback file without category prefix");
                return Ok(false);
            }
        };

        let bytes = read_prefix(file, self.sample_length * 4)?;
        let text = decode_bytes(&bytes, self.sample_length);
        let counts = log.word_counts.entry(corrected.to_string()).or_default();
        for word in tokenize(&text) {
            *counts.entry(word).or_insert(0) += 1;
        }

        log.corrections.push(FeedbackCorrection {
            file_name: bare_name.clone(),
            original_category: original.clone(),
            corrected_category: corrected.to_string(),
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        });

        let dest = placement::place(file, &self.organized_dir.join(corrected), &bare_name)?;
        info!(
            file = %bare_name,
            from = %original,
            to = %corrected,
            placed = %dest.display(),
            "applied correction"
        );
        Ok(true)
    }

    /// Promotes recurring words from the correction log into the category's
    /// keyword list, bounded per cycle so one sweep cannot flood the table.
    fn promote_keywords(&self, category: &str, log: &CorrectionsLog) {
        let counts = match log.word_counts.get(category) {
            Some(c) => c,
            None => return,
        };
        let mut candidates: Vec<(&String, &u32)> = counts
            .iter()
            .filter(|(_, count)| **count >= self.min_word_count)
            .collect();
        // Most frequent first; name order breaks ties deterministically.
        candidates.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

        let mut table = self.keywords.lock().expect("keyword table mutex poisoned");
        let mut added = 0;
        for (word, count) in candidates {
            if added >= self.max_new_keywords_per_cycle {
                break;
            }
            if table.add(category, word) {
                debug!(category = %category, word = %word, count = %count, "learned keyword");
                added += 1;
            }
        }
        if added > 0 {
            info!(category = %category, added, "keyword table grew from feedback");
        }
    }

    /// Leaves a `<category>--<name>` pointer to a freshly placed file in
    /// `feedback/recent/`, pruned to the newest entries.
    pub fn record_recent(&self, placed: &Path, category: &str) -> Result<()> {
        let name = placed
            .file_name()
            .and_then(|n| n.to_str())
            .context("placed file has no name")?;
        fs::create_dir_all(&self.recent_dir)?;
        let link = self.recent_dir.join(format!("{}--{}", category, name));
        if link.exists() {
            return Ok(());
        }
        if self.symlink {
            link_file(placed, &link)?;
        } else {
            fs::copy(placed, &link)?;
        }
        self.prune_recent()?;
        Ok(())
    }

    fn prune_recent(&self) -> Result<()> {
        let mut entries: Vec<(PathBuf, std::time::SystemTime)> = fs::read_dir(&self.recent_dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let meta = e.metadata().ok()?;
                Some((e.path(), meta.modified().ok()?))
            })
            .collect();
        if entries.len() <= self.recent_limit {
            return Ok(());
        }
        entries.sort_by_key(|(_, mtime)| *mtime);
        let excess = entries.len() - self.recent_limit;
        for (path, _) in entries.into_iter().take(excess) {
            if let Err(e) = fs::remove_file(&path) {
                warn!(file = %path.display(), error = %e, "failed to prune recent entry");
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn link_file(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn link_file(target: &Path, link: &Path) -> std::io::Result<()> {
    fs::copy(target, link).map(|_| ())
}

/// Lowercase ascii-alphabetic words of moderate length; everything else is
/// a separator.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| (WORD_MIN_LEN..=WORD_MAX_LEN).contains(&w.len()))
        .map(|w| w.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::KeywordTable;
    use tempfile::tempdir;

    fn setup(dir: &Path) -> (FeedbackLoop, SharedKeywords, Mutex<EmbeddingCache>) {
        let cfg = AppConfig {
            base_dir: dir.to_string_lossy().into_owned(),
            ..AppConfig::default()
        };
        cfg.ensure_directories().unwrap();
        let keywords = KeywordTable::shared(&cfg);
        let feedback = FeedbackLoop::new(&cfg, keywords.clone(), false);
        let embeddings = Mutex::new(EmbeddingCache::open(dir, 100).unwrap());
        (feedback, keywords, embeddings)
    }

    #[test]
    fn correction_moves_file_and_logs_it() {
        let dir = tempdir().unwrap();
        let (feedback, _, embeddings) = setup(dir.path());

        let receipts_feedback = dir.path().join("feedback").join("receipts");
        fs::write(
            receipts_feedback.join("taxes--grocery_run.txt"),
            "grocery grocery store store milk",
        )
        .unwrap();

        assert_eq!(feedback.sweep(&embeddings).unwrap(), 1);
        assert!(dir
            .path()
            .join("organized")
            .join("receipts")
            .join("grocery_run.txt")
            .exists());

        let log = CorrectionsLog::load(&dir.path().join("feedback").join("corrections.json"));
        assert_eq!(log.corrections.len(), 1);
        assert_eq!(log.corrections[0].original_category, "taxes");
        assert_eq!(log.corrections[0].corrected_category, "receipts");
        assert_eq!(log.corrections[0].file_name, "grocery_run.txt");
    }

    #[test]
    fn recurring_words_become_keywords() {
        let dir = tempdir().unwrap();
        let (feedback, keywords, embeddings) = setup(dir.path());

        fs::write(
            dir.path()
                .join("feedback")
                .join("receipts")
                .join("taxes--latte.txt"),
            "espresso espresso latte macchiato espresso",
        )
        .unwrap();
        feedback.sweep(&embeddings).unwrap();

        let table = keywords.lock().unwrap();
        assert!(table.contains("receipts", "espresso"));
        // Single occurrence stays below the promotion threshold.
        assert!(!table.contains("receipts", "latte"));
    }

    #[test]
    fn files_without_prefix_are_left_in_place() {
        let dir = tempdir().unwrap();
        let (feedback, _, embeddings) = setup(dir.path());

        let stray = dir
            .path()
            .join("feedback")
            .join("receipts")
            .join("no_prefix.txt");
        fs::write(&stray, "whatever").unwrap();
        assert_eq!(feedback.sweep(&embeddings).unwrap(), 0);
        assert!(stray.exists());

        // Unknown original category is also not a correction.
        let odd = dir
            .path()
            .join("feedback")
            .join("receipts")
            .join("nonsense--x.txt");
        fs::write(&odd, "whatever").unwrap();
        assert_eq!(feedback.sweep(&embeddings).unwrap(), 0);
        assert!(odd.exists());
    }

    #[test]
    fn recent_links_are_pruned_to_the_limit() {
        let dir = tempdir().unwrap();
        let cfg = AppConfig {
            base_dir: dir.path().to_string_lossy().into_owned(),
            feedback: crate::config::FeedbackConfig {
                recent_limit: 3,
                ..Default::default()
            },
            ..AppConfig::default()
        };
        cfg.ensure_directories().unwrap();
        let feedback = FeedbackLoop::new(&cfg, KeywordTable::shared(&cfg), false);

        let placed_dir = dir.path().join("organized").join("other");
        fs::create_dir_all(&placed_dir).unwrap();
        for i in 0..5 {
            let placed = placed_dir.join(format!("doc{}.txt", i));
            fs::write(&placed, "x").unwrap();
            feedback.record_recent(&placed, "other").unwrap();
        }
        let count = fs::read_dir(cfg.feedback_recent_dir()).unwrap().count();
        assert_eq!(count, 3);
    }

    #[test]
    fn tokenizer_bounds_word_length() {
        let words = tokenize("a an the WORD hyphen-split x123y supercalifragilistic");
        assert!(words.contains(&"the".to_string()));
        assert!(words.contains(&"word".to_string()));
        assert!(words.contains(&"hyphen".to_string()));
        assert!(!words.contains(&"an".to_string()));
        assert!(!words.contains(&"supercalifragilistic".to_string()));
    }
}
