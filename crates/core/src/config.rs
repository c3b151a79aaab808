use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base directory everything lives under: intake, organized output,
    /// duplicates, feedback area, and the persisted stores.
    pub base_dir: String,
    pub drop_dir_name: String,
    pub organized_dir_name: String,
    pub duplicates_dir_name: String,
    pub feedback_dir_name: String,

    /// Category declaration order matters: keyword-score ties break toward
    /// the earlier category.
    pub categories: Vec<String>,
    pub fallback_category: String,
    /// Authoritative keyword seed. Empty means "use the built-in seed".
    pub category_keywords: HashMap<String, Vec<String>>,

    pub sample_length: usize,
    pub excluded_extensions: Vec<String>,
    pub excluded_files: Vec<String>,

    pub processing: ProcessingConfig,
    pub deduplication: DedupConfig,
    pub extraction: ExtractionConfig,
    pub cache: CacheConfig,
    pub embedding: EmbeddingConfig,
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Pause before touching a newly observed file, so the producing
    /// application can finish writing it.
    pub settle_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub queue_capacity: usize,
    /// How many times a still-locked file is re-enqueued before giving up
    /// and leaving it in the intake directory.
    pub max_open_retries: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 1_000,
            poll_interval_ms: 500,
            queue_capacity: 256,
            max_open_retries: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupPolicy {
    /// Delete the incoming duplicate without classifying it.
    Skip,
    /// Relocate the incoming duplicate into the duplicates directory.
    Move,
    /// Continue the pipeline, noting the re-occurrence.
    Process,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub enabled: bool,
    pub policy: DedupPolicy,
    /// Files above this size are hashed by sampling three windows instead
    /// of the full byte stream.
    pub large_file_threshold: u64,
    pub sample_window: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            policy: DedupPolicy::Move,
            large_file_threshold: 100 * 1024 * 1024,
            sample_window: 4 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub enable_audio_analysis: bool,
    pub enable_video_analysis: bool,
    pub enable_archive_inspection: bool,
    pub ocr_languages: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enable_audio_analysis: true,
            enable_video_analysis: true,
            enable_archive_inspection: true,
            ocr_languages: vec!["eng".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Gates both the content-sample cache and the classification-result
    /// cache.
    pub enable_content_cache: bool,
    pub content_cache_size: usize,
    pub enable_embedding_cache: bool,
    pub embedding_cache_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_content_cache: true,
            content_cache_size: 500,
            enable_embedding_cache: true,
            embedding_cache_size: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "none", "pooling", or "http".
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub dimension: usize,
    pub similarity_threshold: f32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "none".to_string(),
            model: "text-embedding-3-small".to_string(),
            base_url: None,
            dimension: 384,
            similarity_threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    /// A word must appear this many times in corrected files before it is
    /// promoted to a category keyword.
    pub min_word_count: u32,
    pub max_new_keywords_per_cycle: usize,
    /// How many preview links are kept under feedback/recent.
    pub recent_limit: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 10_000,
            min_word_count: 2,
            max_new_keywords_per_cycle: 20,
            recent_limit: 50,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_dir: "sorted".to_string(),
            drop_dir_name: "drop".to_string(),
            organized_dir_name: "organized".to_string(),
            duplicates_dir_name: "duplicates".to_string(),
            feedback_dir_name: "feedback".to_string(),
            categories: default_categories(),
            fallback_category: "other".to_string(),
            category_keywords: HashMap::new(),
            sample_length: 1_000,
            excluded_extensions: vec![".tmp".into(), ".part".into(), ".crdownload".into()],
            excluded_files: vec![".DS_Store".into(), "Thumbs.db".into()],
            processing: ProcessingConfig::default(),
            deduplication: DedupConfig::default(),
            extraction: ExtractionConfig::default(),
            cache: CacheConfig::default(),
            embedding: EmbeddingConfig::default(),
            feedback: FeedbackConfig::default(),
        }
    }
}

fn default_categories() -> Vec<String> {
    [
        "taxes",
        "receipts",
        "personal_id",
        "medical",
        "work",
        "education",
        "financial",
        "legal",
        "correspondence",
        "other",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Built-in keyword seed applied when the config supplies none.
pub fn default_keyword_seed() -> HashMap<String, Vec<String>> {
    let seed: &[(&str, &[&str])] = &[
        (
            "taxes",
            &["tax", "taxes", "irs", "return", "w-2", "w2", "1099", "deduction"],
        ),
        (
            "receipts",
            &["receipt", "purchase", "order", "transaction", "payment"],
        ),
        (
            "personal_id",
            &["passport", "license", "identification", "birth", "certificate", "ssn"],
        ),
        (
            "medical",
            &["medical", "health", "doctor", "prescription", "hospital", "insurance"],
        ),
        (
            "work",
            &["work", "job", "employment", "resume", "cv", "career", "position", "salary"],
        ),
        (
            "education",
            &["education", "school", "university", "college", "degree", "transcript", "diploma"],
        ),
        (
            "financial",
            &["bank", "statement", "account", "finance", "investment", "stock", "dividend", "saving"],
        ),
        (
            "legal",
            &["legal", "contract", "agreement", "law", "attorney", "court", "case", "will", "estate"],
        ),
        (
            "correspondence",
            &["letter", "email", "correspondence", "memo", "communication"],
        ),
        ("other", &[]),
    ];
    seed.iter()
        .map(|(cat, words)| {
            (
                cat.to_string(),
                words.iter().map(|w| w.to_string()).collect(),
            )
        })
        .collect()
}

impl AppConfig {
    pub fn base_dir(&self) -> PathBuf {
        PathBuf::from(&self.base_dir)
    }

    pub fn drop_dir(&self) -> PathBuf {
        self.base_dir().join(&self.drop_dir_name)
    }

    pub fn organized_dir(&self) -> PathBuf {
        self.base_dir().join(&self.organized_dir_name)
    }

    pub fn category_dir(&self, category: &str) -> PathBuf {
        self.organized_dir().join(category)
    }

    pub fn duplicates_dir(&self) -> PathBuf {
        self.base_dir().join(&self.duplicates_dir_name)
    }

    pub fn feedback_dir(&self) -> PathBuf {
        self.base_dir().join(&self.feedback_dir_name)
    }

    pub fn feedback_recent_dir(&self) -> PathBuf {
        self.feedback_dir().join("recent")
    }

    pub fn hash_index_path(&self) -> PathBuf {
        self.base_dir().join("hash_index.json")
    }

    pub fn content_cache_path(&self) -> PathBuf {
        self.base_dir().join("content_cache.json")
    }

    pub fn classification_cache_path(&self) -> PathBuf {
        self.base_dir().join("classification_cache.json")
    }

    pub fn corrections_path(&self) -> PathBuf {
        self.feedback_dir().join("corrections.json")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.categories.is_empty() {
            anyhow::bail!("category list must not be empty");
        }
        if !self.categories.contains(&self.fallback_category) {
            anyhow::bail!(
                "fallback category {:?} is not in the category list",
                self.fallback_category
            );
        }
        if self.sample_length == 0 {
            anyhow::bail!("sample_length must be positive");
        }
        if self.processing.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be positive");
        }
        if self.deduplication.sample_window == 0 {
            anyhow::bail!("deduplication sample_window must be positive");
        }
        for cat in self.category_keywords.keys() {
            if !self.categories.contains(cat) {
                anyhow::bail!("category_keywords entry {:?} is not a configured category", cat);
            }
        }
        Ok(())
    }

    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        use anyhow::Context;
        std::fs::create_dir_all(self.base_dir())
            .with_context(|| format!("base directory {:?} is not writable", self.base_dir))?;
        std::fs::create_dir_all(self.drop_dir())?;
        std::fs::create_dir_all(self.organized_dir())?;
        if self.deduplication.enabled && self.deduplication.policy == DedupPolicy::Move {
            std::fs::create_dir_all(self.duplicates_dir())?;
        }
        for category in &self.categories {
            std::fs::create_dir_all(self.category_dir(category))?;
            if self.feedback.enabled {
                std::fs::create_dir_all(self.feedback_dir().join(category))?;
            }
        }
        if self.feedback.enabled {
            std::fs::create_dir_all(self.feedback_recent_dir())?;
        }
        Ok(())
    }

    pub fn exclusion_matcher(&self) -> anyhow::Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for ext in &self.excluded_extensions {
            let pat = format!("*{}", ext);
            builder.add(Glob::new(&pat)?);
        }
        for name in &self.excluded_files {
            builder.add(Glob::new(name)?);
        }
        Ok(builder.build()?)
    }

    pub fn is_excluded(matcher: &GlobSet, path: &Path) -> bool {
        path.file_name()
            .map(|name| matcher.is_match(Path::new(name)))
            .unwrap_or(true)
    }
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    let cfg = settings.build()?;
    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_missing_fallback_category() {
        let cfg = AppConfig {
            categories: vec!["invoices".into()],
            fallback_category: "other".into(),
            category_keywords: HashMap::new(),
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_keywords_for_unknown_category() {
        let mut cfg = AppConfig::default();
        cfg.category_keywords
            .insert("nonexistent".into(), vec!["x".into()]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn exclusion_matcher_covers_extensions_and_names() {
        let cfg = AppConfig::default();
        let m = cfg.exclusion_matcher().unwrap();
        assert!(AppConfig::is_excluded(&m, Path::new("/x/download.part")));
        assert!(AppConfig::is_excluded(&m, Path::new("/x/Thumbs.db")));
        assert!(!AppConfig::is_excluded(&m, Path::new("/x/report.pdf")));
    }
}
