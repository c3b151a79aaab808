//! Pipeline assembly and the per-file processing sequence. Per-file
//! failures are logged and never tear the worker down.

use crate::classifier::{ClassificationCache, Classifier};
use crate::config::AppConfig;
use crate::dedup::DedupManager;
use crate::extract::{Extractor, ToolSupport};
use crate::feedback::FeedbackLoop;
use crate::keywords::{KeywordTable, SharedKeywords};
use crate::placement;
use crate::queue::{ProcessingQueue, QueueError};
use anyhow::{Context, Result};
use globset::GlobSet;
use providers::http::{HttpEmbeddingConfig, HttpEmbeddingProvider};
use providers::noop::NoopProvider;
use providers::pooling::PoolingProvider;
use providers::{EmbeddingProvider, ProviderRegistry};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storage::{ContentCache, EmbeddingCache, HashIndex};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Persisted stores shared between the worker and the feedback task. Plain
/// mutexes; every critical section is short and free of I/O waits other
/// than the store's own file rewrite.
pub struct Stores {
    pub hash_index: Mutex<HashIndex>,
    pub content_cache: Mutex<ContentCache>,
    pub classification_cache: Mutex<ClassificationCache>,
    pub embedding_cache: Mutex<EmbeddingCache>,
}

pub type SharedStores = Arc<Stores>;

pub struct Pipeline {
    cfg: AppConfig,
    queue: Arc<ProcessingQueue>,
    stores: SharedStores,
    keywords: SharedKeywords,
    extractor: Extractor,
    classifier: Classifier,
    dedup: DedupManager,
    feedback: FeedbackLoop,
    registry: ProviderRegistry,
    exclusions: GlobSet,
}

impl Pipeline {
    pub fn new(cfg: AppConfig) -> Result<Arc<Self>> {
        cfg.validate()?;
        cfg.ensure_directories()?;

        let tools = ToolSupport::probe();
        debug!(?tools, "host tool support");

        let stores = Arc::new(Stores {
            hash_index: Mutex::new(HashIndex::open(&cfg.hash_index_path(), usize::MAX)?),
            content_cache: Mutex::new(ContentCache::open(
                &cfg.content_cache_path(),
                cfg.cache.content_cache_size,
            )?),
            classification_cache: Mutex::new(ClassificationCache::open(
                &cfg.classification_cache_path(),
                cfg.cache.content_cache_size,
            )?),
            embedding_cache: Mutex::new(EmbeddingCache::open(
                &cfg.base_dir(),
                cfg.cache.embedding_cache_size,
            )?),
        });

        let keywords = KeywordTable::shared(&cfg);
        let registry = build_registry(&cfg)?;
        let exclusions = cfg.exclusion_matcher()?;

        Ok(Arc::new(Self {
            queue: Arc::new(ProcessingQueue::new(cfg.processing.queue_capacity)),
            extractor: Extractor::new(&cfg, tools),
            classifier: Classifier::new(&cfg, keywords.clone()),
            dedup: DedupManager::new(&cfg.deduplication, cfg.duplicates_dir()),
            feedback: FeedbackLoop::new(&cfg, keywords.clone(), tools.symlink),
            stores,
            keywords,
            registry,
            exclusions,
            cfg,
        }))
    }

    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    pub fn queue(&self) -> Arc<ProcessingQueue> {
        self.queue.clone()
    }

    pub fn stores(&self) -> SharedStores {
        self.stores.clone()
    }

    pub fn keywords(&self) -> SharedKeywords {
        self.keywords.clone()
    }

    pub fn close(&self) {
        self.queue.close();
    }

    /// Enqueues a newly observed intake file, applying the exclusion globs.
    /// A full queue drops the file with a warning; it stays in the intake
    /// directory and is picked up by a later scan.
    pub fn enqueue(&self, path: PathBuf) {
        if AppConfig::is_excluded(&self.exclusions, &path) {
            debug!(file = %path.display(), "excluded by filter");
            return;
        }
        match self.queue.enqueue(path.clone()) {
            Ok(()) => debug!(file = %path.display(), "queued"),
            Err(QueueError::Full(cap)) => {
                warn!(file = %path.display(), capacity = cap, "queue full, leaving file in intake")
            }
        }
    }

    /// Scans the intake directory and enqueues everything already there.
    pub fn enqueue_backlog(&self) -> Result<usize> {
        let mut queued = 0;
        let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(self.cfg.drop_dir())
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        paths.sort();
        for path in paths {
            if !AppConfig::is_excluded(&self.exclusions, &path) {
                match self.queue.enqueue(path) {
                    Ok(()) => queued += 1,
                    Err(QueueError::Full(_)) => break,
                }
            }
        }
        Ok(queued)
    }

    /// Queue consumer. Waits out the settle delay, then checks the file can
    /// be opened for reading before processing; still-locked files are
    /// re-enqueued a bounded number of times.
    pub async fn worker(&self) {
        let settle = Duration::from_millis(self.cfg.processing.settle_delay_ms);
        let mut open_retries: HashMap<PathBuf, u32> = HashMap::new();

        while let Some(path) = self.queue.dequeue().await {
            if !settle.is_zero() {
                tokio::time::sleep(settle).await;
            }
            if !path.exists() {
                debug!(file = %path.display(), "file vanished before processing");
                open_retries.remove(&path);
                continue;
            }
            if let Err(e) = try_read_open(&path) {
                if matches!(e.kind(), ErrorKind::PermissionDenied | ErrorKind::WouldBlock) {
                    let count = open_retries.entry(path.clone()).or_insert(0);
                    *count += 1;
                    if *count > self.cfg.processing.max_open_retries {
                        warn!(file = %path.display(), "file stayed locked, giving up");
                        open_retries.remove(&path);
                    } else {
                        debug!(file = %path.display(), attempt = *count, "file busy, re-queueing");
                        self.enqueue(path);
                    }
                } else {
                    warn!(file = %path.display(), error = %e, "cannot open file, skipping");
                    open_retries.remove(&path);
                }
                continue;
            }
            open_retries.remove(&path);
            if let Err(e) = self.process_file(&path).await {
                warn!(file = %path.display(), error = %e, "processing failed, file left in intake");
            }
        }
        debug!("worker finished, queue closed and drained");
    }

    /// Full per-file sequence: dedup, extract, classify, place, record.
    pub async fn process_file(&self, path: &Path) -> Result<()> {
        let check = {
            let index = self.stores.hash_index.lock().expect("hash index mutex poisoned");
            self.dedup.check(path, &index)?
        };

        let known_content = if let Some(existing) = &check.existing {
            if self.cfg.deduplication.enabled && self.dedup.handle_duplicate(path, existing)? {
                return Ok(());
            }
            true
        } else {
            false
        };

        let sample = self.extractor.extract(
            path,
            &check.hash,
            &self.stores.content_cache,
            self.cfg.cache.enable_content_cache,
        );

        let provider = self.embedding_provider();
        let classification = self
            .classifier
            .classify(
                path,
                &sample,
                provider.as_ref(),
                &self.stores.classification_cache,
                self.cfg.cache.enable_content_cache,
                &self.stores.embedding_cache,
            )
            .await;

        let dest = placement::place(
            path,
            &self.cfg.category_dir(&classification.category),
            &classification.file_name,
        )?;
        info!(
            file = %path.display(),
            category = %classification.category,
            placed = %dest.display(),
            "file organized"
        );

        // The first placement of a content hash stays canonical.
        if !known_content {
            let mut index = self.stores.hash_index.lock().expect("hash index mutex poisoned");
            self.dedup
                .record(&mut index, &check.hash, &dest, &classification.category)?;
        }

        if self.cfg.feedback.enabled {
            if let Err(e) = self.feedback.record_recent(&dest, &classification.category) {
                warn!(error = %e, "failed to record recent placement");
            }
        }
        Ok(())
    }

    pub async fn run_feedback(&self, shutdown: watch::Receiver<bool>) {
        if !self.cfg.feedback.enabled {
            return;
        }
        self.feedback
            .run(&self.stores.embedding_cache, shutdown)
            .await;
    }

    pub fn feedback_sweep(&self) -> Result<usize> {
        self.feedback.sweep(&self.stores.embedding_cache)
    }

    fn embedding_provider(&self) -> Option<Arc<dyn EmbeddingProvider>> {
        self.registry.embedding(None).ok()
    }
}

/// Processing only ever reads the file, so readiness is checked with a
/// read-only open: a write-open would reject files that arrive with
/// read-only permissions (copied off read-only media, for instance). On
/// Windows a sharing violation from a still-writing producer surfaces here
/// as PermissionDenied; treat that as "not ready yet".
fn try_read_open(path: &Path) -> std::io::Result<()> {
    fs::OpenOptions::new().read(true).open(path).map(|_| ())
}

fn build_registry(cfg: &AppConfig) -> Result<ProviderRegistry> {
    let registry = ProviderRegistry::new().with_embedding("noop", Arc::new(NoopProvider));
    match cfg.embedding.provider.as_str() {
        // No preferred provider: classification stays keyword-only.
        "none" | "noop" => Ok(registry),
        "pooling" => Ok(registry
            .with_embedding(
                "pooling",
                Arc::new(PoolingProvider::new(cfg.embedding.dimension)),
            )
            .set_preferred_embedding("pooling")),
        "http" => {
            let base_url = cfg
                .embedding
                .base_url
                .clone()
                .context("embedding.base_url is required for the http provider")?;
            let provider = HttpEmbeddingProvider::new(HttpEmbeddingConfig {
                base_url,
                api_key: std::env::var("EMBEDDING_API_KEY").ok(),
                model: cfg.embedding.model.clone(),
            });
            Ok(registry
                .with_embedding("http", Arc::new(provider))
                .set_preferred_embedding("http"))
        }
        other => anyhow::bail!("unknown embedding provider {:?}", other),
    }
}
