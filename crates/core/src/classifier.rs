//! Category classification: keyword scoring with an optional embedding
//! refinement pass, plus derivation of the placed file's name. Any
//! provider failure during refinement falls back to the keyword result.

use crate::config::AppConfig;
use crate::keywords::{KeywordTable, SharedKeywords};
use crate::models::{Classification, ContentSample};
use chrono::Local;
use providers::EmbeddingProvider;
use std::path::Path;
use std::sync::{Arc, Mutex};
use storage::{EmbeddingCache, KvStore};
use tracing::{debug, warn};

/// Classification result cache: content hash -> prior decision.
pub type ClassificationCache = KvStore<Classification>;

const TITLE_MAX_CHARS: usize = 30;
const TITLE_LINE_RANGE: std::ops::RangeInclusive<usize> = 5..=50;
const TITLE_CANDIDATE_LINES: usize = 5;

pub struct Classifier {
    keywords: SharedKeywords,
    fallback_category: String,
    similarity_threshold: f32,
    embedding_cache_enabled: bool,
}

impl Classifier {
    pub fn new(cfg: &AppConfig, keywords: SharedKeywords) -> Self {
        Self {
            keywords,
            fallback_category: cfg.fallback_category.clone(),
            similarity_threshold: cfg.embedding.similarity_threshold,
            embedding_cache_enabled: cfg.cache.enable_embedding_cache,
        }
    }

    pub async fn classify(
        &self,
        path: &Path,
        sample: &ContentSample,
        provider: Option<&Arc<dyn EmbeddingProvider>>,
        cache: &Mutex<ClassificationCache>,
        cache_enabled: bool,
        embeddings: &Mutex<EmbeddingCache>,
    ) -> Classification {
        if cache_enabled {
            let cache = cache.lock().expect("classification cache mutex poisoned");
            if let Some(prior) = cache.get(&sample.hash) {
                debug!(file = %path.display(), "classification cache hit");
                return prior.clone();
            }
        }

        let result = self.decide(path, sample, provider, embeddings).await;

        if cache_enabled {
            let mut cache = cache.lock().expect("classification cache mutex poisoned");
            if let Err(e) = cache.insert(sample.hash.clone(), result.clone()) {
                warn!(error = %e, "failed to persist classification cache");
            }
        }
        result
    }

    async fn decide(
        &self,
        path: &Path,
        sample: &ContentSample,
        provider: Option<&Arc<dyn EmbeddingProvider>>,
        embeddings: &Mutex<EmbeddingCache>,
    ) -> Classification {
        if sample.text.trim().is_empty() {
            let timestamp = Local::now().format("%Y%m%d_%H%M%S");
            return Classification {
                category: self.fallback_category.clone(),
                file_name: format!("unprocessed_{}{}", timestamp, extension_of(path)),
            };
        }

        // Snapshot so the table lock is never held across an await.
        let table = self
            .keywords
            .lock()
            .expect("keyword table mutex poisoned")
            .clone();

        let mut category = keyword_category(&table, &sample.text)
            .unwrap_or_else(|| self.fallback_category.clone());

        if let Some(provider) = provider {
            match self.refine(&table, sample, provider, embeddings).await {
                Ok(Some(refined)) => {
                    if refined != category {
                        debug!(from = %category, to = %refined, "embedding refinement overrode keyword result");
                    }
                    category = refined;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "embedding refinement unavailable, keeping keyword result")
                }
            }
        }

        let file_name = derive_file_name(path, &sample.text, &category);
        Classification {
            category,
            file_name,
        }
    }

    /// Returns the embedding-refined category, or None when no category
    /// clears the similarity threshold.
    async fn refine(
        &self,
        table: &KeywordTable,
        sample: &ContentSample,
        provider: &Arc<dyn EmbeddingProvider>,
        embeddings: &Mutex<EmbeddingCache>,
    ) -> anyhow::Result<Option<String>> {
        let cached_sample = if self.embedding_cache_enabled {
            let cache = embeddings.lock().expect("embedding cache mutex poisoned");
            cache.sample(&sample.hash).cloned()
        } else {
            None
        };
        let sample_vector = match cached_sample {
            Some(v) => v,
            None => {
                let response = provider.embed(&[sample.text.clone()]).await?;
                let vector = response
                    .vectors
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("provider returned no sample vector"))?;
                if self.embedding_cache_enabled {
                    let mut cache = embeddings.lock().expect("embedding cache mutex poisoned");
                    cache.set_sample(&sample.hash, vector.clone())?;
                }
                vector
            }
        };

        // Re-derive vectors only for categories whose keyword set changed
        // since they were cached; with the cache disabled, every category
        // is embedded on every refinement.
        let mut category_vectors: Vec<(String, Vec<f32>)> = Vec::new();
        let mut missing: Vec<(String, String, String)> = Vec::new();
        if self.embedding_cache_enabled {
            let cache = embeddings.lock().expect("embedding cache mutex poisoned");
            for name in table.categories() {
                let fingerprint = table.fingerprint(name);
                match cache.category(name, &fingerprint) {
                    Some(vector) => category_vectors.push((name.clone(), vector)),
                    None => {
                        missing.push((name.clone(), fingerprint, table.embedding_text(name)))
                    }
                }
            }
        } else {
            for name in table.categories() {
                missing.push((
                    name.clone(),
                    table.fingerprint(name),
                    table.embedding_text(name),
                ));
            }
        }
        if !missing.is_empty() {
            let texts: Vec<String> = missing.iter().map(|(_, _, t)| t.clone()).collect();
            let response = provider.embed(&texts).await?;
            if response.vectors.len() != missing.len() {
                anyhow::bail!(
                    "provider returned {} vectors for {} categories",
                    response.vectors.len(),
                    missing.len()
                );
            }
            if self.embedding_cache_enabled {
                let mut cache = embeddings.lock().expect("embedding cache mutex poisoned");
                for ((name, fingerprint, _), vector) in missing.into_iter().zip(response.vectors) {
                    cache.set_category(&name, &fingerprint, vector.clone())?;
                    category_vectors.push((name, vector));
                }
            } else {
                for ((name, _, _), vector) in missing.into_iter().zip(response.vectors) {
                    category_vectors.push((name, vector));
                }
            }
        }

        let mut best: Option<(&str, f32)> = None;
        for (name, vector) in &category_vectors {
            let similarity = cosine_similarity(&sample_vector, vector);
            if best.map(|(_, s)| similarity > s).unwrap_or(true) {
                best = Some((name, similarity));
            }
        }
        Ok(best
            .filter(|(_, s)| *s >= self.similarity_threshold)
            .map(|(name, _)| name.to_string()))
    }
}

/// Highest keyword-presence score wins; earlier-declared category wins ties.
/// None when no keyword matches at all.
fn keyword_category(table: &KeywordTable, text: &str) -> Option<String> {
    let haystack = text.to_lowercase();
    let mut best: Option<(&str, usize)> = None;
    for name in table.categories() {
        let score = table
            .keywords(name)
            .iter()
            .filter(|kw| haystack.contains(kw.as_str()))
            .count();
        if score > 0 && best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((name, score));
        }
    }
    best.map(|(name, _)| name.to_string())
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// `<title>_<timestamp><ext>`, where the title comes from the sample's
/// leading lines and falls back to `<category>_<date>`.
fn derive_file_name(path: &Path, text: &str, category: &str) -> String {
    let now = Local::now();
    let title =
        derive_title(text).unwrap_or_else(|| format!("{}_{}", category, now.format("%Y%m%d")));
    format!(
        "{}_{}{}",
        title,
        now.format("%Y%m%d_%H%M%S"),
        extension_of(path)
    )
}

/// Picks the first of the sample's leading lines that looks like a title:
/// between 5 and 50 characters and not a URL. Cleaned to filesystem-safe
/// characters and capped at 30.
fn derive_title(text: &str) -> Option<String> {
    let candidate = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(TITLE_CANDIDATE_LINES)
        .find(|l| {
            TITLE_LINE_RANGE.contains(&l.chars().count()) && !l.to_lowercase().starts_with("http")
        })?;

    let cleaned: String = candidate
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    let capped: String = joined.chars().take(TITLE_MAX_CHARS).collect();
    if capped.is_empty() {
        None
    } else {
        Some(capped)
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}
