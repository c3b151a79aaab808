// Seeded from configuration at startup, read by the classifier, grown
// additively by the feedback loop. No I/O under the table lock.

use crate::config::{default_keyword_seed, AppConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct KeywordTable {
    categories: Vec<String>,
    keywords: HashMap<String, Vec<String>>,
}

pub type SharedKeywords = Arc<Mutex<KeywordTable>>;

impl KeywordTable {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let keywords = if cfg.category_keywords.is_empty() {
            let seed = default_keyword_seed();
            cfg.categories
                .iter()
                .map(|c| (c.clone(), seed.get(c).cloned().unwrap_or_default()))
                .collect()
        } else {
            cfg.categories
                .iter()
                .map(|c| {
                    (
                        c.clone(),
                        cfg.category_keywords.get(c).cloned().unwrap_or_default(),
                    )
                })
                .collect()
        };
        Self {
            categories: cfg.categories.clone(),
            keywords,
        }
    }

    pub fn shared(cfg: &AppConfig) -> SharedKeywords {
        Arc::new(Mutex::new(Self::from_config(cfg)))
    }

    /// Categories in declaration order (tie-break order).
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn keywords(&self, category: &str) -> &[String] {
        self.keywords
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, category: &str, word: &str) -> bool {
        self.keywords(category)
            .iter()
            .any(|k| k.eq_ignore_ascii_case(word))
    }

    /// Adds a learned keyword. Returns false if it was already present.
    pub fn add(&mut self, category: &str, word: &str) -> bool {
        if !self.categories.iter().any(|c| c == category) || self.contains(category, word) {
            return false;
        }
        self.keywords
            .entry(category.to_string())
            .or_default()
            .push(word.to_lowercase());
        true
    }

    /// Identifies the current keyword set of a category; changes whenever a
    /// keyword is added, which invalidates the cached category embedding.
    pub fn fingerprint(&self, category: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(category.as_bytes());
        for kw in self.keywords(category) {
            hasher.update(b"\x1f");
            hasher.update(kw.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Text a category embedding is derived from.
    pub fn embedding_text(&self, category: &str) -> String {
        let mut text = category.replace('_', " ");
        for kw in self.keywords(category) {
            text.push(' ');
            text.push_str(kw);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_defaults_when_config_has_none() {
        let cfg = AppConfig::default();
        let table = KeywordTable::from_config(&cfg);
        assert!(table.contains("taxes", "irs"));
        assert!(table.keywords("other").is_empty());
    }

    #[test]
    fn add_is_idempotent_and_changes_fingerprint() {
        let cfg = AppConfig::default();
        let mut table = KeywordTable::from_config(&cfg);
        let before = table.fingerprint("receipts");
        assert!(table.add("receipts", "refund"));
        assert!(!table.add("receipts", "refund"));
        assert!(!table.add("receipts", "REFUND"));
        assert_ne!(before, table.fingerprint("receipts"));
    }

    #[test]
    fn add_rejects_unknown_category() {
        let cfg = AppConfig::default();
        let mut table = KeywordTable::from_config(&cfg);
        assert!(!table.add("nonexistent", "word"));
    }
}
