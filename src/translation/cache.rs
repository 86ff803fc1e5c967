/*!
 * Translation caching functionality.
 *
 * Maps normalized source text plus target language to a translation so that
 * identical phrases are sent to the provider only once per run (or per batch,
 * when the cache outlives a single unit). The cache is an explicit object
 * handed to the dispatcher; clones share the same storage.
 *
 * Growth is unbounded: entries are never evicted, and `hit_count` is
 * telemetry only.
 */

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;

use crate::errors::CacheError;
use crate::segment::CacheKey;

/// A cached translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Translated text
    pub translated_text: String,

    /// Number of lookups this entry has answered
    pub hit_count: u64,
}

/// Cache hit/miss accounting
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 { self.hits as f64 / total as f64 } else { 0.0 }
    }
}

/// Thread-safe translation cache
#[derive(Debug, Clone)]
pub struct TranslationCache {
    /// Internal cache storage
    entries: Arc<RwLock<HashMap<CacheKey, CacheEntry>>>,

    /// Hit and miss counters
    counters: Arc<RwLock<(u64, u64)>>,

    /// Whether caching is enabled
    enabled: bool,
}

impl TranslationCache {
    /// Create a new translation cache
    pub fn new(enabled: bool) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(RwLock::new((0, 0))),
            enabled,
        }
    }

    /// Look a key up, bumping its hit count on success.
    ///
    /// An entry holding an empty translation for non-empty text is corrupt:
    /// it is logged, evicted and reported as a miss.
    pub fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }

        // Single write lock so the hit count and the returned entry agree
        let mut entries = self.entries.write();
        let found = match entries.get_mut(key) {
            Some(entry) if entry.translated_text.trim().is_empty() && !key.text.is_empty() => {
                let error = CacheError::Corruption {
                    key: truncate_text(&key.text, 30),
                    reason: "empty translation".to_string(),
                };
                warn!("{}; evicting", error);
                entries.remove(key);
                None
            }
            Some(entry) => {
                entry.hit_count += 1;
                Some(entry.clone())
            }
            None => None,
        };
        drop(entries);

        let mut counters = self.counters.write();
        match &found {
            Some(_) => {
                counters.0 += 1;
                debug!("Cache hit for '{}' (-> {})", truncate_text(&key.text, 30), key.target_language);
            }
            None => {
                counters.1 += 1;
                debug!("Cache miss for '{}' (-> {})", truncate_text(&key.text, 30), key.target_language);
            }
        }

        found
    }

    /// Store a translation, replacing any previous one for the key
    pub fn insert(&self, key: CacheKey, translated_text: impl Into<String>) {
        if !self.enabled {
            return;
        }

        debug!("Cached translation for '{}' (-> {})", truncate_text(&key.text, 30), key.target_language);
        self.entries.write().insert(
            key,
            CacheEntry {
                translated_text: translated_text.into(),
                hit_count: 0,
            },
        );
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let (hits, misses) = *self.counters.read();
        CacheStats {
            hits,
            misses,
            entries: self.len(),
        }
    }

    /// Clear the cache and its counters
    pub fn clear(&self) {
        self.entries.write().clear();
        *self.counters.write() = (0, 0);
        debug!("Translation cache cleared");
    }

    /// Get the number of entries in the cache
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Check if the cache is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Truncate text to a maximum number of characters with ellipsis
fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_length).collect();
        format!("{}...", truncated)
    }
}
