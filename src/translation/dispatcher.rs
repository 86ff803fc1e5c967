/*!
 * Concurrent translation dispatch.
 *
 * Cache hits are resolved synchronously. Misses are grouped by cache key so
 * every distinct text is sent once, then fanned out to at most
 * `worker_count` concurrent retry-controlled calls. Each task carries its
 * original position and results are written back by position, so
 * completion order never affects output order.
 *
 * A failed text marks its segments as failed; siblings are unaffected.
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};

use crate::errors::{TranslationError, TranslationErrorKind};
use crate::segment::{CacheKey, ReflowedSegment, TranslatedSegment, TranslationSource};

use super::cache::TranslationCache;
use super::retry::RetryController;

/// Progress callback: `(resolved segments, total segments)`
pub type ProgressCallback<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// A segment whose translation failed
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentFailure {
    /// Position in the dispatched sequence
    pub index: usize,
    pub error: TranslationError,
}

/// Outcome counts for one dispatch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// Segments dispatched
    pub total: usize,
    /// Segments resolved from the cache
    pub from_cache: usize,
    /// Segments translated by a provider call in this dispatch
    pub fresh: usize,
    /// Segments left untranslated
    pub failed: usize,
    /// Distinct texts sent to the provider
    pub requests: usize,
    /// Distinct texts whose translation failed
    pub failed_requests: usize,
    /// Failed texts whose last error was connection-class
    /// (transient or service unavailable)
    pub connection_failures: usize,
    /// One entry per failed segment, in order
    pub failures: Vec<SegmentFailure>,
}

impl DispatchReport {
    /// Nothing resolved and every provider call failed to connect.
    /// Rate-limited or rejected texts count as answered.
    pub fn provider_unreachable(&self) -> bool {
        self.requests > 0
            && self.from_cache == 0
            && self.fresh == 0
            && self.failed_requests == self.requests
            && self.connection_failures == self.failed_requests
    }
}

/// Work for one distinct text
struct MissGroup {
    key: CacheKey,
    /// Every position sharing this key, ascending
    positions: Vec<usize>,
}

/// Fans cache misses out to a bounded set of concurrent workers
#[derive(Debug, Clone)]
pub struct Dispatcher {
    retry: RetryController,
    cache: TranslationCache,
    worker_count: usize,
    source_language: String,
}

impl Dispatcher {
    pub fn new(retry: RetryController, cache: TranslationCache, worker_count: usize, source_language: impl Into<String>) -> Self {
        Self {
            retry,
            cache,
            worker_count: worker_count.max(1),
            source_language: source_language.into(),
        }
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Translate every segment, preserving input order
    pub async fn translate_all(
        &self,
        reflowed: &[ReflowedSegment],
        target_language: &str,
    ) -> (Vec<TranslatedSegment>, DispatchReport) {
        self.translate_all_with_progress(reflowed, target_language, None).await
    }

    /// Translate every segment, reporting progress as segments resolve
    pub async fn translate_all_with_progress(
        &self,
        reflowed: &[ReflowedSegment],
        target_language: &str,
        progress: Option<ProgressCallback<'_>>,
    ) -> (Vec<TranslatedSegment>, DispatchReport) {
        let total = reflowed.len();
        let mut report = DispatchReport {
            total,
            ..Default::default()
        };
        let mut slots: Vec<Option<(String, TranslationSource)>> = vec![None; total];
        let mut groups: Vec<MissGroup> = Vec::new();
        let mut group_index: HashMap<CacheKey, usize> = HashMap::new();

        // Partition into hits and misses
        for (index, segment) in reflowed.iter().enumerate() {
            let key = CacheKey::new(&segment.text, target_language);

            if key.text.is_empty() {
                report.failures.push(SegmentFailure {
                    index,
                    error: TranslationError::new(TranslationErrorKind::InvalidInput, "empty text", 0),
                });
                slots[index] = Some((String::new(), TranslationSource::Failed));
                continue;
            }

            if self.cache.is_enabled() {
                if let Some(&group) = group_index.get(&key) {
                    groups[group].positions.push(index);
                    continue;
                }
                if let Some(entry) = self.cache.lookup(&key) {
                    slots[index] = Some((entry.translated_text, TranslationSource::Cache));
                    continue;
                }
                group_index.insert(key.clone(), groups.len());
            }
            groups.push(MissGroup {
                key,
                positions: vec![index],
            });
        }

        let resolved = AtomicUsize::new(slots.iter().filter(|slot| slot.is_some()).count());
        if let Some(callback) = progress {
            callback(resolved.load(Ordering::SeqCst), total);
        }

        report.requests = groups.len();
        debug!(
            "Dispatching {} distinct texts for {} segments with {} workers",
            groups.len(),
            total,
            self.worker_count
        );

        // Fan out misses, each tagged with its group position
        let mut results = stream::iter(groups.into_iter().enumerate())
            .map(|(position, group)| {
                let retry = &self.retry;
                let source_language = self.source_language.as_str();
                let resolved = &resolved;

                async move {
                    let result = retry
                        .translate_one(&group.key.text, source_language, &group.key.target_language)
                        .await;

                    let done = resolved.fetch_add(group.positions.len(), Ordering::SeqCst) + group.positions.len();
                    if let Some(callback) = progress {
                        callback(done, total);
                    }

                    (position, group, result)
                }
            })
            .buffer_unordered(self.worker_count)
            .collect::<Vec<_>>()
            .await;

        // Sort results by position to keep cache inserts deterministic
        results.sort_by_key(|(position, _, _)| *position);

        for (_, group, result) in results {
            match result {
                Ok(translated) => {
                    self.cache.insert(group.key.clone(), translated.clone());

                    let mut positions = group.positions.into_iter();
                    if let Some(first) = positions.next() {
                        slots[first] = Some((translated.clone(), TranslationSource::Fresh));
                    }
                    // Later occurrences are answered by the entry just stored
                    for index in positions {
                        let text = self
                            .cache
                            .lookup(&group.key)
                            .map(|entry| entry.translated_text)
                            .unwrap_or_else(|| translated.clone());
                        slots[index] = Some((text, TranslationSource::Cache));
                    }
                }
                Err(error) => {
                    warn!(
                        "Translation failed for '{}': {}",
                        preview(&group.key.text),
                        error
                    );
                    report.failed_requests += 1;
                    if matches!(
                        error.kind,
                        TranslationErrorKind::Transient | TranslationErrorKind::ServiceUnavailable
                    ) {
                        report.connection_failures += 1;
                    }
                    for index in group.positions {
                        report.failures.push(SegmentFailure {
                            index,
                            error: error.clone(),
                        });
                        slots[index] = Some((String::new(), TranslationSource::Failed));
                    }
                }
            }
        }
        report.failures.sort_by_key(|failure| failure.index);

        // Assemble in input order
        let translated: Vec<TranslatedSegment> = reflowed
            .iter()
            .cloned()
            .zip(slots)
            .map(|(segment, slot)| match slot {
                Some((_, TranslationSource::Failed)) | None => TranslatedSegment::failed(segment),
                Some((text, source)) => TranslatedSegment::new(segment, text, source),
            })
            .collect();

        for segment in &translated {
            match segment.translation_source {
                TranslationSource::Cache => report.from_cache += 1,
                TranslationSource::Fresh => report.fresh += 1,
                TranslationSource::Failed => report.failed += 1,
            }
        }

        info!(
            "Translated {} segments: {} fresh, {} from cache, {} failed",
            report.total, report.fresh, report.from_cache, report.failed
        );

        (translated, report)
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > 40 {
        format!("{}...", text.chars().take(40).collect::<String>())
    } else {
        text.to_string()
    }
}
