/*!
 * Tests for concurrent dispatch: ordering, worker bounds and cache reuse
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use subflow::errors::ProviderError;
use subflow::providers::mock::MockProvider;
use subflow::providers::{TranslationRequest, Translator};
use subflow::reflow::passthrough;
use subflow::segment::{ReflowedSegment, TranslationSource};
use subflow::translation::{Dispatcher, RetryController, RetryPolicy, TranslationCache};

use crate::common::seg;

fn segments(texts: &[&str]) -> Vec<ReflowedSegment> {
    let raw: Vec<_> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| seg(i as f64 * 2.0, i as f64 * 2.0 + 1.5, text))
        .collect();
    passthrough(&raw)
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2))
}

fn dispatcher_for(provider: Arc<dyn Translator>, cache: TranslationCache, workers: usize) -> Dispatcher {
    Dispatcher::new(RetryController::new(provider, fast_policy()), cache, workers, "en")
}

/// Shorter texts take longer, so completion order is the reverse of input order
fn inverse_latency(request: &TranslationRequest) -> u64 {
    60u64.saturating_sub(request.text.len() as u64 * 5)
}

/// Provider recording the highest number of calls in flight at once
#[derive(Debug, Default)]
struct ConcurrencyProbe {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl Translator for ConcurrencyProbe {
    async fn translate(&self, request: &TranslationRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(15)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("<{}>", request.text))
    }

    fn name(&self) -> &str {
        "probe"
    }
}

#[tokio::test]
async fn test_translateAll_withVariableLatency_shouldKeepInputOrder() {
    let provider = MockProvider::working().with_latency(inverse_latency);
    let texts = ["a", "bb", "ccc", "dddd", "eeeee", "ffffff", "ggggggg", "hhhhhhhh"];
    let dispatcher = dispatcher_for(Arc::new(provider.clone()), TranslationCache::new(true), 8);

    let (output, report) = dispatcher.translate_all(&segments(&texts), "fr").await;

    let translated: Vec<&str> = output.iter().map(|s| s.translated_text.as_str()).collect();
    let expected: Vec<String> = texts.iter().map(|t| format!("[fr] {}", t)).collect();
    assert_eq!(translated, expected);
    assert_eq!(report.fresh, texts.len());
    assert_eq!(provider.request_count(), texts.len());
}

#[tokio::test]
async fn test_translateAll_shouldNeverExceedWorkerCount() {
    let probe = Arc::new(ConcurrencyProbe::default());
    let texts: Vec<String> = (0..20).map(|i| format!("line {}", i)).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let dispatcher = dispatcher_for(probe.clone(), TranslationCache::new(true), 3);

    let (output, _) = dispatcher.translate_all(&segments(&refs), "fr").await;

    assert_eq!(output.len(), 20);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 20);
    let peak = probe.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency {}", peak);
    assert!(peak >= 2, "workers never overlapped");
}

#[tokio::test]
async fn test_translateAll_withSingleWorker_shouldRunSequentially() {
    let probe = Arc::new(ConcurrencyProbe::default());
    let dispatcher = dispatcher_for(probe.clone(), TranslationCache::new(true), 1);

    dispatcher.translate_all(&segments(&["one", "two", "three"]), "fr").await;

    assert_eq!(probe.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_translateAll_twiceOnSharedCache_shouldMakeNoNewCalls() {
    let provider = MockProvider::working();
    let cache = TranslationCache::new(true);
    let input = segments(&["Hello there.", "Hello there.", "Good night."]);

    let first = dispatcher_for(Arc::new(provider.clone()), cache.clone(), 4);
    let (first_output, first_report) = first.translate_all(&input, "fr").await;
    assert_eq!(provider.request_count(), 2);
    assert_eq!(first_report.fresh, 2);
    assert_eq!(first_report.from_cache, 1);

    let second = dispatcher_for(Arc::new(provider.clone()), cache.clone(), 4);
    let (second_output, second_report) = second.translate_all(&input, "fr").await;

    assert_eq!(provider.request_count(), 2);
    assert_eq!(second_report.from_cache, 3);
    assert_eq!(second_report.requests, 0);
    assert!(second_output.iter().all(|s| s.translation_source == TranslationSource::Cache));

    let first_texts: Vec<_> = first_output.iter().map(|s| &s.translated_text).collect();
    let second_texts: Vec<_> = second_output.iter().map(|s| &s.translated_text).collect();
    assert_eq!(first_texts, second_texts);
}

#[tokio::test]
async fn test_translateAll_withCacheDisabled_shouldTranslateEveryOccurrence() {
    let provider = MockProvider::working();
    let dispatcher = dispatcher_for(Arc::new(provider.clone()), TranslationCache::new(false), 2);

    let (output, report) = dispatcher.translate_all(&segments(&["Yes.", "Yes.", "Yes."]), "fr").await;

    assert_eq!(provider.request_count(), 3);
    assert_eq!(report.fresh, 3);
    assert!(output.iter().all(|s| s.translation_source == TranslationSource::Fresh));
}

#[tokio::test]
async fn test_translateAll_withDifferentTargets_shouldNotShareEntries() {
    let provider = MockProvider::working();
    let cache = TranslationCache::new(true);
    let dispatcher = dispatcher_for(Arc::new(provider.clone()), cache.clone(), 2);
    let input = segments(&["Thank you."]);

    dispatcher.translate_all(&input, "fr").await;
    let (output, _) = dispatcher.translate_all(&input, "de").await;

    assert_eq!(provider.request_count(), 2);
    assert_eq!(output[0].translated_text, "[de] Thank you.");
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn test_translateAll_withFailedText_shouldNotCacheFailure() {
    let provider = MockProvider::fail_first(2, ProviderError::ConnectionError("reset".into()));
    let cache = TranslationCache::new(true);
    let dispatcher = dispatcher_for(Arc::new(provider.clone()), cache.clone(), 1);
    let input = segments(&["Hello."]);

    let (first, _) = dispatcher.translate_all(&input, "fr").await;
    assert!(first[0].is_failed());
    assert!(cache.is_empty());

    let (second, _) = dispatcher.translate_all(&input, "fr").await;
    assert_eq!(second[0].translation_source, TranslationSource::Fresh);
    assert_eq!(second[0].translated_text, "[fr] Hello.");
}

#[tokio::test]
async fn test_translateAll_withEmptyInput_shouldReturnEmptyReport() {
    let provider = MockProvider::working();
    let dispatcher = dispatcher_for(Arc::new(provider.clone()), TranslationCache::new(true), 2);

    let (output, report) = dispatcher.translate_all(&[], "fr").await;

    assert!(output.is_empty());
    assert_eq!(report.total, 0);
    assert!(!report.provider_unreachable());
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test]
async fn test_translateAll_withPersistentRateLimit_shouldFailAfterMaxAttempts() {
    let provider = MockProvider::failing(ProviderError::RateLimitExceeded("429".into()));
    let dispatcher = dispatcher_for(Arc::new(provider.clone()), TranslationCache::new(true), 2);

    let (output, report) = dispatcher.translate_all(&segments(&["Hello.", "Hello."]), "fr").await;

    // One distinct text, two attempts from the fast policy
    assert_eq!(provider.request_count(), 2);
    assert!(output.iter().all(|s| s.translation_source == TranslationSource::Failed));
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().all(|f| f.error.attempts == 2));
}
