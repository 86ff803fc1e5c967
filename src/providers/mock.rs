/*!
 * Mock provider implementations for testing.
 *
 * This module provides a scriptable provider that simulates different behaviors:
 * - `MockProvider::working()` - Always succeeds with a tagged translation
 * - `MockProvider::failing(error)` - Always fails with the given error
 * - `MockProvider::fail_first(n, error)` - Fails `n` times, then succeeds
 * - `MockProvider::fail_on(texts, error)` - Fails only for the listed texts
 *
 * Every clone shares the same request counter and request log, so tests can
 * hand a clone to the pipeline and inspect calls afterwards.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{TranslationRequest, Translator};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Always fails with the given error
    Failing(ProviderError),
    /// Fails for the first `failures` requests, then succeeds
    FailFirst { failures: usize, error: ProviderError },
    /// Fails for the listed source texts only
    FailOn { texts: HashSet<String>, error: ProviderError },
    /// Simulates slow responses
    Slow { delay_ms: u64 },
}

/// Mock provider for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter shared between clones
    request_count: Arc<AtomicUsize>,
    /// Texts seen, in call order
    request_log: Arc<Mutex<Vec<String>>>,
    /// Custom response generator (optional)
    custom_response: Option<fn(&TranslationRequest) -> String>,
    /// Per-request latency (optional), in milliseconds
    latency: Option<fn(&TranslationRequest) -> u64>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            request_log: Arc::new(Mutex::new(Vec::new())),
            custom_response: None,
            latency: None,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a failing mock provider that always errors
    pub fn failing(error: ProviderError) -> Self {
        Self::new(MockBehavior::Failing(error))
    }

    /// Create a provider that fails `failures` times before recovering
    pub fn fail_first(failures: usize, error: ProviderError) -> Self {
        Self::new(MockBehavior::FailFirst { failures, error })
    }

    /// Create a provider that fails only for the given texts
    pub fn fail_on<I, S>(texts: I, error: ProviderError) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(MockBehavior::FailOn {
            texts: texts.into_iter().map(Into::into).collect(),
            error,
        })
    }

    /// Create a provider that sleeps before every response
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom response generator
    pub fn with_custom_response(mut self, generator: fn(&TranslationRequest) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Set a per-request latency function
    pub fn with_latency(mut self, latency: fn(&TranslationRequest) -> u64) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of requests received so far, across all clones
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Texts received so far, in call order
    pub fn requests(&self) -> Vec<String> {
        self.request_log.lock().clone()
    }

    /// The translation this provider produces for a request when it succeeds
    pub fn expected_translation(request: &TranslationRequest) -> String {
        format!("[{}] {}", request.target_language, request.text)
    }

    fn respond(&self, request: &TranslationRequest) -> String {
        match self.custom_response {
            Some(generator) => generator(request),
            None => Self::expected_translation(request),
        }
    }
}

#[async_trait]
impl Translator for MockProvider {
    async fn translate(&self, request: &TranslationRequest) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.request_log.lock().push(request.text.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(Duration::from_millis(latency(request))).await;
        }

        match &self.behavior {
            MockBehavior::Working => Ok(self.respond(request)),

            MockBehavior::Failing(error) => Err(error.clone()),

            MockBehavior::FailFirst { failures, error } => {
                if count < *failures {
                    Err(error.clone())
                } else {
                    Ok(self.respond(request))
                }
            }

            MockBehavior::FailOn { texts, error } => {
                if texts.contains(&request.text) {
                    Err(error.clone())
                } else {
                    Ok(self.respond(request))
                }
            }

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                Ok(self.respond(request))
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
