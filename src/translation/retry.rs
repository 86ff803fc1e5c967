/*!
 * Retry and backoff around a single translation call.
 *
 * Each call runs a bounded loop over attempts. Provider failures are
 * classified by `TranslationErrorKind`:
 * - `InvalidInput` stops immediately
 * - `ServiceUnavailable` is retried until its own cap, then stops
 * - `RateLimited` and `Transient` are retried until the attempt cap
 *
 * The delay before attempt `n + 1` is `base * 2^(n - 1)` plus jitter in
 * `[0, base)`, capped at the configured ceiling.
 */

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;

use crate::errors::{ProviderError, TranslationError, TranslationErrorKind};
use crate::providers::{TranslationRequest, Translator};
use crate::segment::normalize_text;

/// Retry limits and backoff timing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total provider calls allowed per text (at least one)
    pub max_attempts: u32,

    /// Base delay for exponential backoff
    pub base_delay: Duration,

    /// Ceiling for any single delay
    pub max_delay: Duration,

    /// Service-unavailable failures tolerated before giving up
    pub service_unavailable_cap: u32,

    /// Optional timeout for each provider call
    pub call_timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            service_unavailable_cap: max_attempts.max(1),
            call_timeout: None,
        }
    }

    /// Set the service-unavailable cap
    pub fn with_service_unavailable_cap(mut self, cap: u32) -> Self {
        self.service_unavailable_cap = cap.max(1);
        self
    }

    /// Set a per-call timeout
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Backoff before the attempt following `attempt` (1-based), without jitter
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Backoff with jitter in `[0, base)`, capped at `max_delay`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let jitter = if base_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..base_ms))
        } else {
            Duration::ZERO
        };
        (self.base_backoff(attempt) + jitter).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000), Duration::from_millis(16_000))
    }
}

/// Runs single translations against a provider with retry
#[derive(Debug, Clone)]
pub struct RetryController {
    provider: Arc<dyn Translator>,
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(provider: Arc<dyn Translator>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Translate one text, retrying retryable failures.
    ///
    /// Empty text is rejected as `InvalidInput` without a provider call.
    pub async fn translate_one(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslationError> {
        let text = normalize_text(text);
        if text.is_empty() {
            return Err(TranslationError::new(TranslationErrorKind::InvalidInput, "empty text", 0));
        }

        let request = TranslationRequest::new(text, source_language, target_language);
        let mut unavailable = 0u32;
        let mut last_error = None;

        for attempt in 1..=self.policy.max_attempts {
            let error = match self.call(&request).await {
                Ok(translated) => {
                    if attempt > 1 {
                        debug!("Translation succeeded on attempt {}", attempt);
                    }
                    return Ok(translated);
                }
                Err(error) => TranslationError::from_provider(&error, attempt),
            };

            match error.kind {
                TranslationErrorKind::InvalidInput => return Err(error),
                TranslationErrorKind::ServiceUnavailable => {
                    unavailable += 1;
                    if unavailable >= self.policy.service_unavailable_cap {
                        warn!(
                            "Provider {} unavailable {} time(s), giving up: {}",
                            self.provider.name(),
                            unavailable,
                            error.message
                        );
                        return Err(error);
                    }
                }
                TranslationErrorKind::RateLimited | TranslationErrorKind::Transient => {}
            }

            if attempt < self.policy.max_attempts {
                let delay = self.policy.backoff(attempt);
                warn!(
                    "Attempt {}/{} failed ({}), retrying in {:?}",
                    attempt, self.policy.max_attempts, error.kind, delay
                );
                tokio::time::sleep(delay).await;
            }
            last_error = Some(error);
        }

        // The loop always runs at least once
        Err(last_error.unwrap_or_else(|| {
            TranslationError::new(TranslationErrorKind::Transient, "no attempt made", 0)
        }))
    }

    async fn call(&self, request: &TranslationRequest) -> Result<String, ProviderError> {
        let result = match self.policy.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.provider.translate(request)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(format!("no response within {:?}", limit))),
            },
            None => self.provider.translate(request).await,
        }?;

        if result.trim().is_empty() {
            return Err(ProviderError::ParseError("provider returned an empty translation".to_string()));
        }
        Ok(result)
    }
}
