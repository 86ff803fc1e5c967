/*!
 * Cached, retrying, concurrent translation.
 *
 * This module is split into several submodules:
 *
 * - `cache`: Translation cache keyed by normalized text and target language
 * - `retry`: Bounded retry with exponential backoff around one provider call
 * - `dispatcher`: Order-preserving fan-out of cache misses to workers
 */

// Re-export main types for easier usage
pub use self::cache::{CacheEntry, CacheStats, TranslationCache};
pub use self::dispatcher::{DispatchReport, Dispatcher, SegmentFailure};
pub use self::retry::{RetryController, RetryPolicy};

// Submodules
pub mod cache;
pub mod dispatcher;
pub mod retry;
