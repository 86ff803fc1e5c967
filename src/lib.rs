/*!
 * # subflow - subtitle segment reflow and translation
 *
 * Turns raw transcription segments into readable, translated subtitle
 * cues.
 *
 * ## Features
 *
 * - Reflow of raw segments into cues within duration and length bounds
 * - Concurrent translation with bounded workers and ordered results
 * - Per-run translation cache keyed by normalized text and target language
 * - Retry with exponential backoff and jitter, classified by failure kind
 * - Resume: units with a matching completion marker are skipped
 * - Low-confidence review reports
 *
 * ## Architecture
 *
 * - `segment`: segment types, input sanitation and fingerprints
 * - `reflow`: merge/split engine
 * - `translation`: translation services:
 *   - `translation::cache`: translation cache
 *   - `translation::retry`: retry policy and controller
 *   - `translation::dispatcher`: concurrent dispatch
 * - `providers`: translation providers:
 *   - `providers::ollama`: Ollama API client
 *   - `providers::mock`: scripted provider for tests
 * - `resume`: completion markers and skip decisions
 * - `database`: SQLite connection used by the SQLite marker store
 * - `quality`: run summaries and review reports
 * - `pipeline`: per-unit and batch processing
 * - `app_config`: configuration management
 * - `logging`: process logger
 * - `language_utils`: ISO language code utilities
 * - `errors`: error types
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod database;
pub mod errors;
pub mod language_utils;
pub mod logging;
pub mod pipeline;
pub mod providers;
pub mod quality;
pub mod reflow;
pub mod resume;
pub mod segment;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{AppError, ProviderError, TranslationError, TranslationErrorKind};
pub use pipeline::{ArtifactSink, BatchReport, Pipeline, UnitInput, UnitOutcome, UnitResult};
pub use reflow::{reflow, ReflowOptions};
pub use segment::{RawSegment, ReflowedSegment, TranslatedSegment, TranslationSource};
pub use translation::{Dispatcher, RetryController, RetryPolicy, TranslationCache};
