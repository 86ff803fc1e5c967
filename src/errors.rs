/*!
 * Error types for the subflow pipeline.
 *
 * This module contains the error taxonomy for every stage of the pipeline,
 * using the thiserror crate for ergonomic error definitions:
 *
 * - `ProviderError`: raw failures reported by a translation provider
 * - `TranslationError`: a classified, per-unit translation failure
 * - `ValidationError`: corrections applied to malformed segments (never fatal)
 * - `CacheError`: cache inconsistencies (treated as a miss)
 * - `AppError`: run-level failures
 */

use std::fmt;

use thiserror::Error;

/// Errors that can occur when talking to a translation provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The provider refused the text itself
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),
}

impl ProviderError {
    /// Classify this failure for the retry controller
    pub fn kind(&self) -> TranslationErrorKind {
        match self {
            Self::RateLimitExceeded(_) => TranslationErrorKind::RateLimited,
            Self::RequestFailed(_) | Self::ConnectionError(_) | Self::Timeout(_) | Self::ParseError(_) => {
                TranslationErrorKind::Transient
            }
            Self::ApiError { status_code, .. } => match *status_code {
                429 => TranslationErrorKind::RateLimited,
                408 => TranslationErrorKind::Transient,
                500..=599 => TranslationErrorKind::ServiceUnavailable,
                _ => TranslationErrorKind::InvalidInput,
            },
            Self::AuthenticationError(_) | Self::UnsupportedInput(_) => TranslationErrorKind::InvalidInput,
        }
    }
}

/// Categories of translation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranslationErrorKind {
    /// The provider asked us to slow down
    RateLimited,

    /// Network hiccup or timeout
    Transient,

    /// The text cannot be translated; never retried
    InvalidInput,

    /// The provider is down; retried up to a separate cap
    ServiceUnavailable,
}

impl TranslationErrorKind {
    /// Check if this error type may be retried at all
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TranslationErrorKind::InvalidInput)
    }
}

impl fmt::Display for TranslationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RateLimited => "rate limited",
            Self::Transient => "transient",
            Self::InvalidInput => "invalid input",
            Self::ServiceUnavailable => "service unavailable",
        };
        write!(f, "{}", name)
    }
}

/// A classified translation failure for a single unit of text
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Translation failed ({kind}) after {attempts} attempt(s): {message}")]
pub struct TranslationError {
    /// The kind of error
    pub kind: TranslationErrorKind,

    /// Error message
    pub message: String,

    /// Number of provider calls made before giving up
    pub attempts: u32,
}

impl TranslationError {
    /// Create a new error
    pub fn new(kind: TranslationErrorKind, message: impl Into<String>, attempts: u32) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts,
        }
    }

    /// Create from a provider failure
    pub fn from_provider(error: &ProviderError, attempts: u32) -> Self {
        Self::new(error.kind(), error.to_string(), attempts)
    }
}

/// Corrections applied to malformed segment timing or text.
///
/// These are reported and logged, never propagated as failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Start time was negative or not a number
    #[error("segment {index}: start {start} clamped to {clamped}")]
    StartClamped { index: usize, start: f64, clamped: f64 },

    /// Start time overlapped the previous segment
    #[error("segment {index}: overlap of {overlap:.3}s with previous segment removed")]
    OverlapClamped { index: usize, overlap: f64 },

    /// End was before or at start after clamping
    #[error("segment {index}: zero or inverted duration, skipped")]
    ZeroDuration { index: usize },

    /// Text was empty after normalization
    #[error("segment {index}: empty text, skipped")]
    EmptyText { index: usize },

    /// Confidence outside [0, 1]
    #[error("segment {index}: confidence {confidence} clamped into [0, 1]")]
    ConfidenceClamped { index: usize, confidence: f64 },
}

/// Cache inconsistencies
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// An entry failed its integrity check
    #[error("Cache entry for '{key}' is corrupt: {reason}")]
    Corruption { key: String, reason: String },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from the database layer
    #[error("Database error: {0}")]
    Database(String),

    /// Error reading or writing resume markers
    #[error("Resume error: {0}")]
    Resume(String),

    /// Every translation attempt for a unit failed at the provider
    #[error("Translation provider unreachable for unit '{unit_id}': {failed} of {attempted} requests failed")]
    ProviderUnreachable {
        /// Unit that could not be translated
        unit_id: String,
        /// Number of distinct texts sent to the provider
        attempted: usize,
        /// Number of those that failed
        failed: usize,
    },

    /// The run was interrupted before the unit finished
    #[error("Run cancelled while processing unit '{0}'")]
    Cancelled(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(format!("{:#}", error))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Database(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::Config(error.to_string())
    }
}
