/*!
 * Translation provider implementations.
 *
 * A provider translates one piece of text per call and reports failures as
 * `ProviderError`, which the retry controller classifies:
 * - Ollama: local LLM server over HTTP
 * - Mock: scriptable provider for tests and dry runs
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// A single text to translate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    /// Normalized source text
    pub text: String,

    /// Source language code, or `auto`
    pub source_language: String,

    /// Target language code
    pub target_language: String,
}

impl TranslationRequest {
    pub fn new(text: impl Into<String>, source_language: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
        }
    }
}

/// Common trait for all translation providers
///
/// Implementations make exactly one attempt per call; retrying is the
/// caller's job.
#[async_trait]
pub trait Translator: Send + Sync + Debug {
    /// Translate one text
    ///
    /// # Arguments
    /// * `request` - The text and language pair
    ///
    /// # Returns
    /// * `Result<String, ProviderError>` - The translated text or the raw failure
    async fn translate(&self, request: &TranslationRequest) -> Result<String, ProviderError>;

    /// Short provider name used in logs
    fn name(&self) -> &str;
}

pub mod mock;
pub mod ollama;
