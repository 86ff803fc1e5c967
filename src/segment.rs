/*!
 * Segment model shared by every pipeline stage.
 *
 * Raw segments come from the transcription collaborator. The reflow engine
 * turns them into reflowed segments, and the dispatcher attaches translations
 * to produce translated segments. Every stage builds new values and never
 * mutates its input, so a pipeline run is replayable on the same transcript.
 */

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::ValidationError;

// @const: Any run of whitespace, including newlines
static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// A timed piece of transcript as produced by speech-to-text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    /// Start time in seconds
    pub start: f64,

    /// End time in seconds
    pub end: f64,

    /// Transcribed text
    pub text: String,

    /// Recognition confidence in [0, 1]
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Spoken language code
    #[serde(default)]
    pub language: String,
}

fn default_confidence() -> f64 {
    1.0
}

impl RawSegment {
    /// Create a new raw segment
    pub fn new(start: f64, end: f64, text: impl Into<String>, confidence: f64, language: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            confidence,
            language: language.into(),
        }
    }

    /// Duration in seconds (never negative)
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// A segment after merge/split normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflowedSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub confidence: f64,
    pub language: String,

    /// Indices of the raw segments this one was built from, in order
    pub source_segment_ids: Vec<usize>,
}

impl ReflowedSegment {
    /// Wrap a single raw segment without changing it
    pub fn from_raw(index: usize, raw: &RawSegment) -> Self {
        Self {
            start: raw.start,
            end: raw.end,
            text: raw.text.clone(),
            confidence: raw.confidence,
            language: raw.language.clone(),
            source_segment_ids: vec![index],
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Number of characters in the caption text
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Where a translated text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationSource {
    /// Resolved from the translation cache without a provider call
    Cache,
    /// Translated by a provider call during this run
    Fresh,
    /// Translation gave up; `translated_text` is empty
    Failed,
}

/// A reflowed segment with its resolved translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedSegment {
    pub start: f64,
    pub end: f64,

    /// Source-language text
    pub text: String,
    pub confidence: f64,
    pub language: String,
    pub source_segment_ids: Vec<usize>,

    /// Target-language text; empty when the translation failed
    pub translated_text: String,
    pub translation_source: TranslationSource,
}

impl TranslatedSegment {
    /// Attach a translation outcome to a reflowed segment
    pub fn new(segment: ReflowedSegment, translated_text: String, translation_source: TranslationSource) -> Self {
        Self {
            start: segment.start,
            end: segment.end,
            text: segment.text,
            confidence: segment.confidence,
            language: segment.language,
            source_segment_ids: segment.source_segment_ids,
            translated_text,
            translation_source,
        }
    }

    /// A segment whose translation could not be obtained
    pub fn failed(segment: ReflowedSegment) -> Self {
        Self::new(segment, String::new(), TranslationSource::Failed)
    }

    pub fn is_failed(&self) -> bool {
        self.translation_source == TranslationSource::Failed
    }

    /// Text to show in generated artifacts: the translation, or the original
    /// text standing in when the translation failed
    pub fn display_text(&self) -> &str {
        if self.is_failed() || self.translated_text.is_empty() {
            &self.text
        } else {
            &self.translated_text
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Cache key: normalized source text plus target language
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    /// Trimmed, whitespace-collapsed, case-preserved text
    pub text: String,

    /// Target language code
    pub target_language: String,
}

impl CacheKey {
    /// Build a key, normalizing the text
    pub fn new(text: &str, target_language: &str) -> Self {
        Self {
            text: normalize_text(text),
            target_language: target_language.trim().to_lowercase(),
        }
    }
}

/// Trim and collapse internal whitespace runs to a single space
pub fn normalize_text(text: &str) -> String {
    WHITESPACE_REGEX.replace_all(text.trim(), " ").into_owned()
}

/// Result of sanitizing a raw transcript
#[derive(Debug, Clone, Default)]
pub struct SanitizeReport {
    /// Segments that are safe to reflow
    pub segments: Vec<RawSegment>,

    /// Every correction that was applied, in input order
    pub corrections: Vec<ValidationError>,
}

impl SanitizeReport {
    /// Number of input segments that were dropped
    pub fn skipped(&self) -> usize {
        self.corrections
            .iter()
            .filter(|c| matches!(c, ValidationError::ZeroDuration { .. } | ValidationError::EmptyText { .. }))
            .count()
    }
}

/// Validate a raw transcript before it enters the reflow engine.
///
/// Negative starts are clamped to zero, overlap with the previous kept
/// segment is clamped away, text is normalized, confidence is clamped into
/// [0, 1]. Segments left with empty text or no duration are skipped.
pub fn sanitize_segments(segments: &[RawSegment]) -> SanitizeReport {
    let mut report = SanitizeReport::default();
    let mut previous_end = 0.0_f64;

    for (index, segment) in segments.iter().enumerate() {
        let text = normalize_text(&segment.text);
        if text.is_empty() {
            report.corrections.push(ValidationError::EmptyText { index });
            continue;
        }

        let mut start = finite_or_zero(segment.start);
        if start < 0.0 {
            report.corrections.push(ValidationError::StartClamped { index, start: segment.start, clamped: 0.0 });
            start = 0.0;
        }
        if start < previous_end {
            report.corrections.push(ValidationError::OverlapClamped { index, overlap: previous_end - start });
            start = previous_end;
        }

        let end = finite_or_zero(segment.end);
        if end <= start {
            report.corrections.push(ValidationError::ZeroDuration { index });
            continue;
        }

        let mut confidence = segment.confidence;
        if !(0.0..=1.0).contains(&confidence) {
            let clamped = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
            report.corrections.push(ValidationError::ConfidenceClamped { index, confidence });
            confidence = clamped;
        }

        previous_end = end;
        report.segments.push(RawSegment {
            start,
            end,
            text,
            confidence,
            language: segment.language.clone(),
        });
    }

    for correction in &report.corrections {
        match correction {
            ValidationError::ZeroDuration { .. } | ValidationError::EmptyText { .. } => warn!("{}", correction),
            _ => debug!("{}", correction),
        }
    }

    report
}

/// Stable SHA-256 fingerprint of a raw transcript.
///
/// Used by resume markers to detect that a unit's input changed since it
/// was last completed.
pub fn fingerprint_segments(segments: &[RawSegment]) -> String {
    let mut hasher = Sha256::new();
    for segment in segments {
        hasher.update(segment.start.to_bits().to_le_bytes());
        hasher.update(segment.end.to_bits().to_le_bytes());
        hasher.update(segment.confidence.to_bits().to_le_bytes());
        hasher.update(segment.language.as_bytes());
        hasher.update([0u8]);
        hasher.update(segment.text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
