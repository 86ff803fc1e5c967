/*!
 * Quality reporting for translated units.
 *
 * Segments whose recognition confidence falls below a threshold are flagged
 * for human review. Flagging annotates only: translations are left as they
 * are. A `RunSummary` records how each segment was resolved.
 */

use std::fmt;
use std::fmt::Write as _;

use log::info;
use serde::{Deserialize, Serialize};

use crate::segment::{TranslatedSegment, TranslationSource};

/// Per-unit outcome counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Raw segments received
    pub raw_segments: usize,
    /// Raw segments dropped by sanitizing
    pub skipped_segments: usize,
    /// Segments after reflow
    pub total_segments: usize,
    pub from_cache: usize,
    pub fresh: usize,
    pub failed: usize,
    /// Segments flagged for review
    pub flagged: usize,
}

impl RunSummary {
    /// Count translation sources over a finished unit
    pub fn from_segments(raw_segments: usize, skipped_segments: usize, segments: &[TranslatedSegment], flagged: usize) -> Self {
        let mut summary = Self {
            raw_segments,
            skipped_segments,
            total_segments: segments.len(),
            flagged,
            ..Default::default()
        };
        for segment in segments {
            match segment.translation_source {
                TranslationSource::Cache => summary.from_cache += 1,
                TranslationSource::Fresh => summary.fresh += 1,
                TranslationSource::Failed => summary.failed += 1,
            }
        }
        summary
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} segments ({} raw, {} skipped): {} fresh, {} cached, {} failed, {} flagged",
            self.total_segments,
            self.raw_segments,
            self.skipped_segments,
            self.fresh,
            self.from_cache,
            self.failed,
            self.flagged
        )
    }
}

/// A segment that needs a human look
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEntry {
    /// Position in the translated sequence
    pub index: usize,
    pub start: f64,
    pub end: f64,
    /// Confidence, rounded to four decimals
    pub confidence: f64,
    pub original_text: String,
    pub translated_text: String,
}

/// Flag segments with confidence strictly below `threshold`
pub fn flag_low_confidence(segments: &[TranslatedSegment], threshold: f64) -> Vec<ReviewEntry> {
    segments
        .iter()
        .enumerate()
        .filter(|(_, segment)| segment.confidence < threshold)
        .map(|(index, segment)| ReviewEntry {
            index,
            start: segment.start,
            end: segment.end,
            confidence: (segment.confidence * 10_000.0).round() / 10_000.0,
            original_text: segment.text.clone(),
            translated_text: segment.display_text().to_string(),
        })
        .collect()
}

/// Review list for one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewReport {
    pub unit_id: String,
    pub threshold: f64,
    pub entries: Vec<ReviewEntry>,
}

impl ReviewReport {
    pub fn new(unit_id: impl Into<String>, threshold: f64, entries: Vec<ReviewEntry>) -> Self {
        let report = Self {
            unit_id: unit_id.into(),
            threshold,
            entries,
        };
        if !report.entries.is_empty() {
            info!(
                "{} low-confidence segment(s) in '{}' flagged for review",
                report.entries.len(),
                report.unit_id
            );
        }
        report
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Render as plain text for a reviewer
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "LOW-CONFIDENCE SEGMENTS: {}", self.unit_id);
        let _ = writeln!(out, "threshold {:.2}", self.threshold);
        let _ = writeln!(out, "{}\n", "=".repeat(60));

        if self.entries.is_empty() {
            let _ = writeln!(out, "All segments passed the confidence threshold");
            return out;
        }

        for entry in &self.entries {
            let _ = writeln!(
                out,
                "#{} [{:.2}s - {:.2}s]  confidence {:.2}%",
                entry.index,
                entry.start,
                entry.end,
                entry.confidence * 100.0
            );
            let _ = writeln!(out, "  Text: {}", entry.translated_text);
            let _ = writeln!(out, "  Original: {}", entry.original_text);
            out.push('\n');
        }
        out
    }
}
