/*!
 * Segment reflow: merge short segments, split long ones.
 *
 * A single left-to-right pass accumulates segments until the accumulator
 * reaches the minimum duration, then flushes it. Flushed segments that are
 * longer than the maximum duration or wider than the caption limit are cut
 * at word boundaries, with timestamps interpolated by character count.
 *
 * The output always covers the same span as the input: merged segments
 * absorb the gaps between their parts, and split pieces are contiguous.
 */

use log::debug;
use serde::{Deserialize, Serialize};

use crate::segment::{finite_or_zero, normalize_text, RawSegment, ReflowedSegment};

/// Slack for interpolated timestamps when comparing against the bounds
const DURATION_TOLERANCE: f64 = 1e-9;

/// Bounds applied by the reflow engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReflowOptions {
    /// Segments shorter than this (seconds) are merged with their successor
    pub min_duration: f64,

    /// Segments longer than this (seconds) are split
    pub max_duration: f64,

    /// Captions wider than this (characters) are split
    pub max_chars_per_caption: usize,
}

impl ReflowOptions {
    pub fn new(min_duration: f64, max_duration: f64, max_chars_per_caption: usize) -> Self {
        Self {
            min_duration,
            max_duration,
            max_chars_per_caption,
        }
    }
}

impl Default for ReflowOptions {
    fn default() -> Self {
        Self::new(0.8, 7.0, 42)
    }
}

/// Running merge state: the segment being built plus its confidence weights
struct Accumulator {
    segment: ReflowedSegment,
    weighted_confidence: f64,
    weight: f64,
}

impl Accumulator {
    fn start(segment: ReflowedSegment) -> Self {
        let weight = segment.duration();
        Self {
            weighted_confidence: segment.confidence * weight,
            weight,
            segment,
        }
    }

    fn duration(&self) -> f64 {
        self.segment.duration()
    }

    /// Extend to cover `next`, including any gap before it
    fn absorb(&mut self, next: ReflowedSegment) {
        let weight = next.duration();
        self.weighted_confidence += next.confidence * weight;
        self.weight += weight;

        if self.segment.text.is_empty() {
            self.segment.text = next.text;
        } else if !next.text.is_empty() {
            self.segment.text.push(' ');
            self.segment.text.push_str(&next.text);
        }
        self.segment.end = self.segment.end.max(next.end);
        self.segment.source_segment_ids.extend(next.source_segment_ids);
    }

    fn finish(mut self) -> ReflowedSegment {
        if self.weight > 0.0 {
            self.segment.confidence = self.weighted_confidence / self.weight;
        }
        self.segment
    }
}

/// Reflow a raw transcript.
///
/// Timing is clamped defensively: negative or non-finite times become zero,
/// a start earlier than the previous end is moved up to it, and an end
/// before its start is pulled up to the start. Nothing is ever dropped.
pub fn reflow(segments: &[RawSegment], options: &ReflowOptions) -> Vec<ReflowedSegment> {
    let clamped = clamp_segments(segments);

    // Merge pass
    let mut merged: Vec<ReflowedSegment> = Vec::with_capacity(clamped.len());
    let mut accumulator: Option<Accumulator> = None;

    for segment in clamped {
        accumulator = Some(match accumulator.take() {
            None => Accumulator::start(segment),
            // At exactly the minimum we flush
            Some(mut acc) if acc.duration() < options.min_duration => {
                acc.absorb(segment);
                acc
            }
            Some(acc) => {
                merged.push(acc.finish());
                Accumulator::start(segment)
            }
        });
    }

    if let Some(tail) = accumulator {
        let tail = tail.finish();
        match merged.last_mut() {
            // A trailing short segment folds back into its predecessor when
            // the result still fits
            Some(previous)
                if tail.duration() < options.min_duration
                    && tail.end - previous.start <= options.max_duration =>
            {
                merge_back(previous, tail);
            }
            _ => merged.push(tail),
        }
    }

    // Split pass
    let mut result = Vec::with_capacity(merged.len());
    for segment in merged {
        if needs_split(&segment, options) {
            result.extend(split_segment(segment, options));
        } else {
            result.push(segment);
        }
    }

    debug!(
        "Reflowed {} raw segments into {} segments (min {:.2}s, max {:.2}s, {} chars)",
        segments.len(),
        result.len(),
        options.min_duration,
        options.max_duration,
        options.max_chars_per_caption
    );

    result
}

/// Wrap each raw segment one-to-one, applying only the timing clamp
pub fn passthrough(segments: &[RawSegment]) -> Vec<ReflowedSegment> {
    clamp_segments(segments)
}

fn clamp_segments(segments: &[RawSegment]) -> Vec<ReflowedSegment> {
    let mut cursor = 0.0_f64;
    segments
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let start = finite_or_zero(raw.start).max(0.0).max(cursor);
            let end = finite_or_zero(raw.end).max(start);
            cursor = end;

            let mut segment = ReflowedSegment::from_raw(index, raw);
            segment.start = start;
            segment.end = end;
            segment.text = normalize_text(&raw.text);
            segment
        })
        .collect()
}

fn merge_back(previous: &mut ReflowedSegment, tail: ReflowedSegment) {
    let previous_weight = previous.duration();
    let tail_weight = tail.duration();
    let total = previous_weight + tail_weight;
    if total > 0.0 {
        previous.confidence = (previous.confidence * previous_weight + tail.confidence * tail_weight) / total;
    }
    if !tail.text.is_empty() {
        if !previous.text.is_empty() {
            previous.text.push(' ');
        }
        previous.text.push_str(&tail.text);
    }
    previous.end = previous.end.max(tail.end);
    previous.source_segment_ids.extend(tail.source_segment_ids);
}

fn needs_split(segment: &ReflowedSegment, options: &ReflowOptions) -> bool {
    segment.duration() > options.max_duration || segment.char_count() > options.max_chars_per_caption
}

/// How many pieces a segment should be cut into
fn piece_count(segment: &ReflowedSegment, word_count: usize, options: &ReflowOptions) -> usize {
    let duration = segment.duration();
    let by_time = if duration > options.max_duration && options.max_duration > 0.0 {
        (duration / options.max_duration).ceil() as usize
    } else {
        1
    };
    let chars = segment.char_count();
    let by_chars = if chars > options.max_chars_per_caption && options.max_chars_per_caption > 0 {
        chars.div_ceil(options.max_chars_per_caption)
    } else {
        1
    };

    let mut pieces = by_time.max(by_chars);

    // Width-driven splits must not push pieces under the minimum duration
    if pieces > by_time && options.min_duration > 0.0 {
        let limit = (duration / options.min_duration).floor() as usize;
        pieces = pieces.min(limit.max(by_time));
    }

    pieces.min(word_count).max(1)
}

/// Cut a segment into balanced pieces at word boundaries.
///
/// Fewer pieces are tried when a cut would leave a piece under the minimum
/// duration. A segment with no acceptable cut (a single word, or one token
/// dominating the text) is returned unsplit even when it exceeds the bounds.
fn split_segment(segment: ReflowedSegment, options: &ReflowOptions) -> Vec<ReflowedSegment> {
    let words: Vec<&str> = segment.text.split_whitespace().collect();
    let pieces = piece_count(&segment, words.len(), options);

    if pieces > 1 {
        for count in (2..=pieces).rev() {
            if let Some(cut) = cut_into(&segment, &words, count, options) {
                return cut;
            }
        }
    }

    if segment.duration() > options.max_duration {
        debug!(
            "Keeping oversized segment [{:.2}s - {:.2}s] unsplit: no usable word boundary",
            segment.start, segment.end
        );
    }
    vec![segment]
}

/// Cut into `count` pieces, re-cutting any piece still over the maximum.
/// Returns `None` when a piece would fall under the minimum duration or a
/// multi-word piece would stay over the maximum.
fn cut_into(
    segment: &ReflowedSegment,
    words: &[&str],
    count: usize,
    options: &ReflowOptions,
) -> Option<Vec<ReflowedSegment>> {
    // cumulative[j] = characters in words[..j], spaces excluded
    let mut cumulative = Vec::with_capacity(words.len() + 1);
    cumulative.push(0usize);
    for word in words {
        let last = *cumulative.last().unwrap_or(&0);
        cumulative.push(last + word.chars().count());
    }
    let total_chars = cumulative[words.len()];
    if total_chars == 0 {
        return None;
    }

    let boundaries = choose_boundaries(&cumulative, count);
    let duration = segment.duration();
    let time_at = |chars: usize| segment.start + duration * (chars as f64 / total_chars as f64);

    let mut result = Vec::with_capacity(count);
    let mut from = 0usize;
    for (k, &to) in boundaries.iter().enumerate() {
        let is_last = k == boundaries.len() - 1;
        let piece = ReflowedSegment {
            start: time_at(cumulative[from]),
            end: if is_last { segment.end } else { time_at(cumulative[to]) },
            text: words[from..to].join(" "),
            confidence: segment.confidence,
            language: segment.language.clone(),
            source_segment_ids: segment.source_segment_ids.clone(),
        };
        let word_span = to - from;
        from = to;

        if piece.duration() < options.min_duration - DURATION_TOLERANCE {
            return None;
        }

        // Uneven word lengths can leave a piece over the limit; cut it again
        if piece.duration() > options.max_duration && word_span > 1 {
            let recut = split_segment(piece, options);
            let stuck = recut.iter().any(|p| {
                p.duration() > options.max_duration + DURATION_TOLERANCE && p.text.split_whitespace().count() > 1
            });
            if stuck {
                return None;
            }
            result.extend(recut);
        } else {
            result.push(piece);
        }
    }

    Some(result)
}

/// Pick `pieces - 1` interior word boundaries closest to equal character
/// shares. Returns the exclusive end index of every piece; ties go to the
/// earlier boundary.
fn choose_boundaries(cumulative: &[usize], pieces: usize) -> Vec<usize> {
    let word_count = cumulative.len() - 1;
    let total = cumulative[word_count] as f64;
    let mut boundaries = Vec::with_capacity(pieces);
    let mut previous = 0usize;

    for k in 1..pieces {
        let target = total * k as f64 / pieces as f64;
        // Leave at least one word for each remaining piece
        let lowest = previous + 1;
        let highest = word_count - (pieces - k);

        let mut best = lowest;
        let mut best_distance = f64::INFINITY;
        for candidate in lowest..=highest {
            let distance = (cumulative[candidate] as f64 - target).abs();
            if distance < best_distance {
                best = candidate;
                best_distance = distance;
            }
        }

        boundaries.push(best);
        previous = best;
    }

    boundaries.push(word_count);
    boundaries
}
