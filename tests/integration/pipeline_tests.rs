/*!
 * End-to-end tests for single units: reflow, translation, review
 */

use std::sync::Arc;

use subflow::app_config::CacheScope;
use subflow::errors::{AppError, ProviderError};
use subflow::pipeline::{CollectingSink, Pipeline, UnitInput, UnitOutcome, UnitResult};
use subflow::providers::mock::MockProvider;
use subflow::resume::ResumeController;
use subflow::segment::TranslationSource;

use crate::common::{sample_transcript, seg, seg_with_confidence, test_config};

fn completed(outcome: UnitOutcome) -> UnitResult {
    match outcome {
        UnitOutcome::Completed(result) => result,
        UnitOutcome::Skipped(unit) => panic!("unit '{}' was unexpectedly skipped", unit.id),
    }
}

fn pipeline(provider: &MockProvider) -> Pipeline {
    Pipeline::new(test_config(), Arc::new(provider.clone()), ResumeController::disabled())
}

#[tokio::test]
async fn test_runUnit_withSampleTranscript_shouldProduceOrderedTranslatedCues() {
    let provider = MockProvider::working();
    let input = UnitInput::new("interview", sample_transcript());

    let result = completed(pipeline(&provider).run_unit(&input).await.unwrap());

    assert_eq!(result.segments[0].text, "Well, hello there.");
    assert_eq!(result.segments[0].translated_text, "[fr] Well, hello there.");
    assert_eq!(result.segments[0].start, 0.0);
    assert_eq!(result.segments.last().unwrap().end, 11.0);
    for pair in result.segments.windows(2) {
        assert!(pair[1].start >= pair[0].end - 1e-9);
    }
    assert!(result.segments.iter().all(|s| s.translation_source == TranslationSource::Fresh));
    assert_eq!(provider.request_count(), result.segments.len());
}

#[tokio::test]
async fn test_runUnit_shouldFlagLowConfidenceWithoutChangingText() {
    let provider = MockProvider::working();
    let input = UnitInput::new("interview", sample_transcript());

    let result = completed(pipeline(&provider).run_unit(&input).await.unwrap());

    assert_eq!(result.review.len(), 1);
    let entry = &result.review.entries[0];
    assert_eq!(entry.original_text, "How have you been?");
    assert_eq!(entry.translated_text, "[fr] How have you been?");
    assert_eq!(entry.confidence, 0.3);
    assert_eq!(result.segments[entry.index].translated_text, "[fr] How have you been?");
    assert!(result.review.render().contains("How have you been?"));
}

#[tokio::test]
async fn test_runUnit_shouldSummarizeSegmentSources() {
    let provider = MockProvider::working();
    let input = UnitInput::new(
        "chorus",
        vec![
            seg(0.0, 2.0, "La la la."),
            seg(2.0, 4.0, "Sing along."),
            seg(4.0, 6.0, "La la la."),
            seg(6.0, 6.0, "dropped"),
        ],
    );

    let result = completed(pipeline(&provider).run_unit(&input).await.unwrap());

    assert_eq!(result.summary.raw_segments, 4);
    assert_eq!(result.summary.skipped_segments, 1);
    assert_eq!(result.summary.total_segments, 3);
    assert_eq!(result.summary.fresh, 2);
    assert_eq!(result.summary.from_cache, 1);
    assert_eq!(result.summary.failed, 0);
    assert_eq!(provider.request_count(), 2);
}

#[tokio::test]
async fn test_runUnit_withOneBadSegment_shouldIsolateFailure() {
    let provider = MockProvider::fail_on(["How have you been?"], ProviderError::Timeout("stuck".into()));
    let input = UnitInput::new("interview", sample_transcript());

    let result = completed(pipeline(&provider).run_unit(&input).await.unwrap());

    let failed: Vec<_> = result.segments.iter().filter(|s| s.is_failed()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].text, "How have you been?");
    assert!(failed[0].translated_text.is_empty());
    assert_eq!(failed[0].display_text(), "How have you been?");
    assert_eq!(result.summary.failed, 1);
    assert_eq!(result.dispatch.failures.len(), 1);
    assert!(result.segments.iter().filter(|s| !s.is_failed()).all(|s| s.translated_text.starts_with("[fr] ")));
}

#[tokio::test]
async fn test_runUnit_withProviderUnreachable_shouldFailWholeUnit() {
    let provider = MockProvider::failing(ProviderError::ApiError {
        status_code: 503,
        message: "maintenance".into(),
    });
    let input = UnitInput::new("interview", sample_transcript());

    let error = pipeline(&provider).run_unit(&input).await.unwrap_err();

    match error {
        AppError::ProviderUnreachable { unit_id, attempted, failed } => {
            assert_eq!(unit_id, "interview");
            assert_eq!(attempted, failed);
            assert!(attempted > 0);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_runUnit_withCachedLinesAndRateLimitedNewLine_shouldKeepUnitWithFailedSegment() {
    let provider = MockProvider::fail_on(["Brand new line."], ProviderError::RateLimitExceeded("429".into()));
    let pipeline = pipeline(&provider);
    let earlier = vec![
        seg(0.0, 2.0, "Previously on the show."),
        seg(4.0, 6.0, "Nobody saw it coming."),
        seg(8.0, 10.0, "Then the lights went out."),
    ];
    let mut later = earlier.clone();
    later.push(seg(12.0, 14.0, "Brand new line."));

    completed(pipeline.run_unit(&UnitInput::new("ep1", earlier)).await.unwrap());
    let result = completed(pipeline.run_unit(&UnitInput::new("ep2", later)).await.unwrap());

    assert_eq!(result.segments.len(), 4);
    assert!(result.segments[..3].iter().all(|s| s.translation_source == TranslationSource::Cache));
    let last = &result.segments[3];
    assert!(last.is_failed());
    assert_eq!(last.display_text(), "Brand new line.");
    assert_eq!(result.summary.failed, 1);
    assert_eq!(result.dispatch.failed_requests, 1);
}

#[tokio::test]
async fn test_runAndPersist_withEveryTextRateLimited_shouldWriteFailedSegments() {
    let provider = MockProvider::failing(ProviderError::RateLimitExceeded("429".into()));
    let sink = CollectingSink::new();
    let input = UnitInput::new("busy", vec![seg(0.0, 2.0, "One."), seg(4.0, 6.0, "Two.")]);

    pipeline(&provider).run_and_persist(&input, &sink).await.unwrap();

    let written = sink.results();
    assert_eq!(written.len(), 1);
    assert!(written[0].segments.iter().all(|s| s.is_failed()));
    assert_eq!(written[0].segments[1].display_text(), "Two.");
}

#[tokio::test]
async fn test_runUnit_withEveryTextRejected_shouldCompleteWithFailedSegments() {
    let provider = MockProvider::failing(ProviderError::UnsupportedInput("no".into()));
    let input = UnitInput::new("noise", vec![seg(0.0, 2.0, "zzz"), seg(2.0, 4.0, "hmm")]);

    let result = completed(pipeline(&provider).run_unit(&input).await.unwrap());

    assert!(result.segments.iter().all(|s| s.is_failed()));
    assert_eq!(provider.request_count(), 2);
}

#[tokio::test]
async fn test_runUnit_withEmptyTranscript_shouldCompleteEmpty() {
    let provider = MockProvider::working();
    let input = UnitInput::new("silence", vec![]);

    let result = completed(pipeline(&provider).run_unit(&input).await.unwrap());

    assert!(result.segments.is_empty());
    assert!(result.review.is_empty());
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test]
async fn test_runUnit_withBatchCacheScope_shouldReuseAcrossUnits() {
    let provider = MockProvider::working();
    let pipeline = pipeline(&provider);
    let first = UnitInput::new("ep1", vec![seg(0.0, 2.0, "Previously on the show.")]);
    let second = UnitInput::new("ep2", vec![seg(0.0, 2.0, "Previously on the show.")]);

    completed(pipeline.run_unit(&first).await.unwrap());
    let result = completed(pipeline.run_unit(&second).await.unwrap());

    assert_eq!(provider.request_count(), 1);
    assert_eq!(result.segments[0].translation_source, TranslationSource::Cache);
    assert_eq!(pipeline.cache().len(), 1);
}

#[tokio::test]
async fn test_runUnit_withUnitCacheScope_shouldTranslateAgain() {
    let provider = MockProvider::working();
    let mut config = test_config();
    config.translation.cache_scope = CacheScope::Unit;
    let pipeline = Pipeline::new(config, Arc::new(provider.clone()), ResumeController::disabled());
    let unit = UnitInput::new("ep1", vec![seg(0.0, 2.0, "Previously on the show.")]);

    completed(pipeline.run_unit(&unit).await.unwrap());
    let result = completed(pipeline.run_unit(&unit).await.unwrap());

    assert_eq!(provider.request_count(), 2);
    assert_eq!(result.segments[0].translation_source, TranslationSource::Fresh);
    assert!(pipeline.cache().is_empty());
}

#[tokio::test]
async fn test_runAndPersist_shouldHandResultToSink() {
    let provider = MockProvider::working();
    let sink = CollectingSink::new();
    let input = UnitInput::new("interview", vec![seg_with_confidence(0.0, 2.0, "Hi.", 0.95)]);

    pipeline(&provider).run_and_persist(&input, &sink).await.unwrap();

    let written = sink.results();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].unit.id, "interview");
    assert_eq!(written[0].segments[0].translated_text, "[fr] Hi.");
}
