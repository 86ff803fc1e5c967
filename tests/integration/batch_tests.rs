/*!
 * Tests for batch runs: failure isolation between units and shutdown
 */

use std::future::{pending, ready};
use std::time::Duration;

use async_trait::async_trait;

use subflow::errors::ProviderError;
use subflow::pipeline::{ArtifactSink, CollectingSink, UnitInput, UnitResult};
use subflow::providers::mock::MockProvider;
use subflow::resume::{FileMarkerStore, MarkerStore};

use crate::common::{pipeline_with, sample_units, seg, test_config};

/// Sink that fails for one unit only
struct PickySink {
    reject: &'static str,
    inner: CollectingSink,
}

#[async_trait]
impl ArtifactSink for PickySink {
    async fn write(&self, result: &UnitResult) -> anyhow::Result<()> {
        if result.unit.id == self.reject {
            anyhow::bail!("cannot write '{}'", result.unit.id);
        }
        self.inner.write(result).await
    }
}

#[tokio::test]
async fn test_runBatch_withUnreachableUnit_shouldContinueWithOthers() {
    let dir = tempfile::tempdir().unwrap();
    let units = vec![
        UnitInput::new("good-1", vec![seg(0.0, 2.0, "Good morning.")]),
        UnitInput::new("doomed", vec![seg(0.0, 2.0, "Doomed line one."), seg(2.0, 4.0, "Doomed line two.")]),
        UnitInput::new("good-2", vec![seg(0.0, 2.0, "Good night.")]),
    ];
    let provider = MockProvider::fail_on(
        ["Doomed line one.", "Doomed line two."],
        ProviderError::ConnectionError("refused".into()),
    );
    let sink = CollectingSink::new();

    let report = pipeline_with(&provider, test_config(), &dir)
        .run_batch(&units, &sink, pending())
        .await;

    assert_eq!(
        report.completed.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>(),
        vec!["good-1", "good-2"]
    );
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "doomed");
    assert!(report.failed[0].1.contains("unreachable"));
    assert_eq!(sink.results().len(), 2);

    let store = FileMarkerStore::new(dir.path());
    assert!(store.load("good-1").await.unwrap().is_some());
    assert!(store.load("doomed").await.unwrap().is_none());
}

#[tokio::test]
async fn test_runBatch_withSinkFailure_shouldFailOnlyThatUnit() {
    let dir = tempfile::tempdir().unwrap();
    let units = sample_units(3);
    let provider = MockProvider::working();
    let sink = PickySink {
        reject: "episode-02",
        inner: CollectingSink::new(),
    };

    let report = pipeline_with(&provider, test_config(), &dir)
        .run_batch(&units, &sink, pending())
        .await;

    assert_eq!(report.completed.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "episode-02");

    let store = FileMarkerStore::new(dir.path());
    assert!(store.load("episode-02").await.unwrap().is_none());
    assert!(store.load("episode-03").await.unwrap().is_some());
}

#[tokio::test]
async fn test_runBatch_withShutdownMidUnit_shouldCancelWithoutMarkers() {
    let dir = tempfile::tempdir().unwrap();
    let units = sample_units(3);
    let provider = MockProvider::slow(300);
    let sink = CollectingSink::new();

    let report = pipeline_with(&provider, test_config(), &dir)
        .run_batch(&units, &sink, tokio::time::sleep(Duration::from_millis(50)))
        .await;

    assert!(report.was_cancelled());
    assert_eq!(report.cancelled, vec!["episode-01", "episode-02", "episode-03"]);
    assert!(report.completed.is_empty());
    assert!(sink.results().is_empty());

    let store = FileMarkerStore::new(dir.path());
    for unit in &units {
        assert!(store.load(&unit.id).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_runBatch_afterCancellation_shouldRunRemainingUnits() {
    let dir = tempfile::tempdir().unwrap();
    let units = sample_units(2);

    let provider = MockProvider::working();
    let pipeline = pipeline_with(&provider, test_config(), &dir);
    let interrupted = pipeline.run_batch(&units, &CollectingSink::new(), ready(())).await;
    assert_eq!(interrupted.cancelled.len(), 2);
    assert_eq!(provider.request_count(), 0);

    let report = pipeline.run_batch(&units, &CollectingSink::new(), pending()).await;
    assert_eq!(report.completed.len(), 2);
    assert!(!report.was_cancelled());
}

#[tokio::test]
async fn test_batchReport_display_shouldCountEveryState() {
    let dir = tempfile::tempdir().unwrap();
    let units = sample_units(2);
    let provider = MockProvider::working();

    let report = pipeline_with(&provider, test_config(), &dir)
        .run_batch(&units, &CollectingSink::new(), pending())
        .await;

    assert_eq!(report.total(), 2);
    assert_eq!(report.to_string(), "2 units: 2 completed, 0 skipped, 0 failed, 0 cancelled");
}
