/*!
 * End-to-end processing of units of work.
 *
 * For each unit: resume check, sanitize, reflow, translate, review. A unit
 * is all-or-nothing: its completion marker is written only after the
 * artifact sink has durably stored its output.
 */

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::app_config::{CacheScope, Config, MarkerStoreKind, ResumeConfig, TranslationProvider};
use crate::database::DatabaseConnection;
use crate::errors::AppError;
use crate::providers::mock::MockProvider;
use crate::providers::ollama::OllamaTranslator;
use crate::providers::Translator;
use crate::quality::{flag_low_confidence, ReviewReport, RunSummary};
use crate::reflow::{passthrough, reflow};
use crate::resume::{FileMarkerStore, MarkerStore, ResumeController, SqliteMarkerStore, WorkUnit};
use crate::segment::{sanitize_segments, RawSegment, TranslatedSegment};
use crate::translation::dispatcher::ProgressCallback;
use crate::translation::{DispatchReport, Dispatcher, RetryController, TranslationCache};

/// A unit of work: an identifier and its raw transcript
#[derive(Debug, Clone, PartialEq)]
pub struct UnitInput {
    pub id: String,
    pub segments: Vec<RawSegment>,
}

impl UnitInput {
    pub fn new(id: impl Into<String>, segments: Vec<RawSegment>) -> Self {
        Self {
            id: id.into(),
            segments,
        }
    }

    /// Identity used for resume decisions
    pub fn work_unit(&self) -> WorkUnit {
        WorkUnit::from_segments(self.id.clone(), &self.segments)
    }
}

/// Output of a processed unit
#[derive(Debug, Clone)]
pub struct UnitResult {
    pub unit: WorkUnit,
    /// Translated segments in timeline order
    pub segments: Vec<TranslatedSegment>,
    pub summary: RunSummary,
    pub review: ReviewReport,
    pub dispatch: DispatchReport,
    pub elapsed: Duration,
}

/// What happened to a unit
#[derive(Debug, Clone)]
pub enum UnitOutcome {
    /// A matching completion marker existed; nothing ran
    Skipped(WorkUnit),
    Completed(UnitResult),
}

/// Durable destination for unit outputs (subtitle writers, databases, ...)
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Persist every artifact for a unit. Returning `Ok` means they are
    /// durable; the unit is then marked complete.
    async fn write(&self, result: &UnitResult) -> anyhow::Result<()>;
}

/// Sink that keeps results in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    results: Mutex<Vec<UnitResult>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results written so far, in write order
    pub fn results(&self) -> Vec<UnitResult> {
        self.results.lock().clone()
    }
}

#[async_trait]
impl ArtifactSink for CollectingSink {
    async fn write(&self, result: &UnitResult) -> anyhow::Result<()> {
        self.results.lock().push(result.clone());
        Ok(())
    }
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Units processed and marked complete, with their summaries
    pub completed: Vec<(String, RunSummary)>,
    /// Units skipped by resume
    pub skipped: Vec<String>,
    /// Units that failed, with the reason
    pub failed: Vec<(String, String)>,
    /// Units not finished because of shutdown
    pub cancelled: Vec<String>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.completed.len() + self.skipped.len() + self.failed.len() + self.cancelled.len()
    }

    pub fn was_cancelled(&self) -> bool {
        !self.cancelled.is_empty()
    }
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} units: {} completed, {} skipped, {} failed, {} cancelled",
            self.total(),
            self.completed.len(),
            self.skipped.len(),
            self.failed.len(),
            self.cancelled.len()
        )
    }
}

/// Runs units through reflow and translation
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
    provider: Arc<dyn Translator>,
    resume: ResumeController,
    /// Cache shared by every unit when the scope is `batch`
    shared_cache: TranslationCache,
}

impl Pipeline {
    pub fn new(config: Config, provider: Arc<dyn Translator>, resume: ResumeController) -> Self {
        let shared_cache = TranslationCache::new(config.translation.cache_enabled);
        Self {
            config,
            provider,
            resume,
            shared_cache,
        }
    }

    /// Build provider and resume store from the configuration
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        config.validate().map_err(|e| AppError::Config(format!("{:#}", e)))?;

        let translation = &config.translation;
        let provider: Arc<dyn Translator> = match translation.provider {
            TranslationProvider::Ollama => Arc::new(
                OllamaTranslator::new(
                    &translation.endpoint,
                    translation.model.clone(),
                    translation.system_prompt.clone(),
                    Duration::from_secs(translation.timeout_secs.max(1)),
                )
                .map_err(|e| AppError::Config(format!("{:#}", e)))?,
            ),
            TranslationProvider::Mock => Arc::new(MockProvider::working()),
        };

        let resume = build_resume_controller(&config.resume)?;
        info!(
            "Pipeline ready: provider {}, {} workers, resume {}",
            provider.name(),
            translation.worker_count,
            if resume.is_enabled() { "on" } else { "off" }
        );

        Ok(Self::new(config, provider, resume))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The batch-scoped cache
    pub fn cache(&self) -> &TranslationCache {
        &self.shared_cache
    }

    pub fn resume(&self) -> &ResumeController {
        &self.resume
    }

    fn cache_for_unit(&self) -> TranslationCache {
        match self.config.translation.cache_scope {
            CacheScope::Batch => self.shared_cache.clone(),
            CacheScope::Unit => TranslationCache::new(self.config.translation.cache_enabled),
        }
    }

    fn dispatcher(&self, cache: TranslationCache) -> Dispatcher {
        let retry = RetryController::new(self.provider.clone(), self.config.translation.retry_policy());
        Dispatcher::new(
            retry,
            cache,
            self.config.translation.worker_count,
            self.config.source_language.clone(),
        )
    }

    /// Process one unit, unless a matching completion marker exists.
    ///
    /// No marker is written here; call `mark_complete` once the result is
    /// durably stored, or use `run_batch`.
    pub async fn run_unit(&self, input: &UnitInput) -> Result<UnitOutcome, AppError> {
        self.run_unit_with_progress(input, None).await
    }

    async fn run_unit_with_progress(
        &self,
        input: &UnitInput,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<UnitOutcome, AppError> {
        let unit = input.work_unit();
        if self.resume.is_complete(&unit).await {
            return Ok(UnitOutcome::Skipped(unit));
        }

        let started = Instant::now();
        let sanitized = sanitize_segments(&input.segments);
        let skipped = sanitized.skipped();

        let reflowed = if self.config.reflow.enabled {
            reflow(&sanitized.segments, &self.config.reflow_options())
        } else {
            passthrough(&sanitized.segments)
        };
        debug!(
            "Unit '{}': {} raw segments, {} skipped, {} after reflow",
            unit.id,
            input.segments.len(),
            skipped,
            reflowed.len()
        );

        let dispatcher = self.dispatcher(self.cache_for_unit());
        let (segments, dispatch) = dispatcher
            .translate_all_with_progress(&reflowed, &self.config.target_language, progress)
            .await;

        if dispatch.provider_unreachable() {
            return Err(AppError::ProviderUnreachable {
                unit_id: unit.id,
                attempted: dispatch.requests,
                failed: dispatch.failed_requests,
            });
        }

        let threshold = self.config.quality.low_confidence_threshold;
        let review = ReviewReport::new(unit.id.clone(), threshold, flag_low_confidence(&segments, threshold));
        let summary = RunSummary::from_segments(input.segments.len(), skipped, &segments, review.len());

        info!("Unit '{}' done: {}", unit.id, summary);

        Ok(UnitOutcome::Completed(UnitResult {
            unit,
            segments,
            summary,
            review,
            dispatch,
            elapsed: started.elapsed(),
        }))
    }

    /// Record a unit as complete. Call only after its artifacts are durable.
    pub async fn mark_complete(&self, result: &UnitResult) -> Result<(), AppError> {
        self.resume
            .mark_complete(&result.unit, result.segments.len(), result.summary)
            .await
            .map(|_| ())
    }

    /// Process one unit end to end: run, write, then mark complete
    pub async fn run_and_persist(&self, input: &UnitInput, sink: &dyn ArtifactSink) -> Result<UnitOutcome, AppError> {
        self.run_and_persist_with_progress(input, sink, None).await
    }

    async fn run_and_persist_with_progress(
        &self,
        input: &UnitInput,
        sink: &dyn ArtifactSink,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<UnitOutcome, AppError> {
        let outcome = self.run_unit_with_progress(input, progress).await?;

        if let UnitOutcome::Completed(result) = &outcome {
            sink.write(result)
                .await
                .map_err(|e| AppError::File(format!("Failed to write artifacts for '{}': {:#}", result.unit.id, e)))?;
            self.mark_complete(result).await?;
        }

        Ok(outcome)
    }

    /// Process units in order until done or until `shutdown` resolves.
    ///
    /// A failing unit is recorded and the batch continues. On shutdown the
    /// unit in flight is abandoned without a marker, and it and every
    /// remaining unit are reported as cancelled.
    pub async fn run_batch<F>(&self, units: &[UnitInput], sink: &dyn ArtifactSink, shutdown: F) -> BatchReport
    where
        F: Future<Output = ()>,
    {
        let mut report = BatchReport::default();
        let progress_bar = self.batch_progress_bar(units.len() as u64);
        tokio::pin!(shutdown);

        for (position, input) in units.iter().enumerate() {
            progress_bar.set_message(input.id.clone());

            let bar = progress_bar.clone();
            let unit_id = input.id.clone();
            let on_progress = move |done: usize, total: usize| {
                bar.set_message(format!("{} {}/{}", unit_id, done, total));
            };

            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!("Shutdown requested: {}", AppError::Cancelled(input.id.clone()));
                    report.cancelled.extend(units[position..].iter().map(|u| u.id.clone()));
                    break;
                }
                outcome = self.run_and_persist_with_progress(input, sink, Some(&on_progress)) => outcome,
            };

            match outcome {
                Ok(UnitOutcome::Skipped(unit)) => report.skipped.push(unit.id),
                Ok(UnitOutcome::Completed(result)) => report.completed.push((result.unit.id, result.summary)),
                Err(e) => {
                    error!("Unit '{}' failed: {}", input.id, e);
                    report.failed.push((input.id.clone(), e.to_string()));
                }
            }
            progress_bar.inc(1);
        }

        progress_bar.finish_with_message(format!("{}", report));
        info!("Batch finished: {}", report);
        report
    }

    fn batch_progress_bar(&self, total: u64) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let progress_bar = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} units ({percent}%) {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("=>-"));
        progress_bar
    }
}

/// Build the resume controller selected by the configuration
pub fn build_resume_controller(config: &ResumeConfig) -> Result<ResumeController, AppError> {
    let store: Arc<dyn MarkerStore> = match config.store {
        MarkerStoreKind::File => Arc::new(FileMarkerStore::new(config.marker_dir.clone())),
        MarkerStoreKind::Sqlite => {
            let db = match &config.database_path {
                Some(path) => DatabaseConnection::new(path),
                None => DatabaseConnection::new_default(),
            }
            .map_err(|e| AppError::Database(format!("{:#}", e)))?;
            Arc::new(SqliteMarkerStore::new(db))
        }
    };
    Ok(ResumeController::new(store, config.resume_enabled))
}
