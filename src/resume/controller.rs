/*!
 * Resume decisions.
 */

use log::{debug, info, warn};
use std::sync::Arc;

use crate::errors::AppError;
use crate::quality::RunSummary;

use super::{MarkerStore, RunMarker, WorkUnit};

/// Decides whether a unit can be skipped and records completions
#[derive(Debug, Clone)]
pub struct ResumeController {
    store: Option<Arc<dyn MarkerStore>>,
    enabled: bool,
}

impl ResumeController {
    /// Controller backed by `store`. When `enabled` is false every unit runs,
    /// but completions are still recorded.
    pub fn new(store: Arc<dyn MarkerStore>, enabled: bool) -> Self {
        Self {
            store: Some(store),
            enabled,
        }
    }

    /// Controller with no store: nothing is skipped or recorded
    pub fn disabled() -> Self {
        Self {
            store: None,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && self.store.is_some()
    }

    /// Whether a matching completion marker exists for the unit.
    ///
    /// A marker for different input is stale and ignored. An unreadable
    /// marker counts as absent, so the unit runs again.
    pub async fn is_complete(&self, unit: &WorkUnit) -> bool {
        let Some(store) = self.store.as_ref().filter(|_| self.enabled) else {
            return false;
        };

        match store.load(&unit.id).await {
            Ok(Some(marker)) if marker.matches(unit) => {
                info!("Unit '{}' already completed at {}, skipping", unit.id, marker.completed_at);
                true
            }
            Ok(Some(_)) => {
                info!("Unit '{}' input changed since its last run, reprocessing", unit.id);
                false
            }
            Ok(None) => {
                debug!("No completion marker for unit '{}'", unit.id);
                false
            }
            Err(e) => {
                warn!("Could not read completion marker for unit '{}': {:#}", unit.id, e);
                false
            }
        }
    }

    /// Record that a unit completed.
    ///
    /// Call only after every artifact for the unit is durably written.
    pub async fn mark_complete(
        &self,
        unit: &WorkUnit,
        segment_count: usize,
        summary: RunSummary,
    ) -> Result<Option<RunMarker>, AppError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };

        let marker = RunMarker::new(unit, segment_count, summary);
        store
            .save(&marker)
            .await
            .map_err(|e| AppError::Resume(format!("Failed to save marker for '{}': {:#}", unit.id, e)))?;

        debug!("Marked unit '{}' complete (run {})", unit.id, marker.run_id);
        Ok(Some(marker))
    }

    /// Forget a unit's completion so the next run processes it again
    pub async fn invalidate(&self, unit_id: &str) -> Result<bool, AppError> {
        let Some(store) = &self.store else {
            return Ok(false);
        };

        store
            .remove(unit_id)
            .await
            .map_err(|e| AppError::Resume(format!("Failed to remove marker for '{}': {:#}", unit_id, e)))
    }
}
