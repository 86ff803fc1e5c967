/*!
 * Resume support: skip units that already completed.
 *
 * A `RunMarker` is written once every artifact for a unit is durably
 * produced. Before running a unit, the controller looks for a marker whose
 * input fingerprint matches the current input; a match means the unit is
 * skipped entirely.
 *
 * - `file_store`: one JSON marker file per unit, atomically replaced
 * - `sqlite_store`: one row per unit in a SQLite table
 * - `controller`: the skip/mark decisions
 */

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use uuid::Uuid;

use crate::quality::RunSummary;
use crate::segment::{fingerprint_segments, RawSegment};

pub mod controller;
pub mod file_store;
pub mod sqlite_store;

pub use controller::ResumeController;
pub use file_store::FileMarkerStore;
pub use sqlite_store::SqliteMarkerStore;

/// One unit of work: a video, or any batch of segments processed together
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkUnit {
    /// Caller-chosen stable identifier
    pub id: String,

    /// SHA-256 of the unit's raw input
    pub fingerprint: String,
}

impl WorkUnit {
    pub fn new(id: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fingerprint: fingerprint.into(),
        }
    }

    /// Identify a unit by id and the content of its transcript
    pub fn from_segments(id: impl Into<String>, segments: &[RawSegment]) -> Self {
        Self::new(id, fingerprint_segments(segments))
    }
}

/// Durable record that a unit completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMarker {
    pub unit_id: String,
    pub fingerprint: String,
    /// Identifier of the run that wrote the marker
    pub run_id: String,
    /// Translated segments produced
    pub segment_count: usize,
    pub summary: RunSummary,
    /// RFC 3339 completion time
    pub completed_at: String,
}

impl RunMarker {
    pub fn new(unit: &WorkUnit, segment_count: usize, summary: RunSummary) -> Self {
        Self {
            unit_id: unit.id.clone(),
            fingerprint: unit.fingerprint.clone(),
            run_id: Uuid::new_v4().to_string(),
            segment_count,
            summary,
            completed_at: Utc::now().to_rfc3339(),
        }
    }

    /// Whether this marker was written for the unit's current input
    pub fn matches(&self, unit: &WorkUnit) -> bool {
        self.unit_id == unit.id && self.fingerprint == unit.fingerprint
    }
}

/// Backing storage for run markers
///
/// `save` must be all-or-nothing: a reader sees either the previous marker
/// or the new one, never a partial write.
#[async_trait]
pub trait MarkerStore: Send + Sync + Debug {
    /// Load the marker for a unit, if any
    async fn load(&self, unit_id: &str) -> Result<Option<RunMarker>>;

    /// Store a marker, replacing any previous one for the same unit
    async fn save(&self, marker: &RunMarker) -> Result<()>;

    /// Delete a unit's marker; returns whether one existed
    async fn remove(&self, unit_id: &str) -> Result<bool>;
}
