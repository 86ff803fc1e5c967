/*!
 * SQLite marker store.
 *
 * Markers live in the `run_markers` table, one row per unit, upserted
 * inside a transaction.
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use crate::database::DatabaseConnection;

use super::{MarkerStore, RunMarker};

/// Stores markers in a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteMarkerStore {
    db: DatabaseConnection,
}

impl SqliteMarkerStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open (or create) the database at the default location
    pub fn new_default() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_default()?))
    }

    /// Create a store backed by an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl MarkerStore for SqliteMarkerStore {
    async fn load(&self, unit_id: &str) -> Result<Option<RunMarker>> {
        let unit_id = unit_id.to_string();

        self.db
            .execute_async(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT unit_id, fingerprint, run_id, segment_count, summary, completed_at
                         FROM run_markers WHERE unit_id = ?1",
                        params![unit_id],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, i64>(3)?,
                                row.get::<_, String>(4)?,
                                row.get::<_, String>(5)?,
                            ))
                        },
                    )
                    .optional()?;

                let Some((unit_id, fingerprint, run_id, segment_count, summary, completed_at)) = row else {
                    return Ok(None);
                };

                let summary = serde_json::from_str(&summary)
                    .with_context(|| format!("Failed to parse marker summary for '{}'", unit_id))?;

                Ok(Some(RunMarker {
                    unit_id,
                    fingerprint,
                    run_id,
                    segment_count: segment_count.max(0) as usize,
                    summary,
                    completed_at,
                }))
            })
            .await
    }

    async fn save(&self, marker: &RunMarker) -> Result<()> {
        let marker = marker.clone();
        let summary = serde_json::to_string(&marker.summary).context("Failed to serialize marker summary")?;

        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    "INSERT OR REPLACE INTO run_markers
                     (unit_id, fingerprint, run_id, segment_count, summary, completed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        marker.unit_id,
                        marker.fingerprint,
                        marker.run_id,
                        marker.segment_count as i64,
                        summary,
                        marker.completed_at
                    ],
                )?;
                Ok(())
            })
            .await
    }

    async fn remove(&self, unit_id: &str) -> Result<bool> {
        let unit_id = unit_id.to_string();

        self.db
            .transaction_async(move |tx| {
                let removed = tx.execute("DELETE FROM run_markers WHERE unit_id = ?1", params![unit_id])?;
                Ok(removed > 0)
            })
            .await
    }
}
