/*!
 * Filesystem marker store.
 *
 * Each unit gets `<dir>/<unit>.done.json`. Markers are written to a
 * temporary file in the same directory and renamed into place, so a crash
 * never leaves a truncated marker behind.
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::{MarkerStore, RunMarker};

// @const: Marker file suffix
const MARKER_SUFFIX: &str = ".done.json";

/// Stores one JSON marker file per unit in a directory
#[derive(Debug, Clone)]
pub struct FileMarkerStore {
    dir: PathBuf,
}

impl FileMarkerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Marker path for a unit id.
    ///
    /// Characters outside `[A-Za-z0-9._-]` become `_`; when that changes
    /// the id, a short hash of the original keeps distinct ids apart.
    pub fn marker_path(&self, unit_id: &str) -> PathBuf {
        let sanitized: String = unit_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
            .collect();

        let file_stem = if sanitized == unit_id && !sanitized.is_empty() && !sanitized.starts_with('.') {
            sanitized
        } else {
            let digest = format!("{:x}", Sha256::digest(unit_id.as_bytes()));
            format!("{}-{}", sanitized.trim_start_matches('.'), &digest[..12])
        };

        self.dir.join(format!("{}{}", file_stem, MARKER_SUFFIX))
    }
}

#[async_trait]
impl MarkerStore for FileMarkerStore {
    async fn load(&self, unit_id: &str) -> Result<Option<RunMarker>> {
        let path = self.marker_path(unit_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Failed to read marker: {:?}", path)),
        };

        let marker = serde_json::from_str(&content).with_context(|| format!("Failed to parse marker: {:?}", path))?;
        Ok(Some(marker))
    }

    async fn save(&self, marker: &RunMarker) -> Result<()> {
        let dir = self.dir.clone();
        let path = self.marker_path(&marker.unit_id);
        let json = serde_json::to_string_pretty(marker).context("Failed to serialize marker")?;

        tokio::task::spawn_blocking(move || -> Result<()> {
            std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create marker directory: {:?}", dir))?;

            let mut file = NamedTempFile::new_in(&dir).context("Failed to create temporary marker file")?;
            file.write_all(json.as_bytes())?;
            file.as_file().sync_all()?;
            file.persist(&path)
                .map_err(|e| e.error)
                .with_context(|| format!("Failed to persist marker: {:?}", path))?;

            debug!("Wrote resume marker {:?}", path);
            Ok(())
        })
        .await
        .context("Marker write task panicked")?
    }

    async fn remove(&self, unit_id: &str) -> Result<bool> {
        let path = self.marker_path(unit_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove marker: {:?}", path)),
        }
    }
}
