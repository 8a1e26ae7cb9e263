//! Series manifests and slice file resolution.
//!
//! Each session directory under the series root holds the original slice files
//! and a `mapping.json` manifest written by the upload step:
//!
//! ```json
//! {
//!   "image_0.png": { "dicom_name": "CT0001.dcm", "archivodicomid": 17 },
//!   "image_1.png": { "dicom_name": "CT0002.dcm", "archivodicomid": 18 }
//! }
//! ```
//!
//! Keys are display names, kept in file order.

use std::fs;
use std::path::{Component, Path, PathBuf};

use ctmesh_core::{validate_session_id, CtmeshError, Result};
use serde::{Deserialize, Serialize};

/// File name of the manifest inside a session directory.
pub const MANIFEST_FILE: &str = "mapping.json";

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub display_name: String,
    /// Source file path relative to the session directory.
    pub source: String,
    /// Identifier of the originating upload record, if the uploader assigned one.
    pub record_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ManifestValue {
    #[serde(rename = "dicom_name", alias = "source")]
    source: Option<String>,
    #[serde(rename = "archivodicomid", alias = "record_id")]
    record_id: Option<i64>,
}

/// The ordered slice listing of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesManifest {
    pub entries: Vec<ManifestEntry>,
}

impl SeriesManifest {
    /// Parses manifest JSON. Entries without a source file are ignored.
    pub fn from_json(json: &str) -> Result<Self> {
        let root: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Object(map) = root else {
            return Err(CtmeshError::ManifestInvalid(
                "top-level value must be an object".to_string(),
            ));
        };

        let mut entries = Vec::with_capacity(map.len());
        for (display_name, value) in map {
            let value: ManifestValue = serde_json::from_value(value).map_err(|e| {
                CtmeshError::ManifestInvalid(format!("entry '{display_name}': {e}"))
            })?;
            let Some(source) = value.source.filter(|s| !s.is_empty()) else {
                continue;
            };
            entries.push(ManifestEntry {
                display_name,
                source,
                record_id: value.record_id,
            });
        }
        Ok(Self { entries })
    }
}

/// A slice file that exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceFile {
    pub path: PathBuf,
    pub display_name: String,
    pub record_id: Option<i64>,
}

impl SliceFile {
    /// File name used as the last-resort ordering key.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Resolved slices of one session, in manifest order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceCatalog {
    pub session_id: String,
    pub slices: Vec<SliceFile>,
}

impl SliceCatalog {
    #[must_use]
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

/// Resolves session manifests under a series root directory.
#[derive(Debug, Clone)]
pub struct SliceCatalogLoader {
    series_root: PathBuf,
}

impl SliceCatalogLoader {
    pub fn new(series_root: impl Into<PathBuf>) -> Self {
        Self {
            series_root: series_root.into(),
        }
    }

    #[must_use]
    pub fn series_root(&self) -> &Path {
        &self.series_root
    }

    /// Directory holding the slices and manifest of `session_id`.
    pub fn session_dir(&self, session_id: &str) -> Result<PathBuf> {
        validate_session_id(session_id)?;
        Ok(self.series_root.join(session_id))
    }

    /// Reads the manifest of `session_id` and keeps entries whose file exists.
    ///
    /// # Errors
    /// - [`CtmeshError::ManifestMissing`] if the session has no manifest
    /// - [`CtmeshError::SeriesEmpty`] if no entry resolves to a file on disk
    pub fn load(&self, session_id: &str) -> Result<SliceCatalog> {
        let dir = self.session_dir(session_id)?;
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(CtmeshError::ManifestMissing(session_id.to_string()));
        }

        let manifest = SeriesManifest::from_json(&fs::read_to_string(&manifest_path)?)?;
        let mut slices = Vec::with_capacity(manifest.entries.len());
        for entry in manifest.entries {
            if !is_contained(&entry.source) {
                log::warn!(
                    "session {session_id}: manifest entry {:?} escapes the session dir ({})",
                    entry.display_name,
                    entry.source
                );
                continue;
            }
            let path = dir.join(&entry.source);
            if !path.is_file() {
                log::debug!("session {session_id}: slice file {} is missing", path.display());
                continue;
            }
            slices.push(SliceFile {
                path,
                display_name: entry.display_name,
                record_id: entry.record_id,
            });
        }

        if slices.is_empty() {
            return Err(CtmeshError::SeriesEmpty(session_id.to_string()));
        }
        log::debug!("session {session_id}: resolved {} slice files", slices.len());
        Ok(SliceCatalog {
            session_id: session_id.to_string(),
            slices,
        })
    }
}

/// True when `source` is a relative path that stays inside its base directory.
fn is_contained(source: &str) -> bool {
    Path::new(source)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
