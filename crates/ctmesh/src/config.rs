//! Pipeline configuration.

use std::path::{Path, PathBuf};

use ctmesh_core::{Result, SegmentOptions};
use ctmesh_io::StlFormat;
use ctmesh_store::FileRecordStore;
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`PipelineConfig::series_root`].
pub const ENV_SERIES_ROOT: &str = "CTMESH_SERIES_ROOT";
/// Environment variable overriding [`PipelineConfig::artifact_root`].
pub const ENV_ARTIFACT_ROOT: &str = "CTMESH_ARTIFACT_ROOT";
/// Environment variable overriding [`PipelineConfig::record_root`].
pub const ENV_RECORD_ROOT: &str = "CTMESH_RECORD_ROOT";

/// Where the pipeline reads series from and writes its outputs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding one subdirectory per session with slices and `mapping.json`.
    pub series_root: PathBuf,

    /// Directory receiving masks, thumbnails and STL files.
    pub artifact_root: PathBuf,

    /// Directory of the file-backed record store.
    pub record_root: PathBuf,

    /// Name written into STL headers.
    pub stl_header_name: String,

    /// Default STL encoding for exports.
    pub stl_format: StlFormat,

    /// Default segmentation options.
    pub segment: SegmentOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            series_root: PathBuf::from("data/series"),
            artifact_root: PathBuf::from("data/artifacts"),
            record_root: PathBuf::from("data/records"),
            stl_header_name: "ctmesh".to_string(),
            stl_format: StlFormat::Binary,
            segment: SegmentOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// Configuration with all three roots below `root`.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            series_root: root.join("series"),
            artifact_root: root.join("artifacts"),
            record_root: root.join("records"),
            ..Self::default()
        }
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Applies the `CTMESH_*_ROOT` environment variables.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies root overrides looked up by environment variable name.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        if let Some(path) = get(ENV_SERIES_ROOT) {
            self.series_root = path;
        }
        if let Some(path) = get(ENV_ARTIFACT_ROOT) {
            self.artifact_root = path;
        }
        if let Some(path) = get(ENV_RECORD_ROOT) {
            self.record_root = path;
        }
        self
    }

    /// Opens the file-backed record store at [`Self::record_root`].
    pub fn open_record_store(&self) -> Result<FileRecordStore> {
        FileRecordStore::open(&self.record_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.stl_format, StlFormat::Binary);
        assert_eq!(config.segment, SegmentOptions::default());
        assert_eq!(config.stl_header_name, "ctmesh");
    }

    #[test]
    fn test_partial_json() {
        let config = PipelineConfig::from_json_str(
            r#"{
                "artifact_root": "/srv/out",
                "stl_format": "ascii",
                "segment": { "preset": "soft_tissue", "min_size_voxels": 50 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.artifact_root, PathBuf::from("/srv/out"));
        assert_eq!(config.series_root, PathBuf::from("data/series"));
        assert_eq!(config.stl_format, StlFormat::Ascii);
        assert_eq!(config.segment.preset.as_deref(), Some("soft_tissue"));
        assert_eq!(config.segment.min_size_voxels, 50);
        assert_eq!(config.segment.closing_radius_mm, ctmesh_core::DEFAULT_CLOSING_RADIUS_MM);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            PipelineConfig::from_json_str("[1, 2]"),
            Err(ctmesh_core::CtmeshError::JsonError(_))
        ));
    }

    #[test]
    fn test_json_file_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctmesh.json");
        std::fs::write(&path, r#"{"record_root": "/var/records"}"#).unwrap();
        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.record_root, PathBuf::from("/var/records"));

        let env: HashMap<&str, &str> = [(ENV_SERIES_ROOT, "/in"), (ENV_RECORD_ROOT, "")].into();
        let config = config.with_overrides(|k| env.get(k).map(ToString::to_string));
        assert_eq!(config.series_root, PathBuf::from("/in"));
        assert_eq!(config.record_root, PathBuf::from("/var/records"));
        assert_eq!(config.artifact_root, PathBuf::from("data/artifacts"));
    }

    #[test]
    fn test_rooted_at() {
        let config = PipelineConfig::rooted_at("/tmp/x");
        assert_eq!(config.series_root, PathBuf::from("/tmp/x/series"));
        assert_eq!(config.record_root, PathBuf::from("/tmp/x/records"));
    }
}
