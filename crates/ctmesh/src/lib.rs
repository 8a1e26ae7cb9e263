//! ctmesh: turn a CT series into a printable STL surface.
//!
//! The pipeline reads a session's DICOM slices, stacks them into a calibrated
//! volume, segments the dominant structure by thresholding and morphology,
//! measures it and extracts its surface with marching cubes.
//!
//! # Quick Start
//!
//! ```no_run
//! use ctmesh::*;
//!
//! fn main() -> Result<()> {
//!     init_logging();
//!
//!     let config = PipelineConfig::default().with_env_overrides();
//!     let store = config.open_record_store()?;
//!     let pipeline = Pipeline::new(config);
//!
//!     let options = SegmentOptions::default().with_preset("bone");
//!     let outcome = pipeline.run_segmentation(&store, "study-42", 1, &options)?;
//!     println!("{:.1} mm3", outcome.record.volume_mm3);
//!
//!     let mesh = pipeline.export_mesh(&store, "study-42", 1, Some(outcome.record.id))?;
//!     println!("wrote {}", mesh.path.display());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `ctmesh-core`: volumes, masks, options, metrics and the marching cubes kernel
//! - `ctmesh-processing`: manifest loading, DICOM decoding, segmentation, surfaces
//! - `ctmesh-io`: STL, `.npy` mask dumps and PNG thumbnails
//! - `ctmesh-store`: records, record stores and the artifact layout

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod pipeline;

pub use config::{PipelineConfig, ENV_ARTIFACT_ROOT, ENV_RECORD_ROOT, ENV_SERIES_ROOT};
pub use pipeline::{Pipeline, SegmentationOutcome};

// Re-export core types
pub use ctmesh_core::{
    compute_metrics, CtPreset, CtmeshError, Mask, MaskMetrics, Modality, Plane, Result,
    SegmentOptions, Spacing, ThresholdWindow, TriangleMesh, Volume,
};

// Re-export pipeline stages
pub use ctmesh_processing::{
    extract_surface, DicomSliceDecoder, ExtractionError, Segmentation, Segmenter,
    SliceCatalogLoader, SliceDecoder, SliceImage, Surface, VolumeBuilder,
};

// Re-export formats
pub use ctmesh_io::{load_mask, save_mask, save_stl, StlFormat};

// Re-export storage
pub use ctmesh_store::{
    ArtifactLayout, FileRecordStore, MemoryRecordStore, MeshArtifact, RecordStore,
    SegmentationRecord, UserId,
};

pub use uuid::Uuid;

/// Installs the `env_logger` backend for the `log` macros.
///
/// Safe to call more than once; returns `false` if a logger was already set.
pub fn init_logging() -> bool {
    env_logger::try_init().is_ok()
}
