//! Pipeline stages for ctmesh.
//!
//! - [`SliceCatalogLoader`] resolves a session manifest to slice files
//! - [`VolumeBuilder`] decodes and stacks slices into a calibrated [`Volume`]
//! - [`Segmenter`] thresholds and refines the dominant structure
//! - [`extract_surface`] turns a mask into a millimeter-space triangle mesh
//!
//! [`Volume`]: ctmesh_core::Volume

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod dicom;
pub mod modality;
pub mod segment;
pub mod surface;
pub mod volume_builder;

pub use catalog::{
    ManifestEntry, SeriesManifest, SliceCatalog, SliceCatalogLoader, SliceFile, MANIFEST_FILE,
};
pub use dicom::{DicomSliceDecoder, SliceDecodeError, SliceDecoder, SliceImage};
pub use modality::{
    strategy_for, CtStrategy, ModalityStrategy, RawStrategy, ThresholdAttempt, ThresholdPlan,
    ThresholdPolicy,
};
pub use segment::{Segmentation, Segmenter};
pub use surface::{extract_surface, ExtractionError, Surface};
pub use volume_builder::{assemble_volume, order_slices, VolumeBuilder};
