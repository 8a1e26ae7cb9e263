//! Core abstractions for ctmesh.
//!
//! This crate provides the fundamental types shared by every pipeline stage:
//! - [`Volume`] and [`Spacing`] for calibrated scalar fields in `(Z, Y, X)` order
//! - [`Mask`] for binary segmentation results
//! - [`SegmentOptions`] and [`CtPreset`] for threshold configuration
//! - [`marching_cubes`] isosurface kernel, [`TriangleMesh`] and [`compute_metrics`]

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod marching_cubes;
pub mod mask;
pub mod mesh;
pub mod metrics;
pub mod options;
pub mod session;
pub mod volume;

pub use error::{CtmeshError, Result};
pub use marching_cubes::{marching_cubes, IsoMesh};
pub use mask::{Mask, Plane};
pub use mesh::TriangleMesh;
pub use metrics::{compute_metrics, BoundingBoxMm, MaskMetrics};
pub use options::{
    CtPreset, SegmentOptions, ThresholdWindow, CT_CLIP_MAX, CT_CLIP_MIN, DEFAULT_CLOSING_RADIUS_MM,
    DEFAULT_MIN_SIZE_VOXELS, FALLBACK_MIN_SIZE_VOXELS,
};
pub use session::validate_session_id;
pub use volume::{coords_of, linear_index, Modality, Spacing, Volume};

// Re-export glam types for convenience
pub use glam::{DVec3, Vec3};
