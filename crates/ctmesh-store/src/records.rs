//! Persisted records of segmentation runs and mesh exports.

use std::cmp::Ordering;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use ctmesh_core::{MaskMetrics, Spacing, ThresholdWindow};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of the user owning a record.
pub type UserId = i64;

/// One segmentation run. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationRecord {
    pub id: Uuid,
    pub session_id: String,
    pub user_id: UserId,
    /// Slices in the assembled volume (after replication or interpolation).
    pub n_slices: usize,
    pub voxel_count: usize,
    pub volume_mm3: f64,
    /// `None` when no surface could be extracted.
    pub surface_mm2: Option<f64>,
    pub bbox_x_mm: f64,
    pub bbox_y_mm: f64,
    pub bbox_z_mm: f64,
    /// Voxel spacing `[dz, dy, dx]` in millimeters.
    pub spacing_mm: [f64; 3],
    /// The volume was synthesized from fewer than three slices.
    pub synthetic: bool,
    /// The final mask is empty.
    pub warning: bool,
    pub threshold: ThresholdWindow,
    pub threshold_policy: String,
    pub mask_path: PathBuf,
    pub thumb_axial: PathBuf,
    pub thumb_sagittal: PathBuf,
    pub thumb_coronal: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl SegmentationRecord {
    #[must_use]
    pub fn spacing(&self) -> Spacing {
        let [dz, dy, dx] = self.spacing_mm;
        Spacing::new(dz, dy, dx)
    }

    /// Copies volume, bounding box and voxel count from `metrics`.
    pub fn apply_metrics(&mut self, metrics: &MaskMetrics) {
        let bbox = metrics.bbox_or_zero();
        self.voxel_count = metrics.voxel_count;
        self.volume_mm3 = metrics.volume_mm3;
        self.bbox_x_mm = bbox.x;
        self.bbox_y_mm = bbox.y;
        self.bbox_z_mm = bbox.z;
    }

    /// Files backing this record: the mask dump and the three thumbnails.
    #[must_use]
    pub fn artifact_paths(&self) -> [&PathBuf; 4] {
        [
            &self.mask_path,
            &self.thumb_axial,
            &self.thumb_sagittal,
            &self.thumb_coronal,
        ]
    }
}

/// One exported mesh file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshArtifact {
    pub id: Uuid,
    pub session_id: String,
    pub user_id: UserId,
    pub segmentation_id: Uuid,
    pub path: PathBuf,
    pub vertex_count: usize,
    pub face_count: usize,
    pub file_size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Common accessors used for ownership checks and ordering.
pub trait Record {
    fn id(&self) -> Uuid;
    fn session_id(&self) -> &str;
    fn user_id(&self) -> UserId;
    fn created_at(&self) -> DateTime<Utc>;
}

impl Record for SegmentationRecord {
    fn id(&self) -> Uuid {
        self.id
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn user_id(&self) -> UserId {
        self.user_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Record for MeshArtifact {
    fn id(&self) -> Uuid {
        self.id
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn user_id(&self) -> UserId {
        self.user_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Newest first: `created_at` descending, ties broken by id descending.
pub fn newest_first<R: Record>(a: &R, b: &R) -> Ordering {
    b.created_at()
        .cmp(&a.created_at())
        .then_with(|| b.id().cmp(&a.id()))
}

/// Generates a new time-ordered record id.
#[must_use]
pub fn new_record_id() -> Uuid {
    Uuid::now_v7()
}
