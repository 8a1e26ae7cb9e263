//! Volume and bounding-box measurements of a mask.

#![allow(clippy::cast_precision_loss)]

use serde::{Deserialize, Serialize};

use crate::mask::Mask;
use crate::volume::Spacing;

/// Axis-aligned bounding box extents in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBoxMm {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Measurements derived from a segmentation mask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskMetrics {
    pub voxel_count: usize,
    pub voxel_volume_mm3: f64,
    pub volume_mm3: f64,
    /// `None` when the mask is empty.
    pub bbox_mm: Option<BoundingBoxMm>,
}

impl MaskMetrics {
    /// Bounding box extents, zero on every axis for an empty mask.
    #[must_use]
    pub fn bbox_or_zero(&self) -> BoundingBoxMm {
        self.bbox_mm.unwrap_or(BoundingBoxMm {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        })
    }
}

/// Computes voxel count, physical volume and inclusive bounding box extents.
pub fn compute_metrics(mask: &Mask, spacing: Spacing) -> MaskMetrics {
    let voxel_count = mask.count();
    let voxel_volume_mm3 = spacing.voxel_volume();
    let bbox_mm = mask.extent().map(|(min, max)| BoundingBoxMm {
        z: (max[0] - min[0] + 1) as f64 * spacing.dz,
        y: (max[1] - min[1] + 1) as f64 * spacing.dy,
        x: (max[2] - min[2] + 1) as f64 * spacing.dx,
    });

    MaskMetrics {
        voxel_count,
        voxel_volume_mm3,
        volume_mm3: voxel_count as f64 * voxel_volume_mm3,
        bbox_mm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_mask_metrics() {
        let m = compute_metrics(&Mask::new([3, 3, 3]), Spacing::new(2.0, 0.5, 0.5));
        assert_eq!(m.voxel_count, 0);
        assert_eq!(m.volume_mm3, 0.0);
        assert!(m.bbox_mm.is_none());
        assert_eq!(m.bbox_or_zero().x, 0.0);
    }

    #[test]
    fn test_cube_metrics_anisotropic() {
        // 2 slices x 3 rows x 4 columns set.
        let mask = Mask::from_fn([5, 6, 7], |z, y, x| {
            (1..3).contains(&z) && (2..5).contains(&y) && (1..5).contains(&x)
        });
        let m = compute_metrics(&mask, Spacing::new(2.0, 0.5, 0.25));
        assert_eq!(m.voxel_count, 24);
        assert!((m.voxel_volume_mm3 - 0.25).abs() < 1e-12);
        assert!((m.volume_mm3 - 6.0).abs() < 1e-12);
        let bbox = m.bbox_mm.unwrap();
        assert!((bbox.z - 4.0).abs() < 1e-12);
        assert!((bbox.y - 1.5).abs() < 1e-12);
        assert!((bbox.x - 1.0).abs() < 1e-12);
    }
}
