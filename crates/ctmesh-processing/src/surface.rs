//! Isosurface extraction from segmentation masks.

#![allow(clippy::cast_possible_truncation)]

use ctmesh_core::{marching_cubes, Mask, Spacing, TriangleMesh, Vec3};
use thiserror::Error;

/// Iso level separating foreground (1) from background (0).
pub const MASK_ISO_LEVEL: f32 = 0.5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("mask has no surface")]
    NoSurface,

    #[error("mask of shape {0:?} is too large to extract")]
    TooLarge([usize; 3]),
}

/// A surface mesh and its area.
#[derive(Debug, Clone)]
pub struct Surface {
    pub mesh: TriangleMesh,
    pub area_mm2: f64,
}

/// Extracts the boundary of `mask` as a triangle mesh in millimeters.
///
/// The mask is padded with one background voxel per side so structures that
/// touch the grid border produce closed surfaces. Vertex `(x, y, z)` equals the
/// voxel index scaled by `(dx, dy, dz)` in the unpadded frame.
pub fn extract_surface(mask: &Mask, spacing: Spacing) -> Result<Surface, ExtractionError> {
    if !mask.any() {
        return Err(ExtractionError::NoSurface);
    }

    let [nz, ny, nx] = mask.shape();
    let padded = [nz + 2, ny + 2, nx + 2];
    let [Some(d0), Some(d1), Some(d2)] = padded.map(|d| u32::try_from(d).ok()) else {
        return Err(ExtractionError::TooLarge(mask.shape()));
    };

    // Inside is below the iso level, so foreground maps to 0.
    let mut field = vec![1.0_f32; padded[0] * padded[1] * padded[2]];
    for z in 0..nz {
        for y in 0..ny {
            let row = ((z + 1) * padded[1] + (y + 1)) * padded[2] + 1;
            for x in 0..nx {
                if mask.get(z, y, x) {
                    field[row + x] = 0.0;
                }
            }
        }
    }

    let iso = marching_cubes(&field, MASK_ISO_LEVEL, [d0, d1, d2]);
    if iso.is_empty() {
        return Err(ExtractionError::NoSurface);
    }

    let scale = spacing.xyz().as_vec3();
    let vertices = iso
        .vertices
        .iter()
        .map(|v| (Vec3::new(v.z, v.y, v.x) - Vec3::ONE) * scale)
        .collect();
    let mesh = TriangleMesh::new(vertices, iso.triangles);
    let area_mm2 = mesh.surface_area();
    log::debug!(
        "extracted {} vertices, {} faces, area {area_mm2:.3} mm2",
        mesh.num_vertices(),
        mesh.num_faces()
    );
    Ok(Surface { mesh, area_mm2 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_mask(n: usize, lo: usize, hi: usize) -> Mask {
        let r = lo..hi;
        Mask::from_fn([n, n, n], |z, y, x| r.contains(&z) && r.contains(&y) && r.contains(&x))
    }

    #[test]
    fn test_empty_mask_has_no_surface() {
        let err = extract_surface(&Mask::new([4, 4, 4]), Spacing::default()).unwrap_err();
        assert_eq!(err, ExtractionError::NoSurface);
    }

    #[test]
    fn test_single_voxel_is_closed_octahedron() {
        let mut mask = Mask::new([3, 3, 3]);
        mask.set(1, 1, 1, true);
        let surface = extract_surface(&mask, Spacing::default()).unwrap();
        assert_eq!(surface.mesh.num_vertices(), 6);
        assert_eq!(surface.mesh.num_faces(), 8);
        // Octahedron with vertices 0.5 from the center.
        let expected = 8.0 * (3.0_f64.sqrt() / 4.0) * 0.5;
        assert!((surface.area_mm2 - expected).abs() < 1e-5);
    }

    #[test]
    fn test_border_voxels_are_closed() {
        let mask = Mask::from_fn([2, 2, 2], |_, _, _| true);
        let surface = extract_surface(&mask, Spacing::default()).unwrap();
        let (lo, hi) = surface.mesh.bounds().unwrap();
        assert!((lo.x + 0.5).abs() < 1e-6 && (hi.x - 1.5).abs() < 1e-6);
        // Every edge of a closed mesh is shared by two faces.
        let mut edges = std::collections::HashMap::new();
        for f in &surface.mesh.faces {
            for (a, b) in [(f[0], f[1]), (f[1], f[2]), (f[2], f[0])] {
                *edges.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
        assert!(edges.values().all(|&c| c == 2));
    }

    #[test]
    fn test_spacing_scales_axes() {
        let mask = cube_mask(8, 2, 6);
        let surface = extract_surface(&mask, Spacing::new(3.0, 2.0, 0.5)).unwrap();
        let (lo, hi) = surface.mesh.bounds().unwrap();
        // Voxels 2..=5 put the iso surface at indices 1.5 and 5.5 on each axis.
        assert!((lo.x - 0.75).abs() < 1e-5 && (hi.x - 2.75).abs() < 1e-5);
        assert!((lo.y - 3.0).abs() < 1e-5 && (hi.y - 11.0).abs() < 1e-5);
        assert!((lo.z - 4.5).abs() < 1e-5 && (hi.z - 16.5).abs() < 1e-5);
    }

    #[test]
    fn test_area_is_deterministic() {
        let mask = cube_mask(12, 3, 9);
        let a = extract_surface(&mask, Spacing::uniform(0.7)).unwrap();
        let b = extract_surface(&mask, Spacing::uniform(0.7)).unwrap();
        assert_eq!(a.mesh, b.mesh);
        assert_eq!(a.area_mm2.to_bits(), b.area_mm2.to_bits());
        assert!(a.area_mm2 > 0.0);
    }
}
