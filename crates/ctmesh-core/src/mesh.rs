//! Triangle meshes in physical coordinates.

use glam::{DVec3, Vec3};

/// An indexed triangle mesh with vertices in millimeters, `(x, y, z)` order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    pub vertices: Vec<Vec3>,
    /// Faces in extraction order; no reordering or deduplication is applied.
    pub faces: Vec<[u32; 3]>,
}

impl TriangleMesh {
    pub fn new(vertices: Vec<Vec3>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// The three corner positions of face `i`.
    #[must_use]
    pub fn triangle(&self, i: usize) -> [Vec3; 3] {
        let [a, b, c] = self.faces[i];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    /// Iterates over the corner positions of every face, in face order.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        (0..self.faces.len()).map(|i| self.triangle(i))
    }

    /// Unit normal `(v2 - v1) x (v3 - v1)`, or zero for a degenerate face.
    #[must_use]
    pub fn face_normal(&self, i: usize) -> Vec3 {
        let [v1, v2, v3] = self.triangle(i);
        (v2 - v1).cross(v3 - v1).normalize_or_zero()
    }

    /// Total area: the sum over faces of half the cross-product magnitude of
    /// two edge vectors, accumulated in double precision.
    #[must_use]
    pub fn surface_area(&self) -> f64 {
        self.triangles()
            .map(|[a, b, c]| {
                let (a, b, c) = (a.as_dvec3(), b.as_dvec3(), c.as_dvec3());
                0.5 * (b - a).cross(c - a).length()
            })
            .sum()
    }

    /// Axis-aligned bounds of the vertex set.
    #[must_use]
    pub fn bounds(&self) -> Option<(DVec3, DVec3)> {
        let first = self.vertices.first()?.as_dvec3();
        Some(self.vertices.iter().fold((first, first), |(lo, hi), v| {
            let v = v.as_dvec3();
            (lo.min(v), hi.max(v))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> TriangleMesh {
        TriangleMesh::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_surface_area() {
        assert!((unit_square().surface_area() - 1.0).abs() < 1e-12);
        assert_eq!(TriangleMesh::default().surface_area(), 0.0);
    }

    #[test]
    fn test_face_normal() {
        let mesh = unit_square();
        assert_eq!(mesh.face_normal(0), Vec3::Z);
        let degenerate =
            TriangleMesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.0], vec![[0, 1, 2]]);
        assert_eq!(degenerate.face_normal(0), Vec3::ZERO);
    }

    #[test]
    fn test_bounds() {
        let (lo, hi) = unit_square().bounds().unwrap();
        assert_eq!(lo, DVec3::ZERO);
        assert_eq!(hi, DVec3::new(1.0, 1.0, 0.0));
        assert!(TriangleMesh::default().bounds().is_none());
    }
}
