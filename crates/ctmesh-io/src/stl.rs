//! STL (Stereolithography) serialization.
//!
//! # Binary Format
//!
//! ```text
//! UINT8[80]    – Header (ASCII name, space padded)
//! UINT32       – Number of triangles
//! foreach triangle
//!     REAL32[3] – Normal vector (always zero)
//!     REAL32[3] – Vertex 1
//!     REAL32[3] – Vertex 2
//!     REAL32[3] – Vertex 3
//!     UINT16    – Attribute byte count (0)
//! end
//! ```
//!
//! A binary file with `N` triangles is exactly `84 + 50 * N` bytes. Slicers
//! recompute normals from the winding, so the binary writer leaves them zero.
//!
//! # ASCII Format
//!
//! ```text
//! solid name
//!   facet normal ni nj nk
//!     outer loop
//!       vertex v1x v1y v1z
//!       vertex v2x v2y v2z
//!       vertex v3x v3y v3z
//!     endloop
//!   endfacet
//!   ...
//! endsolid name
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ctmesh_core::{Result, TriangleMesh, Vec3};
use serde::{Deserialize, Serialize};

/// STL binary header size in bytes.
pub const HEADER_SIZE: usize = 80;

/// Size of one triangle in binary STL (normal + 3 vertices + attribute).
pub const TRIANGLE_SIZE: usize = 50;

/// Output encoding of an STL file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StlFormat {
    #[default]
    Binary,
    Ascii,
}

/// Size in bytes of a binary STL holding `triangles` facets.
#[must_use]
pub fn binary_stl_size(triangles: usize) -> u64 {
    (HEADER_SIZE + 4 + TRIANGLE_SIZE * triangles) as u64
}

/// Restricts a solid name to printable ASCII on a single line.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .collect()
}

/// The 80-byte header: the sanitized name, truncated and space padded.
#[must_use]
pub fn binary_header(name: &str) -> [u8; HEADER_SIZE] {
    let mut header = [b' '; HEADER_SIZE];
    let name = sanitize_name(name);
    let len = name.len().min(HEADER_SIZE);
    header[..len].copy_from_slice(&name.as_bytes()[..len]);
    header
}

/// Writes `mesh` as binary STL with zero normals, faces in mesh order.
pub fn write_binary_stl<W: Write>(
    mesh: &TriangleMesh,
    name: &str,
    mut writer: W,
) -> std::io::Result<()> {
    writer.write_all(&binary_header(name))?;

    let face_count = u32::try_from(mesh.num_faces()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "mesh has more than u32::MAX faces",
        )
    })?;
    writer.write_all(&face_count.to_le_bytes())?;

    let mut record = [0_u8; TRIANGLE_SIZE];
    for tri in mesh.triangles() {
        // Normal bytes 0..12 stay zero; attribute bytes 48..50 stay zero.
        for (slot, v) in tri.iter().enumerate() {
            let offset = 12 + slot * 12;
            write_vertex(&mut record[offset..offset + 12], *v);
        }
        writer.write_all(&record)?;
    }
    writer.flush()
}

fn write_vertex(buf: &mut [u8], v: Vec3) {
    buf[0..4].copy_from_slice(&v.x.to_le_bytes());
    buf[4..8].copy_from_slice(&v.y.to_le_bytes());
    buf[8..12].copy_from_slice(&v.z.to_le_bytes());
}

/// Writes `mesh` as ASCII STL with unit facet normals.
pub fn write_ascii_stl<W: Write>(
    mesh: &TriangleMesh,
    name: &str,
    mut writer: W,
) -> std::io::Result<()> {
    let name = sanitize_name(name);
    writeln!(writer, "solid {name}")?;

    for (i, tri) in mesh.triangles().enumerate() {
        let n = mesh.face_normal(i);
        writeln!(writer, "  facet normal {:.6e} {:.6e} {:.6e}", n.x, n.y, n.z)?;
        writeln!(writer, "    outer loop")?;
        for v in tri {
            writeln!(writer, "      vertex {:.6e} {:.6e} {:.6e}", v.x, v.y, v.z)?;
        }
        writeln!(writer, "    endloop")?;
        writeln!(writer, "  endfacet")?;
    }

    writeln!(writer, "endsolid {name}")?;
    writer.flush()
}

/// Writes `mesh` in the requested format.
pub fn write_stl<W: Write>(
    mesh: &TriangleMesh,
    name: &str,
    format: StlFormat,
    writer: W,
) -> std::io::Result<()> {
    match format {
        StlFormat::Binary => write_binary_stl(mesh, name, writer),
        StlFormat::Ascii => write_ascii_stl(mesh, name, writer),
    }
}

/// Saves `mesh` to `path` and returns the file size in bytes.
pub fn save_stl<P: AsRef<Path>>(
    path: P,
    mesh: &TriangleMesh,
    name: &str,
    format: StlFormat,
) -> Result<u64> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_stl(mesh, name, format, BufWriter::new(file))?;
    let size = std::fs::metadata(path)?.len();
    log::debug!(
        "wrote {} faces to {} ({size} bytes, {format:?})",
        mesh.num_faces(),
        path.display()
    );
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles() -> TriangleMesh {
        TriangleMesh::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.0, 0.0, 2.5),
            ],
            vec![[0, 1, 2], [0, 3, 1]],
        )
    }

    #[test]
    fn test_binary_layout() {
        let mesh = two_triangles();
        let mut buf = Vec::new();
        write_binary_stl(&mesh, "seg_7", &mut buf).unwrap();

        assert_eq!(buf.len() as u64, binary_stl_size(2));
        assert_eq!(&buf[..5], b"seg_7");
        assert!(buf[5..80].iter().all(|&b| b == b' '));
        assert_eq!(u32::from_le_bytes([buf[80], buf[81], buf[82], buf[83]]), 2);

        let second = &buf[84 + 50..84 + 100];
        assert!(second[..12].iter().all(|&b| b == 0), "normals are zero");
        let z = f32::from_le_bytes([second[32], second[33], second[34], second[35]]);
        assert_eq!(z, 2.5, "second vertex of face 1 is (0, 0, 2.5)");
        assert_eq!(&second[48..50], &[0, 0]);
    }

    #[test]
    fn test_binary_empty_mesh() {
        let mut buf = Vec::new();
        write_binary_stl(&TriangleMesh::default(), "empty", &mut buf).unwrap();
        assert_eq!(buf.len(), 84);
        assert_eq!(&buf[80..84], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_header_truncation_and_sanitizing() {
        let long = "x".repeat(100);
        assert_eq!(binary_header(&long), [b'x'; HEADER_SIZE]);
        let header = binary_header("crâne\n1");
        assert_eq!(&header[..7], b"cr_ne_1");
    }

    #[test]
    fn test_ascii_structure() {
        let mut buf = Vec::new();
        write_ascii_stl(&two_triangles(), "part", &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().map(str::trim).collect();

        assert_eq!(lines.first(), Some(&"solid part"));
        assert_eq!(lines.last(), Some(&"endsolid part"));
        assert_eq!(lines.iter().filter(|l| l.starts_with("facet normal")).count(), 2);
        assert_eq!(lines.iter().filter(|l| **l == "endfacet").count(), 2);
        assert_eq!(lines.iter().filter(|l| l.starts_with("vertex")).count(), 6);
        assert_eq!(lines[1], "facet normal 0.000000e0 0.000000e0 1.000000e0");
    }

    #[test]
    fn test_ascii_empty_mesh() {
        let mut buf = Vec::new();
        write_ascii_stl(&TriangleMesh::default(), "none", &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "solid none\nendsolid none\n");
    }

    #[test]
    fn test_save_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mesh.stl");
        let size = save_stl(&path, &two_triangles(), "m", StlFormat::Binary).unwrap();
        assert_eq!(size, 184);
        assert_eq!(std::fs::read(&path).unwrap().len(), 184);
    }

    #[test]
    fn test_format_serde_names() {
        assert_eq!(serde_json::to_string(&StlFormat::Ascii).unwrap(), "\"ascii\"");
        assert_eq!(StlFormat::default(), StlFormat::Binary);
    }
}
