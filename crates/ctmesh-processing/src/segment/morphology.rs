//! Binary morphology on [`Mask`] grids.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use std::collections::VecDeque;

use ctmesh_core::{coords_of, linear_index, Mask, Spacing};

/// Face-adjacent neighbor offsets in `(z, y, x)`.
pub(crate) const FACE_OFFSETS: [[isize; 3]; 6] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
];

/// Returns `c + offset` if it lies inside `shape`.
#[inline]
pub(crate) fn offset_coord(
    shape: [usize; 3],
    c: [usize; 3],
    offset: [isize; 3],
) -> Option<[usize; 3]> {
    let mut out = [0; 3];
    for axis in 0..3 {
        let v = c[axis] as isize + offset[axis];
        if v < 0 || v >= shape[axis] as isize {
            return None;
        }
        out[axis] = v as usize;
    }
    Some(out)
}

/// Structuring element radius in voxels for a physical radius:
/// `max(1, round(radius_mm / mean spacing))`.
pub fn closing_radius_voxels(radius_mm: f64, spacing: Spacing) -> usize {
    let mean = spacing.mean();
    if !(radius_mm.is_finite() && mean.is_finite() && mean > 0.0) {
        return 1;
    }
    ((radius_mm / mean).round() as usize).max(1)
}

/// Offsets of a discrete ball: every `(dz, dy, dx)` with `dz² + dy² + dx² <= r²`.
pub fn ball_offsets(radius: usize) -> Vec<[isize; 3]> {
    let r = radius as isize;
    let r2 = r * r;
    let mut offsets = Vec::new();
    for dz in -r..=r {
        for dy in -r..=r {
            for dx in -r..=r {
                if dz * dz + dy * dy + dx * dx <= r2 {
                    offsets.push([dz, dy, dx]);
                }
            }
        }
    }
    offsets
}

/// Dilation by `element`; voxels outside the grid count as background.
///
/// Only foreground voxels with a background face neighbor are stamped: the
/// nearest foreground voxel to any newly set voxel is always one of those.
pub fn dilate(mask: &Mask, element: &[[isize; 3]]) -> Mask {
    let shape = mask.shape();
    let src = mask.data();
    let mut out = mask.clone();
    let dst = out.data_mut();

    for (idx, _) in src.iter().enumerate().filter(|(_, &v)| v) {
        let c = coords_of(shape, idx);
        let on_boundary = FACE_OFFSETS.iter().any(|&o| {
            offset_coord(shape, c, o).is_some_and(|n| !src[linear_index(shape, n[0], n[1], n[2])])
        });
        if !on_boundary {
            continue;
        }
        for &o in element {
            if let Some(n) = offset_coord(shape, c, o) {
                dst[linear_index(shape, n[0], n[1], n[2])] = true;
            }
        }
    }
    out
}

/// Erosion by a symmetric `element`; voxels outside the grid count as
/// foreground, so structures touching the border keep their border voxels.
pub fn erode(mask: &Mask, element: &[[isize; 3]]) -> Mask {
    let mut inverted = mask.clone();
    invert(&mut inverted);
    let mut out = dilate(&inverted, element);
    invert(&mut out);
    out
}

/// Morphological closing: dilation followed by erosion with the same ball.
///
/// The grid is padded with `radius` background voxels per side first, so the
/// result equals the closing of the mask in unbounded background.
pub fn closing(mask: &Mask, radius: usize) -> Mask {
    let element = ball_offsets(radius);
    let padded = pad(mask, radius);
    crop(&erode(&dilate(&padded, &element), &element), radius)
}

/// Surrounds the mask with `margin` background voxels on every side.
pub fn pad(mask: &Mask, margin: usize) -> Mask {
    let [nz, ny, nx] = mask.shape();
    let m = margin;
    Mask::from_fn([nz + 2 * m, ny + 2 * m, nx + 2 * m], |z, y, x| {
        let inside = |v: usize, n: usize| v >= m && v < n + m;
        inside(z, nz) && inside(y, ny) && inside(x, nx) && mask.get(z - m, y - m, x - m)
    })
}

/// Inverse of [`pad`]: removes `margin` voxels from every side.
pub fn crop(mask: &Mask, margin: usize) -> Mask {
    let [nz, ny, nx] = mask.shape();
    let m = margin;
    let shape = [
        nz.saturating_sub(2 * m),
        ny.saturating_sub(2 * m),
        nx.saturating_sub(2 * m),
    ];
    Mask::from_fn(shape, |z, y, x| mask.get(z + m, y + m, x + m))
}

/// Sets every background voxel that is not 6-connected to the grid border.
pub fn fill_holes(mask: &Mask) -> Mask {
    let shape = mask.shape();
    let [nz, ny, nx] = shape;
    let src = mask.data();
    let mut outside = vec![false; src.len()];
    let mut queue = VecDeque::new();

    for (idx, &v) in src.iter().enumerate() {
        if v {
            continue;
        }
        let [z, y, x] = coords_of(shape, idx);
        let on_border = z == 0 || y == 0 || x == 0 || z + 1 == nz || y + 1 == ny || x + 1 == nx;
        if on_border {
            outside[idx] = true;
            queue.push_back(idx);
        }
    }

    while let Some(idx) = queue.pop_front() {
        let c = coords_of(shape, idx);
        for &o in &FACE_OFFSETS {
            if let Some(n) = offset_coord(shape, c, o) {
                let ni = linear_index(shape, n[0], n[1], n[2]);
                if !src[ni] && !outside[ni] {
                    outside[ni] = true;
                    queue.push_back(ni);
                }
            }
        }
    }

    let mut out = mask.clone();
    for (v, &o) in out.data_mut().iter_mut().zip(&outside) {
        *v = !o;
    }
    out
}

fn invert(mask: &mut Mask) {
    for v in mask.data_mut() {
        *v = !*v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ball_sizes() {
        assert_eq!(ball_offsets(0).len(), 1);
        assert_eq!(ball_offsets(1).len(), 7);
        assert_eq!(ball_offsets(2).len(), 33);
    }

    #[test]
    fn test_closing_radius_voxels() {
        assert_eq!(closing_radius_voxels(1.5, Spacing::uniform(1.0)), 2);
        assert_eq!(closing_radius_voxels(1.5, Spacing::new(2.5, 0.5, 0.5)), 1);
        assert_eq!(closing_radius_voxels(0.1, Spacing::uniform(1.0)), 1);
        assert_eq!(closing_radius_voxels(3.0, Spacing::uniform(0.5)), 6);
    }

    #[test]
    fn test_dilate_single_voxel() {
        let mut mask = Mask::new([5, 5, 5]);
        mask.set(2, 2, 2, true);
        let out = dilate(&mask, &ball_offsets(1));
        assert_eq!(out.count(), 7);
        assert!(out.get(1, 2, 2) && out.get(2, 2, 3));
        assert!(!out.get(1, 1, 2));
    }

    #[test]
    fn test_closing_bridges_gap() {
        // Two slabs separated by a one-voxel gap along x.
        let mask = Mask::from_fn([7, 7, 9], |z, y, x| {
            (2..5).contains(&z) && (2..5).contains(&y) && (x == 2 || x == 3 || x == 5 || x == 6)
        });
        let closed = closing(&mask, 1);
        assert!(closed.get(3, 3, 4));
        for (a, b) in mask.data().iter().zip(closed.data()) {
            assert!(!a || *b, "closing must be extensive");
        }
    }

    #[test]
    fn test_closing_keeps_border_structures() {
        let mask = Mask::from_fn([4, 4, 4], |_, _, _| true);
        assert_eq!(closing(&mask, 1), mask);
    }

    #[test]
    fn test_closing_does_not_grow_toward_border() {
        // Cube one voxel away from the low faces of the grid.
        let mask = Mask::from_fn([10, 10, 10], |z, y, x| {
            (1..5).contains(&z) && (1..5).contains(&y) && (1..5).contains(&x)
        });
        assert_eq!(closing(&mask, 2), mask);
    }

    #[test]
    fn test_pad_crop_roundtrip() {
        let mask = Mask::from_fn([2, 3, 4], |z, y, x| (z + y + x) % 2 == 0);
        let padded = pad(&mask, 2);
        assert_eq!(padded.shape(), [6, 7, 8]);
        assert_eq!(padded.count(), mask.count());
        assert!(!padded.get(0, 0, 0));
        assert_eq!(crop(&padded, 2), mask);
    }

    #[test]
    fn test_fill_holes() {
        // Hollow cube shell with a cavity in the middle.
        let shell = Mask::from_fn([7, 7, 7], |z, y, x| {
            let inside = |v: usize| (1..6).contains(&v);
            let core = |v: usize| (2..5).contains(&v);
            inside(z) && inside(y) && inside(x) && !(core(z) && core(y) && core(x))
        });
        let filled = fill_holes(&shell);
        assert_eq!(filled.count(), 125);
        assert!(filled.get(3, 3, 3));
        assert!(!filled.get(0, 0, 0));
    }

    #[test]
    fn test_fill_holes_keeps_open_cavities() {
        // Cup open at the top face of the grid.
        let cup = Mask::from_fn([5, 5, 5], |z, y, x| {
            z >= 1 && (y == 0 || y == 4 || x == 0 || x == 4 || z == 1)
        });
        assert_eq!(fill_holes(&cup), cup);
    }

    proptest! {
        #[test]
        fn prop_dilate_matches_bruteforce(
            bits in proptest::collection::vec(any::<bool>(), 64),
            r in 0_usize..3,
        ) {
            let mask = Mask::from_vec(bits, [4, 4, 4]).unwrap();
            let element = ball_offsets(r);
            let fast = dilate(&mask, &element);
            let shape = mask.shape();
            let brute = Mask::from_fn(shape, |z, y, x| {
                element.iter().any(|&[dz, dy, dx]| {
                    offset_coord(shape, [z, y, x], [-dz, -dy, -dx])
                        .is_some_and(|n| mask.get(n[0], n[1], n[2]))
                })
            });
            prop_assert_eq!(fast, brute);
        }
    }
}
