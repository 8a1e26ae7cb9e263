//! 26-connected component labeling and filtering.

use std::collections::VecDeque;

use ctmesh_core::{coords_of, linear_index, Mask};

use super::morphology::offset_coord;

/// All 26 neighbor offsets of a voxel.
fn neighbor_offsets() -> Vec<[isize; 3]> {
    let mut offsets = Vec::with_capacity(26);
    for dz in -1..=1 {
        for dy in -1..=1 {
            for dx in -1..=1 {
                if (dz, dy, dx) != (0, 0, 0) {
                    offsets.push([dz, dy, dx]);
                }
            }
        }
    }
    offsets
}

/// Labeled connected components of a mask.
#[derive(Debug, Clone)]
pub struct Components {
    /// Label per voxel; 0 is background, components are numbered from 1 in
    /// order of their first voxel's linear index.
    pub labels: Vec<u32>,
    /// `sizes[label - 1]` is the voxel count of `label`.
    pub sizes: Vec<usize>,
}

impl Components {
    #[must_use]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Label of the largest component; ties go to the lowest label.
    #[must_use]
    pub fn largest(&self) -> Option<u32> {
        let mut best: Option<(u32, usize)> = None;
        for (i, &size) in self.sizes.iter().enumerate() {
            if best.map_or(true, |(_, s)| size > s) {
                best = Some((label_of(i), size));
            }
        }
        best.map(|(label, _)| label)
    }
}

fn label_of(i: usize) -> u32 {
    u32::try_from(i + 1).unwrap_or(u32::MAX)
}

/// Labels 26-connected foreground components.
pub fn label_components(mask: &Mask) -> Components {
    let shape = mask.shape();
    let src = mask.data();
    let offsets = neighbor_offsets();
    let mut labels = vec![0_u32; src.len()];
    let mut sizes = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..src.len() {
        if !src[start] || labels[start] != 0 {
            continue;
        }
        let label = label_of(sizes.len());
        labels[start] = label;
        queue.push_back(start);
        let mut size = 0;

        while let Some(idx) = queue.pop_front() {
            size += 1;
            let c = coords_of(shape, idx);
            for &o in &offsets {
                if let Some(n) = offset_coord(shape, c, o) {
                    let ni = linear_index(shape, n[0], n[1], n[2]);
                    if src[ni] && labels[ni] == 0 {
                        labels[ni] = label;
                        queue.push_back(ni);
                    }
                }
            }
        }
        sizes.push(size);
    }

    Components { labels, sizes }
}

/// Drops components with fewer than `min_size` voxels.
pub fn remove_small_components(mask: &Mask, min_size: usize) -> Mask {
    let comps = label_components(mask);
    let mut out = mask.clone();
    for (v, &label) in out.data_mut().iter_mut().zip(&comps.labels) {
        *v = label != 0 && comps.sizes[label as usize - 1] >= min_size;
    }
    out
}

/// Keeps only the largest component. An empty mask stays empty.
pub fn keep_largest_component(mask: &Mask) -> Mask {
    let comps = label_components(mask);
    let mut out = Mask::new(mask.shape());
    if let Some(largest) = comps.largest() {
        for (v, &label) in out.data_mut().iter_mut().zip(&comps.labels) {
            *v = label == largest;
        }
    }
    out
}
