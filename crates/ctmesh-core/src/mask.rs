//! Binary voxel masks.

use crate::error::{CtmeshError, Result};
use crate::volume::{coords_of, linear_index};

/// Anatomical plane used for thumbnail extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plane {
    /// Constant Z; image is `nx` wide and `ny` tall.
    Axial,
    /// Constant X; image is `ny` wide and `nz` tall.
    Sagittal,
    /// Constant Y; image is `nx` wide and `nz` tall.
    Coronal,
}

impl Plane {
    pub const ALL: [Plane; 3] = [Plane::Axial, Plane::Sagittal, Plane::Coronal];

    /// Lowercase name used in artifact file names.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Axial => "axial",
            Self::Sagittal => "sagittal",
            Self::Coronal => "coronal",
        }
    }
}

/// A dense 3D boolean array sharing the `(Z, Y, X)` layout of [`crate::Volume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    data: Vec<bool>,
    shape: [usize; 3],
}

impl Mask {
    /// Creates an all-background mask.
    pub fn new(shape: [usize; 3]) -> Self {
        Self {
            data: vec![false; shape[0] * shape[1] * shape[2]],
            shape,
        }
    }

    /// Wraps existing voxel data.
    pub fn from_vec(data: Vec<bool>, shape: [usize; 3]) -> Result<Self> {
        let expected = shape[0] * shape[1] * shape[2];
        if data.len() != expected {
            return Err(CtmeshError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, shape })
    }

    /// Builds a mask by evaluating `f(z, y, x)` for every voxel.
    pub fn from_fn(shape: [usize; 3], mut f: impl FnMut(usize, usize, usize) -> bool) -> Self {
        let mut data = Vec::with_capacity(shape[0] * shape[1] * shape[2]);
        for z in 0..shape[0] {
            for y in 0..shape[1] {
                for x in 0..shape[2] {
                    data.push(f(z, y, x));
                }
            }
        }
        Self { data, shape }
    }

    /// Returns the shape as `[nz, ny, nx]`.
    #[must_use]
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    #[must_use]
    pub fn data(&self) -> &[bool] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [bool] {
        &mut self.data
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<bool> {
        self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn get(&self, z: usize, y: usize, x: usize) -> bool {
        self.data[linear_index(self.shape, z, y, x)]
    }

    pub fn set(&mut self, z: usize, y: usize, x: usize, value: bool) {
        let idx = linear_index(self.shape, z, y, x);
        self.data[idx] = value;
    }

    /// Number of foreground voxels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// True when at least one voxel is set.
    #[must_use]
    pub fn any(&self) -> bool {
        self.data.iter().any(|&v| v)
    }

    /// Inclusive `(min, max)` voxel extents over foreground voxels, in `(z, y, x)`.
    #[must_use]
    pub fn extent(&self) -> Option<([usize; 3], [usize; 3])> {
        let mut min = [usize::MAX; 3];
        let mut max = [0_usize; 3];
        let mut found = false;
        for (idx, _) in self.data.iter().enumerate().filter(|(_, &v)| v) {
            let c = coords_of(self.shape, idx);
            for axis in 0..3 {
                min[axis] = min[axis].min(c[axis]);
                max[axis] = max[axis].max(c[axis]);
            }
            found = true;
        }
        found.then_some((min, max))
    }

    /// Extracts the middle slice along `plane` as 0/255 grayscale pixels.
    ///
    /// Returns `(width, height, pixels)` with pixels in row-major order.
    #[must_use]
    pub fn middle_slice(&self, plane: Plane) -> (usize, usize, Vec<u8>) {
        let [nz, ny, nx] = self.shape;
        let px = |v: bool| if v { 255_u8 } else { 0 };
        match plane {
            Plane::Axial => {
                let z = nz / 2;
                let pixels = (0..ny)
                    .flat_map(|y| (0..nx).map(move |x| (y, x)))
                    .map(|(y, x)| px(self.get(z, y, x)))
                    .collect();
                (nx, ny, pixels)
            }
            Plane::Sagittal => {
                let x = nx / 2;
                let pixels = (0..nz)
                    .flat_map(|z| (0..ny).map(move |y| (z, y)))
                    .map(|(z, y)| px(self.get(z, y, x)))
                    .collect();
                (ny, nz, pixels)
            }
            Plane::Coronal => {
                let y = ny / 2;
                let pixels = (0..nz)
                    .flat_map(|z| (0..nx).map(move |x| (z, x)))
                    .map(|(z, x)| px(self.get(z, y, x)))
                    .collect();
                (nx, nz, pixels)
            }
        }
    }
}
