//! Calibrated scalar volumes.
//!
//! A [`Volume`] is a dense 3D array stored in `(Z, Y, X)` axis order, row-major:
//! the sample at `(z, y, x)` lives at index `(z * ny + y) * nx + x`.

use std::fmt;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{CtmeshError, Result};

/// Physical voxel spacing in millimeters, in `(dz, dy, dx)` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spacing {
    pub dz: f64,
    pub dy: f64,
    pub dx: f64,
}

impl Default for Spacing {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

impl Spacing {
    /// Creates a spacing from `(dz, dy, dx)` in millimeters.
    pub fn new(dz: f64, dy: f64, dx: f64) -> Self {
        Self { dz, dy, dx }
    }

    /// Isotropic spacing.
    pub fn uniform(d: f64) -> Self {
        Self::new(d, d, d)
    }

    /// Volume of a single voxel in cubic millimeters.
    #[must_use]
    pub fn voxel_volume(&self) -> f64 {
        self.dz * self.dy * self.dx
    }

    /// Mean of the three axis spacings.
    #[must_use]
    pub fn mean(&self) -> f64 {
        (self.dz + self.dy + self.dx) / 3.0
    }

    /// Spacing in physical `(x, y, z)` order.
    #[must_use]
    pub fn xyz(&self) -> DVec3 {
        DVec3::new(self.dx, self.dy, self.dz)
    }

    /// Spacing as a `[dz, dy, dx]` array, matching the volume axis order.
    #[must_use]
    pub fn to_array(&self) -> [f64; 3] {
        [self.dz, self.dy, self.dx]
    }
}

/// Acquisition modality of a series.
///
/// Only CT carries calibrated densities; everything else is treated as raw
/// sample values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    Ct,
    Other(String),
}

impl Modality {
    /// Parses a DICOM modality tag value (e.g. `"CT"`, `"MR"`).
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim().trim_end_matches('\0').trim();
        if tag.eq_ignore_ascii_case("CT") {
            Self::Ct
        } else {
            Self::Other(tag.to_ascii_uppercase())
        }
    }

    #[must_use]
    pub fn is_ct(&self) -> bool {
        matches!(self, Self::Ct)
    }

    /// The tag string for this modality.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Ct => "CT",
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag();
        if tag.is_empty() {
            f.write_str("unknown")
        } else {
            f.write_str(tag)
        }
    }
}

/// Converts a `(z, y, x)` coordinate to a linear index for a `[nz, ny, nx]` shape.
#[inline]
#[must_use]
pub fn linear_index(shape: [usize; 3], z: usize, y: usize, x: usize) -> usize {
    (z * shape[1] + y) * shape[2] + x
}

/// Converts a linear index back to a `(z, y, x)` coordinate.
#[inline]
#[must_use]
pub fn coords_of(shape: [usize; 3], idx: usize) -> [usize; 3] {
    let plane = shape[1] * shape[2];
    [idx / plane, (idx % plane) / shape[2], idx % shape[2]]
}

/// A dense 3D array of calibrated intensities with physical spacing.
#[derive(Debug, Clone)]
pub struct Volume {
    data: Vec<f32>,
    shape: [usize; 3],
    spacing: Spacing,
    modality: Modality,
    synthetic: bool,
    notes: Vec<String>,
}

impl Volume {
    /// Creates a volume from samples in `(Z, Y, X)` row-major order.
    ///
    /// Returns an error if any dimension is zero or the sample count does not
    /// match the shape.
    pub fn new(
        data: Vec<f32>,
        shape: [usize; 3],
        spacing: Spacing,
        modality: Modality,
    ) -> Result<Self> {
        if shape.contains(&0) {
            return Err(CtmeshError::MalformedVolume(format!(
                "zero-sized dimension in shape {shape:?}"
            )));
        }
        let expected = shape[0] * shape[1] * shape[2];
        if data.len() != expected {
            return Err(CtmeshError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            shape,
            spacing,
            modality,
            synthetic: false,
            notes: Vec::new(),
        })
    }

    /// Marks the volume as synthesized from fewer than three real slices.
    #[must_use]
    pub fn with_synthetic(mut self, synthetic: bool) -> Self {
        self.synthetic = synthetic;
        self
    }

    /// Attaches diagnostic notes gathered while assembling the volume.
    #[must_use]
    pub fn with_notes(mut self, notes: Vec<String>) -> Self {
        self.notes = notes;
        self
    }

    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Returns the shape as `[nz, ny, nx]`.
    #[must_use]
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    #[must_use]
    pub fn spacing(&self) -> Spacing {
        self.spacing
    }

    #[must_use]
    pub fn modality(&self) -> &Modality {
        &self.modality
    }

    /// True when the volume does not represent real anatomy along Z
    /// (replicated or interpolated slices).
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    #[must_use]
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Number of slices along Z.
    #[must_use]
    pub fn num_slices(&self) -> usize {
        self.shape[0]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the sample at `(z, y, x)`.
    #[must_use]
    pub fn get(&self, z: usize, y: usize, x: usize) -> f32 {
        self.data[linear_index(self.shape, z, y, x)]
    }

    /// Returns one Z slice as a row-major `ny * nx` slice.
    #[must_use]
    pub fn slice(&self, z: usize) -> &[f32] {
        let plane = self.shape[1] * self.shape[2];
        &self.data[z * plane..(z + 1) * plane]
    }

    /// Minimum and maximum finite sample values, if any.
    #[must_use]
    pub fn value_range(&self) -> Option<(f32, f32)> {
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for &v in &self.data {
            if v.is_finite() {
                min = min.min(v);
                max = max.max(v);
            }
        }
        (min <= max).then_some((min, max))
    }
}
