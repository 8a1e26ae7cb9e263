//! Segmentation options and threshold presets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CtmeshError, Result};

/// Default minimum connected-component size in voxels.
pub const DEFAULT_MIN_SIZE_VOXELS: usize = 2000;

/// Reduced component floor used when the default floor empties the mask.
pub const FALLBACK_MIN_SIZE_VOXELS: usize = 100;

/// Default closing radius in millimeters.
pub const DEFAULT_CLOSING_RADIUS_MM: f64 = 1.5;

/// Lower and upper CT clip bounds applied after rescale.
pub const CT_CLIP_MIN: f32 = -1024.0;
pub const CT_CLIP_MAX: f32 = 4000.0;

/// An inclusive intensity window `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdWindow {
    pub min: f32,
    pub max: f32,
}

impl ThresholdWindow {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Validates that both bounds are finite and ordered.
    pub fn validate(self) -> Result<Self> {
        if self.min.is_finite() && self.max.is_finite() && self.min <= self.max {
            Ok(self)
        } else {
            Err(CtmeshError::InvalidThreshold {
                min: self.min,
                max: self.max,
            })
        }
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

impl fmt::Display for ThresholdWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Named CT density windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtPreset {
    /// Cortical and trabecular bone.
    Bone,
    /// Muscle, fat and organs.
    SoftTissue,
    /// Air-filled structures (airways, sinuses).
    LowDensity,
}

impl CtPreset {
    pub const ALL: [CtPreset; 3] = [CtPreset::Bone, CtPreset::SoftTissue, CtPreset::LowDensity];

    /// Density window in Hounsfield units.
    #[must_use]
    pub fn window(self) -> ThresholdWindow {
        match self {
            Self::Bone => ThresholdWindow::new(300.0, 3000.0),
            Self::SoftTissue => ThresholdWindow::new(-100.0, 300.0),
            Self::LowDensity => ThresholdWindow::new(-1000.0, -300.0),
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bone => "bone",
            Self::SoftTissue => "soft_tissue",
            Self::LowDensity => "low_density",
        }
    }
}

impl FromStr for CtPreset {
    type Err = CtmeshError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|p| p.name() == normalized)
            .ok_or_else(|| CtmeshError::UnknownPreset {
                preset: s.to_string(),
                modality: "CT".to_string(),
            })
    }
}

/// User-facing segmentation configuration. All fields are optional in
/// serialized form and fall back to the documented defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentOptions {
    /// Named preset (CT only).
    pub preset: Option<String>,

    /// Explicit threshold window; overrides any preset.
    pub threshold: Option<ThresholdWindow>,

    /// Connected components smaller than this are discarded.
    pub min_size_voxels: usize,

    /// Radius of the spherical closing element in millimeters.
    pub closing_radius_mm: f64,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            preset: None,
            threshold: None,
            min_size_voxels: DEFAULT_MIN_SIZE_VOXELS,
            closing_radius_mm: DEFAULT_CLOSING_RADIUS_MM,
        }
    }
}

impl SegmentOptions {
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    pub fn with_threshold(mut self, min: f32, max: f32) -> Self {
        self.threshold = Some(ThresholdWindow::new(min, max));
        self
    }

    pub fn with_min_size(mut self, voxels: usize) -> Self {
        self.min_size_voxels = voxels;
        self
    }

    pub fn with_closing_radius(mut self, radius_mm: f64) -> Self {
        self.closing_radius_mm = radius_mm;
        self
    }
}
