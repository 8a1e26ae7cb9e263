//! Modality-dependent calibration and threshold planning.
//!
//! CT series carry calibrated densities, so thresholds are expressed in
//! Hounsfield units and presets are available. Every other modality is
//! treated as raw sample values: the volume is normalized to `[0, 1]` and a
//! threshold is chosen from its histogram.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use ctmesh_core::{
    CtPreset, CtmeshError, Modality, Result, SegmentOptions, ThresholdWindow, Volume, CT_CLIP_MAX,
    CT_CLIP_MIN,
};

use crate::dicom::SliceImage;
use crate::segment::threshold::{otsu_threshold, percentile};

/// Masks smaller than this trigger the looser adaptive CT window.
pub const ADAPTIVE_ESCALATION_VOXELS: usize = 200;

/// How a threshold window was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdPolicy {
    Explicit,
    Preset(CtPreset),
    Adaptive,
    AdaptiveEscalated,
    Otsu,
    Percentile95,
}

impl ThresholdPolicy {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Preset(p) => p.name(),
            Self::Adaptive => "adaptive",
            Self::AdaptiveEscalated => "adaptive_escalated",
            Self::Otsu => "otsu",
            Self::Percentile95 => "percentile_95",
        }
    }
}

/// One entry of a threshold fallback chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdAttempt {
    pub policy: ThresholdPolicy,
    pub window: ThresholdWindow,
    /// When set, the lower bound is exclusive (`v > min`).
    pub exclusive_min: bool,
    /// The attempt is accepted when its mask holds at least this many voxels.
    /// The last attempt of a plan is always accepted.
    pub min_voxels: usize,
}

impl ThresholdAttempt {
    fn inclusive(policy: ThresholdPolicy, window: ThresholdWindow) -> Self {
        Self {
            policy,
            window,
            exclusive_min: false,
            min_voxels: 0,
        }
    }

    fn above(policy: ThresholdPolicy, min: f32, max: f32) -> Self {
        Self {
            policy,
            window: ThresholdWindow::new(min, max),
            exclusive_min: true,
            min_voxels: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn accepts(&self, value: f32) -> bool {
        let above_min = if self.exclusive_min {
            value > self.window.min
        } else {
            value >= self.window.min
        };
        above_min && value <= self.window.max
    }
}

/// The field to threshold and the ordered attempts to run on it.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdPlan {
    /// Replacement field (e.g. normalized intensities). `None` thresholds the
    /// volume samples directly.
    pub field: Option<Vec<f32>>,
    pub attempts: Vec<ThresholdAttempt>,
}

impl ThresholdPlan {
    /// Values the attempts apply to.
    #[must_use]
    pub fn values<'a>(&'a self, volume: &'a Volume) -> &'a [f32] {
        self.field.as_deref().unwrap_or_else(|| volume.data())
    }
}

/// Calibration and threshold selection for one family of modalities.
pub trait ModalityStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Converts the stored samples of a slice into calibrated intensities.
    fn calibrate(&self, slice: &SliceImage) -> Vec<f32>;

    /// Builds the threshold fallback chain for `volume`.
    fn threshold_plan(&self, volume: &Volume, options: &SegmentOptions) -> Result<ThresholdPlan>;
}

static CT_STRATEGY: CtStrategy = CtStrategy;
static RAW_STRATEGY: RawStrategy = RawStrategy;

/// Selects the strategy for a modality tag.
pub fn strategy_for(modality: &Modality) -> &'static dyn ModalityStrategy {
    if modality.is_ct() {
        &CT_STRATEGY
    } else {
        &RAW_STRATEGY
    }
}

/// Hounsfield-unit calibration with preset and adaptive windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct CtStrategy;

impl ModalityStrategy for CtStrategy {
    fn name(&self) -> &'static str {
        "ct"
    }

    fn calibrate(&self, slice: &SliceImage) -> Vec<f32> {
        let slope = slice.rescale_slope.filter(|s| s.is_finite()).unwrap_or(1.0);
        let intercept = slice
            .rescale_intercept
            .filter(|i| i.is_finite())
            .unwrap_or(0.0);
        slice
            .samples
            .iter()
            .map(|&v| {
                let hu = f64::from(v) * slope + intercept;
                (hu as f32).clamp(CT_CLIP_MIN, CT_CLIP_MAX)
            })
            .collect()
    }

    fn threshold_plan(&self, volume: &Volume, options: &SegmentOptions) -> Result<ThresholdPlan> {
        if let Some(window) = options.threshold {
            let window = window.validate()?;
            return Ok(ThresholdPlan {
                field: None,
                attempts: vec![ThresholdAttempt::inclusive(ThresholdPolicy::Explicit, window)],
            });
        }

        if let Some(name) = options.preset.as_deref() {
            let preset: CtPreset = name.parse()?;
            return Ok(ThresholdPlan {
                field: None,
                attempts: vec![ThresholdAttempt::inclusive(
                    ThresholdPolicy::Preset(preset),
                    preset.window(),
                )],
            });
        }

        let (lo, hi) = volume.value_range().unwrap_or((0.0, 0.0));
        let range = hi - lo;
        let adaptive = ThresholdWindow::new((lo + 0.35 * range).max(200.0), hi);
        let escalated = ThresholdWindow::new((lo + 0.20 * range).max(100.0), hi);
        Ok(ThresholdPlan {
            field: None,
            attempts: vec![
                ThresholdAttempt {
                    min_voxels: ADAPTIVE_ESCALATION_VOXELS,
                    ..ThresholdAttempt::inclusive(ThresholdPolicy::Adaptive, adaptive)
                },
                ThresholdAttempt::inclusive(ThresholdPolicy::AdaptiveEscalated, escalated),
            ],
        })
    }
}

/// Raw sample values with histogram-based thresholds on a normalized field.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawStrategy;

impl ModalityStrategy for RawStrategy {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn calibrate(&self, slice: &SliceImage) -> Vec<f32> {
        slice.samples.clone()
    }

    fn threshold_plan(&self, volume: &Volume, options: &SegmentOptions) -> Result<ThresholdPlan> {
        if let Some(preset) = options.preset.as_deref() {
            return Err(CtmeshError::UnknownPreset {
                preset: preset.to_string(),
                modality: volume.modality().to_string(),
            });
        }

        let normalized = normalize_percentile(volume.data());

        if let Some(window) = options.threshold {
            let window = window.validate()?;
            return Ok(ThresholdPlan {
                field: Some(normalized),
                attempts: vec![ThresholdAttempt::inclusive(ThresholdPolicy::Explicit, window)],
            });
        }

        let nonzero: Vec<f32> = normalized.iter().copied().filter(|&v| v > 0.0).collect();
        let attempt = match otsu_threshold(&nonzero, 256) {
            Some(t) => ThresholdAttempt::above(ThresholdPolicy::Otsu, t, 1.0),
            None => {
                let p95 = percentile(&normalized, 95.0).unwrap_or(1.0);
                ThresholdAttempt::above(ThresholdPolicy::Percentile95, p95, 1.0)
            }
        };
        Ok(ThresholdPlan {
            field: Some(normalized),
            attempts: vec![attempt],
        })
    }
}

/// Clips to the 1st/99th percentiles and rescales to `[0, 1]`.
///
/// A flat volume maps to all zeros.
pub fn normalize_percentile(values: &[f32]) -> Vec<f32> {
    let (Some(p1), Some(p99)) = (percentile(values, 1.0), percentile(values, 99.0)) else {
        return vec![0.0; values.len()];
    };
    let span = p99 - p1;
    if span <= f32::EPSILON {
        return vec![0.0; values.len()];
    }
    values
        .iter()
        .map(|&v| ((v.clamp(p1, p99) - p1) / span).clamp(0.0, 1.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctmesh_core::Spacing;

    fn ct_volume(data: Vec<f32>) -> Volume {
        let n = data.len();
        Volume::new(data, [1, 1, n], Spacing::default(), Modality::Ct).unwrap()
    }

    #[test]
    fn test_ct_calibration_clips() {
        let slice =
            SliceImage::new("a", 1, 3, vec![0.0, 1000.0, 9000.0]).with_rescale(1.0, -1024.0);
        let values = CtStrategy.calibrate(&slice);
        assert_eq!(values, [-1024.0, -24.0, 4000.0]);

        let bare = SliceImage::new("b", 1, 2, vec![-3000.0, 50.0]);
        assert_eq!(CtStrategy.calibrate(&bare), [-1024.0, 50.0]);
    }

    #[test]
    fn test_raw_calibration_is_identity() {
        let slice = SliceImage::new("a", 1, 2, vec![5.0, 70000.0]).with_rescale(2.0, 10.0);
        assert_eq!(RawStrategy.calibrate(&slice), [5.0, 70000.0]);
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(strategy_for(&Modality::Ct).name(), "ct");
        assert_eq!(strategy_for(&Modality::from_tag("MR")).name(), "raw");
    }

    #[test]
    fn test_ct_explicit_overrides_preset() {
        let opts = SegmentOptions::default()
            .with_preset("bone")
            .with_threshold(10.0, 20.0);
        let plan = CtStrategy.threshold_plan(&ct_volume(vec![0.0; 4]), &opts).unwrap();
        assert_eq!(plan.attempts.len(), 1);
        assert_eq!(plan.attempts[0].policy, ThresholdPolicy::Explicit);
        assert_eq!(plan.attempts[0].window, ThresholdWindow::new(10.0, 20.0));
    }

    #[test]
    fn test_ct_invalid_explicit_window() {
        let opts = SegmentOptions::default().with_threshold(20.0, 10.0);
        assert!(matches!(
            CtStrategy.threshold_plan(&ct_volume(vec![0.0; 4]), &opts),
            Err(CtmeshError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_ct_preset_and_unknown_preset() {
        let vol = ct_volume(vec![0.0; 4]);
        let plan = CtStrategy
            .threshold_plan(&vol, &SegmentOptions::default().with_preset("soft_tissue"))
            .unwrap();
        assert_eq!(plan.attempts[0].window, ThresholdWindow::new(-100.0, 300.0));

        let err = CtStrategy
            .threshold_plan(&vol, &SegmentOptions::default().with_preset("metal"))
            .unwrap_err();
        assert!(matches!(err, CtmeshError::UnknownPreset { .. }));
    }

    #[test]
    fn test_ct_adaptive_windows() {
        let plan = CtStrategy
            .threshold_plan(&ct_volume(vec![-1000.0, 0.0, 2000.0]), &SegmentOptions::default())
            .unwrap();
        assert_eq!(plan.attempts.len(), 2);
        let [adaptive, escalated] = [plan.attempts[0], plan.attempts[1]];
        assert_eq!(adaptive.policy, ThresholdPolicy::Adaptive);
        assert_eq!(adaptive.min_voxels, ADAPTIVE_ESCALATION_VOXELS);
        assert!((adaptive.window.min - 200.0).abs() < 1e-3);
        assert_eq!(adaptive.window.max, 2000.0);
        assert!((escalated.window.min - 100.0).abs() < 1e-3);

        let plan = CtStrategy
            .threshold_plan(&ct_volume(vec![0.0, 4000.0]), &SegmentOptions::default())
            .unwrap();
        assert!((plan.attempts[0].window.min - 1400.0).abs() < 1e-3);
        assert!((plan.attempts[1].window.min - 800.0).abs() < 1e-3);
    }

    #[test]
    fn test_raw_rejects_presets() {
        let vol = Volume::new(vec![1.0; 4], [1, 2, 2], Spacing::default(), Modality::from_tag("MR"))
            .unwrap();
        let err = RawStrategy
            .threshold_plan(&vol, &SegmentOptions::default().with_preset("bone"))
            .unwrap_err();
        assert!(matches!(err, CtmeshError::UnknownPreset { modality, .. } if modality == "MR"));
    }

    #[test]
    fn test_raw_otsu_plan_separates_modes() {
        // Background, a mid-intensity structure and a bright structure.
        let mut data = vec![0.0_f32; 40];
        data.extend(std::iter::repeat(100.0).take(30));
        data.extend(std::iter::repeat(200.0).take(30));
        let vol =
            Volume::new(data, [1, 10, 10], Spacing::default(), Modality::from_tag("MR")).unwrap();
        let plan = RawStrategy.threshold_plan(&vol, &SegmentOptions::default()).unwrap();
        let attempt = plan.attempts[0];
        assert_eq!(attempt.policy, ThresholdPolicy::Otsu);
        let values = plan.values(&vol);
        let selected = values.iter().filter(|&&v| attempt.accepts(v)).count();
        assert_eq!(selected, 30);
    }

    #[test]
    fn test_raw_flat_volume_falls_back_to_percentile() {
        let vol = Volume::new(
            vec![3.0; 8],
            [2, 2, 2],
            Spacing::default(),
            Modality::from_tag("MR"),
        )
        .unwrap();
        let plan = RawStrategy.threshold_plan(&vol, &SegmentOptions::default()).unwrap();
        assert_eq!(plan.attempts[0].policy, ThresholdPolicy::Percentile95);
        let values = plan.values(&vol);
        assert!(values.iter().all(|&v| !plan.attempts[0].accepts(v)));
    }

    #[test]
    fn test_normalize_percentile_range() {
        let values: Vec<f32> = (0..=100).map(|v| v as f32).collect();
        let norm = normalize_percentile(&values);
        assert_eq!(norm[0], 0.0);
        assert_eq!(norm[100], 1.0);
        assert!(norm.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(normalize_percentile(&[7.0; 5]).iter().all(|&v| v == 0.0));
    }
}
