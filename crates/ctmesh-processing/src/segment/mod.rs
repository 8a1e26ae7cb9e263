//! Threshold-and-refine segmentation of the dominant structure in a volume.
//!
//! The pipeline is fixed:
//! 1. threshold with the modality's fallback chain
//! 2. closing with a spherical element
//! 3. interior hole filling
//! 4. small-component removal, retried once at a lower floor
//! 5. keep the largest 26-connected component

pub mod components;
pub mod morphology;
pub mod threshold;

use ctmesh_core::{Mask, Result, SegmentOptions, ThresholdWindow, Volume, FALLBACK_MIN_SIZE_VOXELS};

use crate::modality::{strategy_for, ThresholdAttempt, ThresholdPolicy};

pub use components::{keep_largest_component, label_components, remove_small_components, Components};
pub use morphology::{
    ball_offsets, closing, closing_radius_voxels, crop, dilate, erode, fill_holes, pad,
};
pub use threshold::{otsu_threshold, percentile};

/// Result of one segmentation run.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub mask: Mask,
    /// Set when the final mask is empty.
    pub warning: bool,
    /// The window that produced the initial mask.
    pub window: ThresholdWindow,
    pub policy: ThresholdPolicy,
    /// Human-readable notes about fallbacks taken.
    pub notes: Vec<String>,
}

/// Segments volumes with a fixed set of options.
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    options: SegmentOptions,
}

impl Segmenter {
    pub fn new(options: SegmentOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &SegmentOptions {
        &self.options
    }

    /// Runs the full segmentation pipeline.
    ///
    /// Fails only on invalid options (unknown preset, inverted window); an
    /// empty result is reported through [`Segmentation::warning`].
    pub fn segment(&self, volume: &Volume) -> Result<Segmentation> {
        let strategy = strategy_for(volume.modality());
        let plan = strategy.threshold_plan(volume, &self.options)?;
        let values = plan.values(volume);
        let mut notes = Vec::new();

        let (attempt, mut mask) =
            run_threshold_chain(values, volume.shape(), &plan.attempts, &mut notes);
        log::debug!(
            "threshold {} {} selected {} voxels",
            attempt.policy.name(),
            attempt.window,
            mask.count()
        );

        let radius = closing_radius_voxels(self.options.closing_radius_mm, volume.spacing());
        if mask.any() {
            mask = closing(&mask, radius);
            mask = fill_holes(&mask);
            mask = remove_small_with_retry(&mask, self.options.min_size_voxels, &mut notes);
            mask = keep_largest_component(&mask);
        }

        let warning = !mask.any();
        if warning {
            notes.push("segmentation produced an empty mask".to_string());
        }
        log::debug!(
            "segmentation kept {} voxels (closing radius {radius} voxels)",
            mask.count()
        );

        Ok(Segmentation {
            mask,
            warning,
            window: attempt.window,
            policy: attempt.policy,
            notes,
        })
    }
}

/// Applies attempts in order until one selects enough voxels. The last
/// attempt is always taken.
fn run_threshold_chain(
    values: &[f32],
    shape: [usize; 3],
    attempts: &[ThresholdAttempt],
    notes: &mut Vec<String>,
) -> (ThresholdAttempt, Mask) {
    let mut last = None;
    for (i, attempt) in attempts.iter().enumerate() {
        let data: Vec<bool> = values.iter().map(|&v| attempt.accepts(v)).collect();
        let count = data.iter().filter(|&&v| v).count();
        let is_last = i + 1 == attempts.len();
        if count >= attempt.min_voxels || is_last {
            let mask = Mask::from_vec(data, shape).unwrap_or_else(|_| Mask::new(shape));
            return (*attempt, mask);
        }
        notes.push(format!(
            "{} threshold {} selected {count} voxels, below {}; trying next window",
            attempt.policy.name(),
            attempt.window,
            attempt.min_voxels
        ));
        last = Some(*attempt);
    }
    let fallback = last.unwrap_or(ThresholdAttempt {
        policy: ThresholdPolicy::Explicit,
        window: ThresholdWindow::new(f32::INFINITY, f32::INFINITY),
        exclusive_min: false,
        min_voxels: 0,
    });
    (fallback, Mask::new(shape))
}

fn remove_small_with_retry(mask: &Mask, min_size: usize, notes: &mut Vec<String>) -> Mask {
    let filtered = remove_small_components(mask, min_size);
    if filtered.any() || !mask.any() || min_size <= FALLBACK_MIN_SIZE_VOXELS {
        return filtered;
    }
    notes.push(format!(
        "no component reached {min_size} voxels; retrying with {FALLBACK_MIN_SIZE_VOXELS}"
    ));
    remove_small_components(mask, FALLBACK_MIN_SIZE_VOXELS)
}
