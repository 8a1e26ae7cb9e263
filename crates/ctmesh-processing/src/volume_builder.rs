//! Assembly of decoded slices into a calibrated [`Volume`].

#![allow(clippy::cast_possible_truncation)]

use std::cmp::Ordering;
use std::collections::HashMap;

use ctmesh_core::{CtmeshError, Result, Spacing, Volume};

use crate::catalog::SliceCatalog;
use crate::dicom::{DicomSliceDecoder, SliceDecoder, SliceImage};
use crate::modality::strategy_for;

/// Decodes the slices of a catalog and stacks them into a volume.
#[derive(Debug, Clone, Default)]
pub struct VolumeBuilder<D = DicomSliceDecoder> {
    decoder: D,
}

impl VolumeBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: SliceDecoder> VolumeBuilder<D> {
    pub fn with_decoder(decoder: D) -> Self {
        Self { decoder }
    }

    /// Decodes every slice of `catalog`; unreadable or unsupported slices are
    /// skipped and recorded in the volume notes.
    pub fn build(&self, catalog: &SliceCatalog) -> Result<Volume> {
        let mut notes = Vec::new();
        let mut slices = Vec::with_capacity(catalog.len());
        for file in &catalog.slices {
            match self.decoder.decode(file) {
                Ok(slice) => slices.push(slice),
                Err(e) => {
                    log::warn!("session {}: skipping slice: {e}", catalog.session_id);
                    notes.push(format!("skipped: {e}"));
                }
            }
        }
        log::info!(
            "session {}: decoded {} of {} slices",
            catalog.session_id,
            slices.len(),
            catalog.len()
        );
        assemble_volume(slices, notes)
    }
}

/// Stacks decoded slices: filters to the dominant shape, orders them,
/// calibrates intensities and estimates spacing.
///
/// # Errors
/// - [`CtmeshError::InsufficientData`] if `slices` is empty
/// - [`CtmeshError::MalformedVolume`] if a slice's samples do not match its shape
pub fn assemble_volume(mut slices: Vec<SliceImage>, mut notes: Vec<String>) -> Result<Volume> {
    if slices.is_empty() {
        return Err(CtmeshError::InsufficientData(
            "no decodable slices in series".to_string(),
        ));
    }

    let (rows, cols) = dominant_shape(&slices);
    slices.retain(|s| {
        let keep = s.shape() == (rows, cols);
        if !keep {
            notes.push(format!(
                "skipped {}: shape {}x{} differs from dominant {rows}x{cols}",
                s.file_name, s.rows, s.cols
            ));
        }
        keep
    });
    if let Some(bad) = slices.iter().find(|s| s.samples.len() != rows * cols) {
        return Err(CtmeshError::MalformedVolume(format!(
            "slice {} holds {} samples for a {rows}x{cols} grid",
            bad.file_name,
            bad.samples.len()
        )));
    }

    order_slices(&mut slices);

    let first = &slices[0];
    let modality = first.modality.clone();
    let strategy = strategy_for(&modality);
    let (dy, dx) = first
        .pixel_spacing
        .filter(|&(r, c)| positive(r) && positive(c))
        .unwrap_or((1.0, 1.0));
    let dz = estimate_dz(&slices);
    let spacing = Spacing::new(dz, dy, dx);

    let mut planes: Vec<Vec<f32>> = slices.iter().map(|s| strategy.calibrate(s)).collect();
    let synthetic = planes.len() < 3;
    match planes.len() {
        1 => {
            notes.push("single slice replicated to three slices".to_string());
            let plane = planes[0].clone();
            planes.push(plane.clone());
            planes.push(plane);
        }
        2 => {
            notes.push("middle slice interpolated between two slices".to_string());
            let middle = planes[0]
                .iter()
                .zip(&planes[1])
                .map(|(&a, &b)| ((f64::from(a) + f64::from(b)) / 2.0) as f32)
                .collect();
            planes.insert(1, middle);
        }
        _ => {}
    }

    let shape = [planes.len(), rows, cols];
    let data = planes.concat();
    log::debug!(
        "assembled {} volume {shape:?} spacing ({dz}, {dy}, {dx}) mm",
        modality
    );
    Ok(Volume::new(data, shape, spacing, modality)?
        .with_synthetic(synthetic)
        .with_notes(notes))
}

/// Most common `(rows, cols)`; ties go to the larger pixel count, then the
/// lexically smaller shape.
fn dominant_shape(slices: &[SliceImage]) -> (usize, usize) {
    let mut counts: HashMap<(usize, usize), usize> = HashMap::new();
    for s in slices {
        *counts.entry(s.shape()).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(sa, ca), (sb, cb)| {
            ca.cmp(cb)
                .then((sa.0 * sa.1).cmp(&(sb.0 * sb.1)))
                .then(sb.cmp(sa))
        })
        .map_or((0, 0), |(shape, _)| shape)
}

/// Stable sort by Z position, then instance number, then file name. Slices
/// without Z follow those with one; missing instance numbers sort last.
pub fn order_slices(slices: &mut [SliceImage]) {
    slices.sort_by(compare_slices);
}

fn compare_slices(a: &SliceImage, b: &SliceImage) -> Ordering {
    let by_z = match (a.z_position, b.z_position) {
        (Some(za), Some(zb)) => za.total_cmp(&zb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    let by_instance = match (a.instance_number, b.instance_number) {
        (Some(ia), Some(ib)) => ia.cmp(&ib),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_z.then(by_instance)
        .then_with(|| a.file_name.cmp(&b.file_name))
}

/// Median of absolute consecutive Z differences, falling back to
/// SpacingBetweenSlices, SliceThickness and finally 1.0 mm.
fn estimate_dz(sorted: &[SliceImage]) -> f64 {
    let z: Vec<f64> = sorted.iter().filter_map(|s| s.z_position).collect();
    let distinct = z.windows(2).any(|w| w[0] != w[1]);
    if distinct {
        let mut diffs: Vec<f64> = z.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
        if let Some(m) = median(&mut diffs).filter(|&m| positive(m)) {
            return m;
        }
    }

    let first = &sorted[0];
    first
        .spacing_between_slices
        .map(f64::abs)
        .filter(|&v| positive(v))
        .or_else(|| first.slice_thickness.filter(|&v| positive(v)))
        .unwrap_or(1.0)
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}
