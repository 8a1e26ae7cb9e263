//! Histogram statistics used to pick threshold windows.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

/// Linear-interpolated percentile `q` (0-100) of the finite values.
///
/// Returns `None` when there are no finite values.
pub fn percentile(values: &[f32], q: f64) -> Option<f32> {
    let mut sorted: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_unstable_by(f32::total_cmp);

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    let a = f64::from(sorted[lo]);
    let b = f64::from(sorted[hi]);
    Some((a + (b - a) * frac) as f32)
}

/// Otsu's threshold over a histogram with `bins` bins spanning the value range.
///
/// Returns the center of the last bin of the lower class; values strictly
/// above it belong to the upper class. `None` when fewer than two distinct
/// values are present.
pub fn otsu_threshold(values: &[f32], bins: usize) -> Option<f32> {
    let bins = bins.max(2);
    let (lo, hi) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f32, f32)>, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;
    if hi - lo <= f32::EPSILON * hi.abs().max(1.0) {
        return None;
    }

    let width = f64::from(hi - lo) / bins as f64;
    let mut hist = vec![0_u64; bins];
    for &v in values.iter().filter(|v| v.is_finite()) {
        let bin = ((f64::from(v - lo)) / width) as usize;
        hist[bin.min(bins - 1)] += 1;
    }

    let center = |i: usize| f64::from(lo) + (i as f64 + 0.5) * width;
    let total: u64 = hist.iter().sum();
    let total_mass: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &c)| c as f64 * center(i))
        .sum();

    let mut best = None;
    let mut best_var = f64::NEG_INFINITY;
    let mut w0 = 0_u64;
    let mut mass0 = 0.0;
    for (i, &count) in hist.iter().enumerate().take(bins - 1) {
        w0 += count;
        mass0 += count as f64 * center(i);
        let w1 = total - w0;
        if w0 == 0 || w1 == 0 {
            continue;
        }
        let mean0 = mass0 / w0 as f64;
        let mean1 = (total_mass - mass0) / w1 as f64;
        let between = w0 as f64 * w1 as f64 * (mean0 - mean1).powi(2);
        if between > best_var {
            best_var = between;
            best = Some(i);
        }
    }
    best.map(|i| center(i) as f32)
}
