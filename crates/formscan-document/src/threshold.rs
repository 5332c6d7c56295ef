// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Global thresholding — Otsu's between-class variance maximisation and the
// two-level contrast split used before marker detection.

use tracing::{debug, instrument};

use crate::raster::Raster;

/// Compute the Otsu threshold for a 256-bucket histogram.
///
/// For each split `t` the pixels `<= t` form the dark class and the rest the
/// light class; the split maximising `Wb * Ww * (uw - ub)^2` wins. A split
/// leaving either class empty has an undefined mean and is never selected.
/// Ties keep the lowest index. Returns 0 when no split is defined (a
/// single-valued image).
pub fn compute_threshold(histogram: &[u64; 256]) -> u8 {
    // Prefix sums of counts and of count * intensity.
    let mut count_prefix = [0u64; 256];
    let mut mass_prefix = [0f64; 256];
    let mut count_acc = 0u64;
    let mut mass_acc = 0f64;
    for (i, &count) in histogram.iter().enumerate() {
        count_acc += count;
        mass_acc += i as f64 * count as f64;
        count_prefix[i] = count_acc;
        mass_prefix[i] = mass_acc;
    }

    let total = count_acc as f64;
    if total == 0.0 {
        return 0;
    }
    let total_mass = mass_acc;

    let mut best_variance = 0.0f64;
    let mut best_threshold = 0u8;

    for t in 0..255usize {
        let dark = count_prefix[t] as f64;
        let light = total - dark;
        if dark == 0.0 || light == 0.0 {
            continue;
        }

        let weight_dark = dark / total;
        let weight_light = light / total;
        let mean_dark = mass_prefix[t] / dark;
        let mean_light = (total_mass - mass_prefix[t]) / light;

        let between = weight_dark * weight_light * (mean_light - mean_dark).powi(2);
        if between > best_variance {
            best_variance = between;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

/// Set every pixel to 0 (`<= threshold`) or 255, in place.
pub fn binarize(raster: &mut Raster, threshold: u8) {
    raster.map_in_place(|v| if v <= threshold { 0 } else { 255 });
}

/// Otsu-binarize a raster in place and return the threshold used.
#[instrument(skip(raster), fields(width = raster.width(), height = raster.height()))]
pub fn binarize_otsu(raster: &mut Raster) -> u8 {
    let threshold = compute_threshold(&raster.histogram());
    debug!(threshold, "Otsu threshold computed");
    binarize(raster, threshold);
    threshold
}

/// Push every pixel to pure black or white around a size-normalised
/// midpoint: `max(mean / 2, floor)`. Pixels strictly darker than the split
/// become 0, the rest 255.
#[instrument(skip(raster), fields(width = raster.width(), height = raster.height()))]
pub fn enhance_contrast(raster: &mut Raster, floor: u8) -> u8 {
    let split = ((raster.mean() as u32 / 2) as u8).max(floor);
    debug!(split, "Contrast split computed");
    raster.map_in_place(|v| if v < split { 0 } else { 255 });
    split
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bimodal() -> Raster {
        Raster::from_fn(20, 10, |x, _| if x < 8 { 30 } else { 210 })
    }

    #[test]
    fn separates_two_modes() {
        let raster = bimodal();
        let t = compute_threshold(&raster.histogram());
        assert!((30..210).contains(&t), "threshold {t} should split the modes");
    }

    #[test]
    fn otsu_is_idempotent_on_binary_images() {
        let mut once = bimodal();
        binarize_otsu(&mut once);
        let mut twice = once.clone();
        binarize_otsu(&mut twice);
        assert_eq!(once, twice);
        assert!(once.pixels().iter().all(|&v| v == 0 || v == 255));
    }

    #[test]
    fn uniform_images_have_no_defined_split() {
        let mut black = Raster::filled(5, 5, 0);
        assert_eq!(binarize_otsu(&mut black), 0);
        assert!(black.pixels().iter().all(|&v| v == 0));

        let mut white = Raster::filled(5, 5, 255);
        assert_eq!(binarize_otsu(&mut white), 0);
        assert!(white.pixels().iter().all(|&v| v == 255));
    }

    #[test]
    fn empty_histogram_returns_zero() {
        assert_eq!(compute_threshold(&[0u64; 256]), 0);
    }

    #[test]
    fn agrees_with_imageproc_on_a_gradient() {
        let raster = Raster::from_fn(64, 16, |x, y| ((x * 3 + y * 5) % 256) as u8);
        let ours = compute_threshold(&raster.histogram()) as i32;
        let reference = imageproc::contrast::otsu_level(raster.as_gray()) as i32;
        // imageproc reports the first level of the light class.
        assert!((ours - reference).abs() <= 1, "ours {ours}, imageproc {reference}");
    }

    #[test]
    fn contrast_split_respects_floor() {
        // Mean 128 -> mean / 2 = 64 < floor 100.
        let mut raster = Raster::from_fn(2, 1, |x, _| if x == 0 { 90 } else { 166 });
        let split = enhance_contrast(&mut raster, 100);
        assert_eq!(split, 100);
        assert_eq!(raster.pixels(), &[0, 255]);
    }
}
