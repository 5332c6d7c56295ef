// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Neighbourhood filters — summed-area box blur and ring dilation.

use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

use crate::raster::Raster;

/// Prefix sums over a raster, padded with a zero row and column so that
/// `at(x, y)` is the sum of every pixel strictly above and left of `(x, y)`.
struct SummedArea {
    sums: Vec<u64>,
    stride: usize,
}

impl SummedArea {
    fn new(raster: &Raster) -> Self {
        let width = raster.width() as usize;
        let stride = width + 1;
        let mut sums = vec![0u64; stride * (raster.height() as usize + 1)];
        for (y, row) in raster.pixels().chunks_exact(width.max(1)).enumerate() {
            let mut running = 0u64;
            for (x, &value) in row.iter().enumerate() {
                running += value as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + running;
            }
        }
        Self { sums, stride }
    }

    fn at(&self, x: usize, y: usize) -> u64 {
        self.sums[y * self.stride + x]
    }

    /// Sum over the half-open box `[x0, x1) x [y0, y1)`.
    fn sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        self.at(x1, y1) + self.at(x0, y0) - self.at(x0, y1) - self.at(x1, y0)
    }
}

/// Replace every pixel by the mean of its `(2r+1)^2` neighbourhood, in place.
/// The window shrinks at the borders instead of reading padding.
pub fn box_blur(raster: &mut Raster, radius: u32) {
    if radius == 0 || raster.pixel_count() == 0 {
        return;
    }
    let table = SummedArea::new(raster);
    let (w, h) = (raster.width() as usize, raster.height() as usize);
    let r = radius as usize;
    for y in 0..h {
        let (y0, y1) = (y.saturating_sub(r), (y + r + 1).min(h));
        for x in 0..w {
            let (x0, x1) = (x.saturating_sub(r), (x + r + 1).min(w));
            let area = ((x1 - x0) * (y1 - y0)) as u64;
            let mean = table.sum(x0, y0, x1, y1) / area;
            raster.set(x as i64, y as i64, mean as u8);
        }
    }
}

/// Grow foreground by `rings` rings of 4-neighbours (L1 dilation).
pub fn thicken(raster: &Raster, rings: u8) -> Raster {
    if rings == 0 {
        return raster.clone();
    }
    Raster::from_gray(dilate(raster.as_gray(), Norm::L1, rings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_of_uniform_raster_is_identity() {
        let mut raster = Raster::filled(6, 6, 77);
        box_blur(&mut raster, 1);
        assert!(raster.pixels().iter().all(|&v| v == 77));
    }

    #[test]
    fn blur_spreads_a_single_pixel() {
        let mut raster = Raster::filled(5, 5, 0);
        raster.set(2, 2, 90);
        box_blur(&mut raster, 1);
        assert_eq!(raster.get(2, 2), 10);
        assert_eq!(raster.get(1, 1), 10);
        assert_eq!(raster.get(0, 0), 0);
        assert_eq!(raster.get(4, 4), 0);
    }

    #[test]
    fn blur_window_shrinks_at_border() {
        let mut raster = Raster::filled(3, 3, 0);
        raster.set(0, 0, 40);
        box_blur(&mut raster, 1);
        // (0,0) window is 2x2 = 4 pixels.
        assert_eq!(raster.get(0, 0), 10);
    }

    #[test]
    fn summed_area_boxes() {
        let raster = Raster::from_fn(4, 3, |x, y| (x + 4 * y) as u8);
        let table = SummedArea::new(&raster);
        assert_eq!(table.sum(0, 0, 4, 3), (0..12).sum::<u64>());
        // Pixels 5, 6, 9, 10.
        assert_eq!(table.sum(1, 1, 3, 3), 30);
        assert_eq!(table.sum(2, 2, 2, 3), 0);
    }

    #[test]
    fn thicken_adds_one_cross_ring() {
        let mut raster = Raster::filled(5, 5, 0);
        raster.set(2, 2, 255);
        let thick = thicken(&raster, 1);
        assert_eq!(thick.get(2, 1), 255);
        assert_eq!(thick.get(1, 2), 255);
        assert_eq!(thick.get(3, 2), 255);
        assert_eq!(thick.get(2, 3), 255);
        assert_eq!(thick.get(1, 1), 0);
        assert_eq!(thick.pixels().iter().filter(|&&v| v == 255).count(), 5);
    }
}
