// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster — a grayscale pixel buffer with bounds-tolerant reads. Thin wrapper
// over `image::GrayImage`; colour inputs are converted to luma on entry.

use formscan_core::error::Result;
use image::{DynamicImage, GrayImage, Luma};
use tracing::{debug, info, instrument};

/// Grayscale page or cell image owned by one pipeline stage at a time.
///
/// Transforms produce a new `Raster`; only the explicit in-place steps
/// (binarization, inversion, smoothing) mutate the buffer they own.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    image: GrayImage,
}

impl Raster {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path (JPEG, PNG, TIFF, ...).
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let img = image::open(path.as_ref())?;
        info!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self::from_dynamic(&img))
    }

    /// Decode raw encoded bytes.
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self::from_dynamic(&img))
    }

    /// Convert any decoded image to grayscale.
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self {
            image: image.to_luma8(),
        }
    }

    /// Wrap an existing grayscale buffer.
    pub fn from_gray(image: GrayImage) -> Self {
        Self { image }
    }

    /// A raster filled with a single intensity.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            image: GrayImage::from_pixel(width, height, Luma([value])),
        }
    }

    /// Build a raster by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> u8) -> Self {
        Self {
            image: GrayImage::from_fn(width, height, |x, y| Luma([f(x, y)])),
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel_count(&self) -> u64 {
        self.image.width() as u64 * self.image.height() as u64
    }

    /// Row-major pixel slice, index `y * width + x`.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.image
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width() as i64 && y < self.height() as i64
    }

    /// Read a pixel; anything outside the buffer is background (0).
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> u8 {
        if self.contains(x, y) {
            self.image.as_raw()[y as usize * self.width() as usize + x as usize]
        } else {
            0
        }
    }

    /// Write a pixel; writes outside the buffer are ignored.
    #[inline]
    pub fn set(&mut self, x: i64, y: i64, value: u8) {
        if self.contains(x, y) {
            let idx = y as usize * self.width() as usize + x as usize;
            let raw: &mut [u8] = &mut self.image;
            raw[idx] = value;
        }
    }

    /// 256-bucket intensity histogram.
    pub fn histogram(&self) -> [u64; 256] {
        let mut histogram = [0u64; 256];
        for &value in self.image.as_raw() {
            histogram[value as usize] += 1;
        }
        histogram
    }

    pub fn mean(&self) -> f64 {
        let count = self.pixel_count();
        if count == 0 {
            return 0.0;
        }
        let sum: u64 = self.image.as_raw().iter().map(|&v| v as u64).sum();
        sum as f64 / count as f64
    }

    // -- Transformations ------------------------------------------------------

    /// Copy a rectangle into a new raster. Regions outside the source read as
    /// background.
    pub fn crop(&self, x: i64, y: i64, width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |dx, dy| {
            self.get(x + dx as i64, y + dy as i64)
        })
    }

    /// Place this raster at the top-left of a larger background canvas.
    pub fn paste_onto(&self, width: u32, height: u32) -> Self {
        self.crop(0, 0, width, height)
    }

    /// Swap ink and paper: `v -> 255 - v`, in place.
    pub fn invert(&mut self) {
        let raw: &mut [u8] = &mut self.image;
        for value in raw.iter_mut() {
            *value = 255 - *value;
        }
    }

    /// Apply `f` to every pixel in place.
    pub fn map_in_place(&mut self, f: impl Fn(u8) -> u8) {
        let raw: &mut [u8] = &mut self.image;
        for value in raw.iter_mut() {
            *value = f(*value);
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Write the raster to a file. The format is inferred from the extension.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        self.image.save(path.as_ref())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn out_of_bounds_reads_are_background() {
        let raster = Raster::filled(4, 3, 200);
        assert_eq!(raster.get(0, 0), 200);
        assert_eq!(raster.get(-1, 0), 0);
        assert_eq!(raster.get(4, 0), 0);
        assert_eq!(raster.get(0, 3), 0);
    }

    #[test]
    fn set_ignores_out_of_bounds() {
        let mut raster = Raster::filled(2, 2, 0);
        raster.set(5, 5, 255);
        raster.set(1, 1, 255);
        assert_eq!(raster.pixels(), &[0, 0, 0, 255]);
    }

    #[test]
    fn rgb_input_becomes_grayscale() {
        let rgb = RgbImage::from_pixel(3, 3, Rgb([255, 255, 255]));
        let raster = Raster::from_dynamic(&DynamicImage::ImageRgb8(rgb));
        assert_eq!(raster.width(), 3);
        assert!(raster.pixels().iter().all(|&v| v == 255));
    }

    #[test]
    fn crop_pads_with_background() {
        let raster = Raster::from_fn(4, 4, |x, y| (x + 10 * y) as u8);
        let cropped = raster.crop(2, 2, 3, 3);
        assert_eq!(cropped.get(0, 0), 22);
        assert_eq!(cropped.get(1, 1), 33);
        assert_eq!(cropped.get(2, 2), 0);
    }

    #[test]
    fn invert_and_histogram() {
        let mut raster = Raster::from_fn(2, 1, |x, _| if x == 0 { 0 } else { 10 });
        raster.invert();
        let histogram = raster.histogram();
        assert_eq!(histogram[255], 1);
        assert_eq!(histogram[245], 1);
        assert!((raster.mean() - 250.0).abs() < 1e-9);
    }

    #[test]
    fn save_and_reopen_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        let raster = Raster::from_fn(5, 4, |x, y| (x * 40 + y) as u8);
        raster.save(&path).unwrap();
        assert_eq!(Raster::open(&path).unwrap(), raster);
    }
}
