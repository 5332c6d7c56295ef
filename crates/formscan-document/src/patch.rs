// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Patch normalisation — turn one character cell into the fixed 28x28 input
// of the digit classifier.

use formscan_core::config::PatchConfig;
use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::{debug, instrument};

use crate::filters::{box_blur, thicken};
use crate::geometry::BoundingBox;
use crate::geometry::transform::{Affine, warp_affine};
use crate::raster::Raster;
use crate::segment::fields::{Field, cell_rect};
use crate::threshold::binarize_otsu;

/// Side of a patch in pixels.
pub const PATCH_SIDE: usize = 28;
/// Number of pixels in a patch.
pub const PATCH_LEN: usize = PATCH_SIDE * PATCH_SIDE;

/// A 28x28 grayscale character image, row-major, ink high.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch([u8; PATCH_LEN]);

impl Patch {
    /// The patch of an empty cell: no ink at all.
    pub fn blank() -> Self {
        Self([0; PATCH_LEN])
    }

    pub fn from_pixels(pixels: [u8; PATCH_LEN]) -> Self {
        Self(pixels)
    }

    fn from_raster(raster: &Raster) -> Self {
        let mut pixels = [0u8; PATCH_LEN];
        for (idx, slot) in pixels.iter_mut().enumerate() {
            let (x, y) = (idx % PATCH_SIDE, idx / PATCH_SIDE);
            *slot = raster.get(x as i64, y as i64);
        }
        Self(pixels)
    }

    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|&v| v == 0)
    }

    pub fn pixels(&self) -> &[u8; PATCH_LEN] {
        &self.0
    }

    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.0[y * PATCH_SIDE + x]
    }

    /// Grayscale image of the patch, for dumping cells to disk.
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(PATCH_SIDE as u32, PATCH_SIDE as u32, |x, y| {
            Luma([self.get(x as usize, y as usize)])
        })
    }
}

/// Zero every 8-connected component except the largest; returns its pixel
/// count (0 when the raster holds no ink).
pub fn keep_largest_component(raster: &mut Raster) -> usize {
    let labels = connected_components(raster.as_gray(), Connectivity::Eight, Luma([0u8]));
    let mut sizes: Vec<usize> = Vec::new();
    for label in labels.pixels().map(|p| p.0[0] as usize) {
        if label == 0 {
            continue;
        }
        if sizes.len() < label {
            sizes.resize(label, 0);
        }
        sizes[label - 1] += 1;
    }
    let Some((largest, &count)) = sizes.iter().enumerate().max_by_key(|&(i, &n)| (n, usize::MAX - i))
    else {
        return 0;
    };
    let keep = largest as u32 + 1;
    for (x, y, label) in labels.enumerate_pixels() {
        if label.0[0] != keep {
            raster.set(x as i64, y as i64, 0);
        }
    }
    count
}

fn ink_bounds(raster: &Raster) -> Option<BoundingBox> {
    let width = raster.width() as usize;
    BoundingBox::enclosing(
        raster
            .pixels()
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 0)
            .map(|(idx, _)| ((idx % width) as u32, (idx / width) as u32)),
    )
}

/// Builds classifier patches from segmented fields.
#[derive(Debug, Clone)]
pub struct PatchNormalizer {
    config: PatchConfig,
}

impl PatchNormalizer {
    pub fn new(config: PatchConfig) -> Self {
        Self { config }
    }

    /// Patch for slice `block` of `total_blocks` of `field`, cut from the
    /// ink image `source` with `border` pixels of margin.
    #[instrument(skip(self, field, source), fields(bounds = ?field.bounds))]
    pub fn to_patch(
        &self,
        field: &Field,
        source: &Raster,
        block: usize,
        total_blocks: usize,
        border: u32,
    ) -> Patch {
        let Some(rect) = cell_rect(&field.bounds, block, total_blocks, border) else {
            return Patch::blank();
        };
        if rect.width == 0 || rect.height == 0 {
            debug!(?rect, "Degenerate cell");
            return Patch::blank();
        }
        let cell = source.crop(rect.x, rect.y, rect.width, rect.height);
        self.normalize(cell)
    }

    /// Normalise an ink-high cell crop into a patch.
    ///
    /// Otsu-binarize, keep the largest component, squeeze onto 28x28,
    /// recenter onto the digit box, thicken, blur. A cell whose largest
    /// component covers less than `min_ink_ratio` of it is blank.
    pub fn normalize(&self, mut cell: Raster) -> Patch {
        binarize_otsu(&mut cell);
        let ink = keep_largest_component(&mut cell);
        let min_ink = cell.pixel_count() as f64 * self.config.min_ink_ratio;
        if ink == 0 || (ink as f64) < min_ink {
            debug!(ink, min_ink, "Blank cell");
            return Patch::blank();
        }

        let side = PATCH_SIDE as u32;
        let squeeze = Affine::scale_xy(
            cell.width() as f64 / PATCH_SIDE as f64,
            cell.height() as f64 / PATCH_SIDE as f64,
        );
        let squeezed = warp_affine(&cell, &squeeze, side, side);
        let Some(centered) = self.recenter(&squeezed) else {
            return Patch::blank();
        };

        let mut patch = thicken(&centered, self.config.thicken_rings);
        for _ in 0..self.config.blur_passes {
            box_blur(&mut patch, self.config.blur_radius);
        }
        Patch::from_raster(&patch)
    }

    /// Scale the ink into the digit box, centered horizontally, its bottom
    /// on the baseline row.
    pub fn recenter(&self, raster: &Raster) -> Option<Raster> {
        let bounds = ink_bounds(raster)?;
        let mut scale = (bounds.span_y() as f64 / self.config.digit_height as f64)
            .max(bounds.span_x() as f64 / self.config.digit_width as f64);
        if scale <= 0.0 {
            scale = 1.0;
        }
        let center_x = (bounds.min_x + bounds.max_x) as f64 / 2.0;
        let half = (PATCH_SIDE / 2) as f64;
        let baseline = self.config.baseline_row as f64;
        let placement = Affine::new([
            [scale, 0.0, center_x - half * scale],
            [0.0, scale, bounds.max_y as f64 - baseline * scale],
        ]);
        let side = PATCH_SIDE as u32;
        Some(warp_affine(raster, &placement, side, side))
    }
}
