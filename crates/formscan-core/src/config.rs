// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration. Every tuning constant of the rectification and
// segmentation pipeline lives here so that alternative sheet layouts are a
// config change rather than a parallel code path.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FormscanError, Result};

/// Settings for the adaptive flood-fill labeler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelingConfig {
    /// Maximum distance between a neighbour's intensity and the running mean
    /// of the component for the neighbour to join.
    pub tolerance: f64,
    /// Number of times a pixel must be offered by members of a grown
    /// component before it is admitted. Empirically tuned.
    pub capacity: u32,
    /// Component size below which the capacity rule does not apply.
    pub min_component_size: usize,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            tolerance: 10.0,
            capacity: 2,
            min_component_size: 50,
        }
    }
}

/// Calibration marker detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Lowest allowed black/white split for contrast enhancement; the split
    /// is `max(mean / 2, contrast_floor)`.
    pub contrast_floor: u8,
    /// Components larger than this fraction of the image are page regions,
    /// not markers.
    pub max_area_fraction: f64,
    /// Relative tolerance between a component's pixel count and the square
    /// of its bounding-box diameter.
    pub squareness_tolerance: f64,
    pub labeling: LabelingConfig,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            contrast_floor: 100,
            max_area_fraction: 0.01,
            squareness_tolerance: 0.3,
            labeling: LabelingConfig::default(),
        }
    }
}

/// Geometric rectification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyConfig {
    /// Foreshortening per unit of leg-angle cosine in the fixed-form
    /// perspective matrix.
    pub perspective_factor: f64,
}

impl Default for RectifyConfig {
    fn default() -> Self {
        Self {
            perspective_factor: 0.003,
        }
    }
}

/// Constants for one family of fields (header or answer boxes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldLayout {
    /// Character cells per field.
    pub blocks: usize,
    /// Border margin, as a fraction of the page pixel count, trimmed from
    /// every cell to exclude the box's own ink.
    pub border_fraction: f64,
    /// Minimum merged bounding-box area, as a fraction of the page pixel
    /// count, for a group to count as a field.
    pub min_field_fraction: f64,
    /// Horizontal merge reach is `width / kernel_x_divisor`.
    pub kernel_x_divisor: f64,
    /// Vertical merge history is `height / kernel_y_divisor` rows.
    pub kernel_y_divisor: f64,
}

impl FieldLayout {
    /// Layout of the dense identifying boxes.
    pub fn header() -> Self {
        Self {
            blocks: 4,
            border_fraction: 0.000_01,
            min_field_fraction: 0.004,
            kernel_x_divisor: 120.0,
            kernel_y_divisor: 140.0,
        }
    }

    /// Layout of the answer grid.
    pub fn answers() -> Self {
        Self {
            blocks: 8,
            border_fraction: 0.000_003,
            min_field_fraction: 0.01,
            kernel_x_divisor: 85.0,
            kernel_y_divisor: 100.0,
        }
    }

    /// Horizontal merge reach in pixels for a page of the given width.
    pub fn kernel_x(&self, width: u32) -> usize {
        ((width as f64 / self.kernel_x_divisor) as usize).max(1)
    }

    /// Vertical merge history in rows for a page of the given height.
    pub fn kernel_y(&self, height: u32) -> usize {
        ((height as f64 / self.kernel_y_divisor) as usize).max(1)
    }

    /// Border margin in pixels for a page of `pixel_count` pixels.
    pub fn border(&self, pixel_count: u64) -> u32 {
        (pixel_count as f64 * self.border_fraction) as u32
    }

    /// Minimum field area in pixels for a page of `pixel_count` pixels.
    pub fn min_field_area(&self, pixel_count: u64) -> u64 {
        (pixel_count as f64 * self.min_field_fraction) as u64
    }
}

/// Field segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Pixels at or below this level (after inversion) seed the gradient
    /// smoothing fill.
    pub smoothing_seed_level: u8,
    /// Largest intensity step the smoothing fill may cross.
    pub smoothing_step: u8,
    /// Width of the left-hand speck-removal margin as a fraction of the page.
    pub speck_margin_fraction: f64,
    /// Leading fields that use the header layout on standard sheets.
    pub header_fields: usize,
    pub header: FieldLayout,
    pub answers: FieldLayout,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            smoothing_seed_level: 50,
            smoothing_step: 10,
            speck_margin_fraction: 0.125,
            header_fields: 2,
            header: FieldLayout::header(),
            answers: FieldLayout::answers(),
        }
    }
}

/// Per-cell normalisation into a classifier patch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    /// Rings of 4-neighbour dilation applied after recentering.
    pub thicken_rings: u8,
    /// Radius of the box blur.
    pub blur_radius: u32,
    /// Number of box blur passes.
    pub blur_passes: u32,
    /// The surviving component must cover at least this fraction of the
    /// crop, otherwise the cell is blank.
    pub min_ink_ratio: f64,
    /// Width of the box the digit is fitted into.
    pub digit_width: u32,
    /// Height of the box the digit is fitted into.
    pub digit_height: u32,
    /// Row the bottom of the digit rests on.
    pub baseline_row: u32,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            thicken_rings: 1,
            blur_radius: 1,
            blur_passes: 2,
            min_ink_ratio: 0.01,
            digit_width: 18,
            digit_height: 20,
            baseline_row: 24,
        }
    }
}

/// Complete pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Longer side of the downscaled photo, and side of the square canvas.
    pub canonical_size: u32,
    pub markers: MarkerConfig,
    pub rectify: RectifyConfig,
    pub segmentation: SegmentationConfig,
    pub patch: PatchConfig,
    /// Character emitted for a blank or unclassifiable cell.
    pub blank_marker: char,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            canonical_size: 1200,
            markers: MarkerConfig::default(),
            rectify: RectifyConfig::default(),
            segmentation: SegmentationConfig::default(),
            patch: PatchConfig::default(),
            blank_marker: '_',
        }
    }
}

impl PipelineConfig {
    /// Load a JSON configuration file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.canonical_size == 0 {
            return Err(FormscanError::Config(
                "canonical_size must be positive".into(),
            ));
        }
        for (name, layout) in [
            ("header", &self.segmentation.header),
            ("answers", &self.segmentation.answers),
        ] {
            if layout.blocks == 0 {
                return Err(FormscanError::Config(format!(
                    "{name} layout must have at least one block"
                )));
            }
            if layout.kernel_x_divisor <= 0.0 || layout.kernel_y_divisor <= 0.0 {
                return Err(FormscanError::Config(format!(
                    "{name} layout kernel divisors must be positive"
                )));
            }
        }
        if self.markers.labeling.capacity == 0 {
            return Err(FormscanError::Config(
                "labeling capacity must be at least 1".into(),
            ));
        }
        if self.patch.digit_width == 0
            || self.patch.digit_height == 0
            || self.patch.baseline_row >= 28
            || self.patch.digit_height > self.patch.baseline_row + 1
        {
            return Err(FormscanError::Config(
                "patch digit box must fit inside the 28x28 canvas".into(),
            ));
        }
        Ok(())
    }
}
