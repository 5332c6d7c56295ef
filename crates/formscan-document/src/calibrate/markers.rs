// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Calibration marker detection — three small printed squares.

use formscan_core::config::MarkerConfig;
use formscan_core::error::{FormscanError, Result};
use formscan_core::types::CalibrationStage;
use tracing::{debug, instrument, warn};

use crate::raster::Raster;
use crate::segment::components::{Component, Connectivity, Labeler};
use crate::threshold::enhance_contrast;

/// Locates the three calibration squares on a page.
#[derive(Debug, Clone)]
pub struct MarkerDetector {
    config: MarkerConfig,
}

impl MarkerDetector {
    pub fn new(config: MarkerConfig) -> Self {
        Self { config }
    }

    /// Every component passing the square test, ascending by pixel count.
    ///
    /// The page is pushed to black/white, labeled, and every component below
    /// the area cap is painted onto an empty mask. Labeling that mask again
    /// yields tight candidate shapes free of the page background.
    #[instrument(skip(self, raster), fields(width = raster.width(), height = raster.height()))]
    pub fn candidates(&self, raster: &Raster) -> Vec<Component> {
        let labeler = Labeler::adaptive(Connectivity::Eight, &self.config.labeling);
        let area_cap = (raster.pixel_count() as f64 * self.config.max_area_fraction) as usize;

        let mut contrasted = raster.clone();
        enhance_contrast(&mut contrasted, self.config.contrast_floor);

        let mut mask = Raster::filled(raster.width(), raster.height(), 0);
        let coarse = labeler.label(&contrasted, |_| true);
        for component in coarse.components().iter().filter(|c| c.len() <= area_cap) {
            for &(x, y) in component.points() {
                mask.set(x as i64, y as i64, 255);
            }
        }

        let mut squares: Vec<Component> = labeler
            .label(&mask, |v| v == 255)
            .into_components()
            .into_iter()
            .filter(|c| c.len() < area_cap && self.is_square(c))
            .collect();
        squares.sort_by_key(Component::len);
        debug!(candidates = squares.len(), area_cap, "Square candidates found");
        squares
    }

    /// Exactly three markers, the largest candidates when more qualify.
    pub fn detect(&self, raster: &Raster, stage: CalibrationStage) -> Result<[Component; 3]> {
        let mut squares = self.candidates(raster);
        let found = squares.len();
        if found < 3 {
            warn!(found, %stage, "Calibration markers not found");
            return Err(FormscanError::Calibration { found, stage });
        }
        let largest = squares.split_off(found - 3);
        <[Component; 3]>::try_from(largest)
            .map_err(|_| FormscanError::Calibration { found, stage })
    }

    /// Compare the pixel count against the square of the mean bounding-box
    /// side.
    fn is_square(&self, component: &Component) -> bool {
        let Some(bbox) = component.bounding_box() else {
            return false;
        };
        let side = (bbox.span_x() + bbox.span_y()) as f64 / 2.0;
        let expected = side * side;
        let actual = component.len() as f64;
        (expected - actual).abs() < expected.max(actual) * self.config.squareness_tolerance
    }
}
