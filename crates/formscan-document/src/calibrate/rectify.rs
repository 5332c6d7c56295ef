// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document rectification — map a photographed page onto the canonical
// canvas using the three calibration markers.

use formscan_core::config::PipelineConfig;
use formscan_core::error::{FormscanError, Result};
use formscan_core::types::CalibrationStage;
use tracing::{debug, info, instrument};

use super::markers::MarkerDetector;
use crate::geometry::transform::{Affine, correct_perspective, flip, scale_longer_side, warp_affine};
use crate::geometry::{Point, Vector};
use crate::raster::Raster;
use crate::segment::components::Component;

/// The marker triangle: the right-angle vertex and the two legs leaving it,
/// `|a| <= |b|`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerTriangle {
    /// Index of the right-angle marker in the input order.
    pub origin_index: usize,
    pub origin: Point,
    pub a: Vector,
    pub b: Vector,
}

impl MarkerTriangle {
    /// The right angle sits opposite the longest pairwise distance.
    pub fn from_centers(centers: [Point; 3]) -> Result<Self> {
        let [p0, p1, p2] = centers;
        let d01 = p0.distance(p1);
        let d02 = p0.distance(p2);
        let d12 = p1.distance(p2);
        let (origin_index, origin, u, v) = if d01 >= d02 && d01 >= d12 {
            (2, p2, p0, p1)
        } else if d02 >= d01 && d02 >= d12 {
            (1, p1, p0, p2)
        } else {
            (0, p0, p1, p2)
        };

        let (mut a, mut b) = (origin.vector_to(u), origin.vector_to(v));
        if a.len > b.len {
            std::mem::swap(&mut a, &mut b);
        }
        if a.len == 0.0 || a.cos_between(&b).abs() >= 1.0 {
            return Err(FormscanError::DegenerateTransform(
                "calibration markers are coincident or collinear".into(),
            ));
        }
        Ok(Self {
            origin_index,
            origin,
            a,
            b,
        })
    }

    /// cos/sin of the rotation bringing leg `a` onto the x axis.
    fn rotation(&self) -> (f64, f64) {
        let cos = self.a.cos_between(&Vector::unit_x()).abs();
        let sin = self.a.dx.signum() * self.a.sin_between(&Vector::unit_x());
        (cos, sin)
    }

    /// Cosine of the angle between the legs: zero for an undistorted page.
    fn skew(&self) -> f64 {
        self.a.cos_between(&self.b)
    }
}

fn centroids(markers: &[Component; 3]) -> Result<[Point; 3]> {
    let mut centers = [Point::new(0.0, 0.0); 3];
    for (slot, marker) in centers.iter_mut().zip(markers) {
        *slot = marker.centroid().ok_or_else(|| {
            FormscanError::DegenerateTransform("empty calibration marker".into())
        })?;
    }
    Ok(centers)
}

/// Rectifies photographed sheets onto the canonical canvas.
#[derive(Debug, Clone)]
pub struct DocumentRectifier {
    canonical_size: u32,
    perspective_factor: f64,
    detector: MarkerDetector,
}

impl DocumentRectifier {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            canonical_size: config.canonical_size,
            perspective_factor: config.rectify.perspective_factor,
            detector: MarkerDetector::new(config.markers),
        }
    }

    /// Rectify a page. The result spans the three markers: the right-angle
    /// marker's center, less half its side, lands on pixel (0, 0).
    ///
    /// Fails with `Calibration` when three markers cannot be found either
    /// on the input or on the corrected canvas, and with
    /// `DegenerateTransform` when they do not form a usable triangle.
    #[instrument(skip(self, raster), fields(width = raster.width(), height = raster.height()))]
    pub fn rectify(&self, raster: &Raster) -> Result<Raster> {
        let size = self.canonical_size;
        let scaled = scale_longer_side(raster, size);

        let markers = self.detector.detect(&scaled, CalibrationStage::Initial)?;
        let triangle = MarkerTriangle::from_centers(centroids(&markers)?)?;
        debug!(?triangle, "Marker triangle resolved");

        let canvas = scaled.paste_onto(size, size);

        let (cos, sin) = triangle.rotation();
        let rotated = warp_affine(&canvas, &Affine::rotation(cos, sin), size, size);

        let skew = triangle.skew();
        let tan = skew / (1.0 - skew * skew).sqrt();
        let sheared = warp_affine(
            &rotated,
            &Affine::shear_x(tan, -(size as f64) * tan),
            size,
            size,
        );

        let mut corrected = correct_perspective(&sheared, self.perspective_factor, skew)?;
        if triangle.b.dy < 0.0 {
            debug!("Page is upside down, flipping");
            corrected = flip(&corrected);
        }
        debug!(cos, sin, tan, skew, "Canvas corrected");

        let result = self.crop_to_markers(&corrected)?;
        info!(
            width = result.width(),
            height = result.height(),
            "Page rectified"
        );
        Ok(result)
    }

    /// Re-detect the markers and crop the canvas to their span.
    fn crop_to_markers(&self, canvas: &Raster) -> Result<Raster> {
        let markers = self
            .detector
            .detect(canvas, CalibrationStage::PostRectification)?;
        let centers = centroids(&markers)?;
        let triangle = MarkerTriangle::from_centers(centers)?;
        let (origin, origin_index) = (triangle.origin, triangle.origin_index);
        let side = |i: usize| (markers[i].len() as f64).sqrt();

        let shift = (side(origin_index) / 2.0).min(origin.x).min(origin.y);
        let offset_x = (origin.x - shift).round();
        let offset_y = (origin.y - shift).round();

        let (mut reach_x, mut reach_y) = (0.0f64, 0.0f64);
        for (i, center) in centers.iter().enumerate() {
            if i == origin_index {
                continue;
            }
            reach_x = reach_x.max(center.x - origin.x + side(i) / 2.0);
            reach_y = reach_y.max(center.y - origin.y + side(i) / 2.0);
        }
        let width = (reach_x + shift).max(1.0) as u32;
        let height = (reach_y + shift).max(1.0) as u32;
        debug!(offset_x, offset_y, width, height, "Cropping to marker span");

        Ok(canvas.crop(offset_x as i64, offset_y as i64, width, height))
    }
}
