// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Affine (2x3) and homographic (3x3) warps with nearest-neighbour sampling.
//
// Every matrix here maps DESTINATION coordinates to SOURCE coordinates: the
// output pixel (x, y) reads the input at `M * [x, y, 1]`. Samples falling
// outside the input read as background (0).

use formscan_core::error::{FormscanError, Result};
use tracing::instrument;

use crate::raster::Raster;

/// 2x3 affine matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    m: [[f64; 3]; 2],
}

impl Affine {
    pub const IDENTITY: Self = Self {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
    };

    pub fn new(m: [[f64; 3]; 2]) -> Self {
        Self { m }
    }

    /// Uniform scale about the origin.
    pub fn scale(factor: f64) -> Self {
        Self::scale_xy(factor, factor)
    }

    pub fn scale_xy(sx: f64, sy: f64) -> Self {
        Self::new([[sx, 0.0, 0.0], [0.0, sy, 0.0]])
    }

    /// Rotation about the origin, `[cos, sin, 0; -sin, cos, 0]`.
    pub fn rotation(cos: f64, sin: f64) -> Self {
        Self::new([[cos, sin, 0.0], [-sin, cos, 0.0]])
    }

    /// Horizontal shear `x' = x + tan * y + offset`.
    pub fn shear_x(tan: f64, offset: f64) -> Self {
        Self::new([[1.0, tan, offset], [0.0, 1.0, 0.0]])
    }

    pub fn map(&self, x: f64, y: f64) -> (f64, f64) {
        let m = &self.m;
        (
            m[0][0] * x + m[0][1] * y + m[0][2],
            m[1][0] * x + m[1][1] * y + m[1][2],
        )
    }
}

/// 3x3 homography.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    m: [[f64; 3]; 3],
}

impl Homography {
    pub const IDENTITY: Self = Self {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    pub fn new(m: [[f64; 3]; 3]) -> Self {
        Self { m }
    }

    /// Fixed-form foreshortening along y: `[1,0,0; 0,1,0; 0,-factor*ty,1]`.
    pub fn vertical_tilt(factor: f64, ty: f64) -> Self {
        Self::new([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, -factor * ty, 1.0]])
    }

    pub fn determinant(&self) -> f64 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Inverse by adjoint over determinant.
    pub fn inverse(&self) -> Result<Self> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return Err(FormscanError::DegenerateTransform(format!(
                "homography determinant is {det}"
            )));
        }
        let m = &self.m;
        let adjoint = [
            [
                m[1][1] * m[2][2] - m[1][2] * m[2][1],
                m[0][2] * m[2][1] - m[0][1] * m[2][2],
                m[0][1] * m[1][2] - m[0][2] * m[1][1],
            ],
            [
                m[1][2] * m[2][0] - m[1][0] * m[2][2],
                m[0][0] * m[2][2] - m[0][2] * m[2][0],
                m[0][2] * m[1][0] - m[0][0] * m[1][2],
            ],
            [
                m[1][0] * m[2][1] - m[1][1] * m[2][0],
                m[0][1] * m[2][0] - m[0][0] * m[2][1],
                m[0][0] * m[1][1] - m[0][1] * m[1][0],
            ],
        ];
        Ok(Self::new(adjoint.map(|row| row.map(|v| v / det))))
    }

    /// Map through the homography with homogeneous division. Coordinates are
    /// folded to their absolute value; `None` on the line at infinity.
    pub fn map(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let m = &self.m;
        let w = m[2][0] * x + m[2][1] * y + m[2][2];
        if w == 0.0 {
            return None;
        }
        let u = (m[0][0] * x + m[0][1] * y + m[0][2]) / w;
        let v = (m[1][0] * x + m[1][1] * y + m[1][2]) / w;
        Some((u.abs(), v.abs()))
    }
}

#[inline]
fn sample(src: &Raster, x: f64, y: f64) -> u8 {
    src.get(x.round() as i64, y.round() as i64)
}

/// Resample `src` onto a `width x height` canvas through `m`.
#[instrument(skip(src, m), fields(src_w = src.width(), src_h = src.height()))]
pub fn warp_affine(src: &Raster, m: &Affine, width: u32, height: u32) -> Raster {
    Raster::from_fn(width, height, |x, y| {
        let (sx, sy) = m.map(x as f64, y as f64);
        sample(src, sx, sy)
    })
}

/// Resample `src` through a homography; the canvas keeps the input size.
#[instrument(skip(src, h), fields(src_w = src.width(), src_h = src.height()))]
pub fn warp_homography(src: &Raster, h: &Homography) -> Raster {
    Raster::from_fn(src.width(), src.height(), |x, y| match h.map(x as f64, y as f64) {
        Some((sx, sy)) => sample(src, sx, sy),
        None => 0,
    })
}

/// Apply the vertical-tilt correction: build the forward matrix, invert it
/// and sample through the inverse.
pub fn correct_perspective(src: &Raster, factor: f64, ty: f64) -> Result<Raster> {
    let inverse = Homography::vertical_tilt(factor, ty).inverse()?;
    Ok(warp_homography(src, &inverse))
}

/// Mirror both axes (a 180 degree turn).
pub fn flip(src: &Raster) -> Raster {
    let (w, h) = (src.width() as i64, src.height() as i64);
    Raster::from_fn(src.width(), src.height(), |x, y| {
        src.get(w - 1 - x as i64, h - 1 - y as i64)
    })
}

/// Nearest-neighbour rescale so the longer side equals `target`, keeping the
/// aspect ratio.
pub fn scale_longer_side(src: &Raster, target: u32) -> Raster {
    let longer = src.width().max(src.height());
    if longer == 0 || longer == target {
        return src.clone();
    }
    let factor = longer as f64 / target as f64;
    let width = ((src.width() as f64 / factor) as u32).max(1);
    let height = ((src.height() as f64 / factor) as u32).max(1);
    warp_affine(src, &Affine::scale(factor), width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient() -> Raster {
        Raster::from_fn(6, 4, |x, y| (x * 10 + y) as u8)
    }

    #[test]
    fn identity_warps_are_exact() {
        let src = gradient();
        assert_eq!(warp_affine(&src, &Affine::IDENTITY, 6, 4), src);
        assert_eq!(warp_homography(&src, &Homography::IDENTITY), src);
        assert_eq!(correct_perspective(&src, 0.003, 0.0).unwrap(), src);
    }

    #[test]
    fn shifted_warp_reads_background_outside() {
        let src = gradient();
        let shift = Affine::new([[1.0, 0.0, 2.0], [0.0, 1.0, 1.0]]);
        let shifted = warp_affine(&src, &shift, 6, 4);
        assert_eq!(shifted.get(0, 0), src.get(2, 1));
        assert_eq!(shifted.get(4, 0), 0);
    }

    #[test]
    fn quarter_turn_rotation() {
        let src = gradient();
        // Destination (x, y) reads source (y, -x): negative x is background.
        let rotated = warp_affine(&src, &Affine::rotation(0.0, 1.0), 6, 4);
        assert_eq!(rotated.get(0, 3), src.get(3, 0));
        assert_eq!(rotated.get(1, 1), 0);
    }

    #[test]
    fn inverse_undoes_tilt() {
        let forward = Homography::vertical_tilt(0.003, 0.4);
        let inverse = forward.inverse().unwrap();
        let (x, y) = (120.0, 300.0);
        let (u, v) = forward.map(x, y).unwrap();
        let (bx, by) = inverse.map(u, v).unwrap();
        assert!((bx - x).abs() < 1e-9 && (by - y).abs() < 1e-9);
    }

    #[test]
    fn singular_homography_is_degenerate() {
        let singular = Homography::new([[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]]);
        let err = singular.inverse().unwrap_err();
        assert!(matches!(err, FormscanError::DegenerateTransform(_)));
        assert!(err.is_calibration_failure());
    }

    #[test]
    fn flip_mirrors_both_axes() {
        let src = gradient();
        let flipped = flip(&src);
        assert_eq!(flipped.get(0, 0), src.get(5, 3));
        assert_eq!(flipped.get(5, 3), src.get(0, 0));
        assert_eq!(flip(&flipped), src);
    }

    #[test]
    fn scales_longer_side() {
        let src = Raster::filled(400, 200, 9);
        let scaled = scale_longer_side(&src, 100);
        assert_eq!((scaled.width(), scaled.height()), (100, 50));
        assert_eq!(scaled.get(50, 25), 9);

        let small = Raster::filled(50, 20, 9);
        let upscaled = scale_longer_side(&small, 100);
        assert_eq!((upscaled.width(), upscaled.height()), (100, 40));
    }
}
