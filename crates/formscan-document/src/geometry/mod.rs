// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometry — 2D value types and raster warps.

pub mod point;
pub mod transform;

pub use point::{BoundingBox, Point, Vector};
pub use transform::{Affine, Homography};
