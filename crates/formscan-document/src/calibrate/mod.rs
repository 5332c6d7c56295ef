// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Calibration — marker detection and page rectification.

pub mod markers;
pub mod rectify;

pub use markers::MarkerDetector;
pub use rectify::{DocumentRectifier, MarkerTriangle};
