// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// formscan-document — Answer-sheet processing for formscan.
//
// Provides raster primitives (Otsu thresholding, filters, affine and
// homographic warps), calibration (marker detection, page rectification),
// field segmentation, patch normalisation for the digit classifier, PDF page
// extraction and the end-to-end sheet reader.

pub mod calibrate;
pub mod classify;
pub mod filters;
pub mod geometry;
pub mod patch;
pub mod pdf;
pub mod pipeline;
pub mod raster;
pub mod segment;
pub mod threshold;

#[cfg(test)]
mod test_support;

// Re-export the primary structs so callers can use `formscan_document::SheetReader` etc.
pub use calibrate::{DocumentRectifier, MarkerDetector};
pub use classify::{Candidate, DigitClassifier, Glyph};
pub use patch::{Patch, PatchNormalizer};
pub use pipeline::{PageOutcome, SegmentedField, Segmentation, SheetReader};
pub use raster::Raster;
pub use segment::{Field, FieldSegmenter};

#[cfg(feature = "classifier")]
pub use classify::model::ModelClassifier;
