// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for formscan.

use thiserror::Error;

use crate::types::CalibrationStage;

/// Top-level error type for all formscan operations.
#[derive(Debug, Error)]
pub enum FormscanError {
    // -- Geometry --
    #[error("calibration failed at {stage}: found {found} marker(s), expected 3")]
    Calibration {
        found: usize,
        stage: CalibrationStage,
    },

    #[error("degenerate transform: {0}")]
    DegenerateTransform(String),

    // -- Input decoding --
    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Pdf(#[from] lopdf::Error),

    #[error("PDF page layout not supported: {0}")]
    PdfLayout(String),

    // -- Recognition --
    #[error("digit classifier failed: {0}")]
    Classifier(String),

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FormscanError {
    /// True for failures that mean "resubmit a clearer scan": the page
    /// geometry could not be trusted.
    pub fn is_calibration_failure(&self) -> bool {
        matches!(
            self,
            Self::Calibration { .. } | Self::DegenerateTransform(_)
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FormscanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_message_names_stage_and_count() {
        let err = FormscanError::Calibration {
            found: 2,
            stage: CalibrationStage::PostRectification,
        };
        let msg = err.to_string();
        assert!(msg.contains("post-rectification"), "got {msg}");
        assert!(msg.contains("found 2"), "got {msg}");
    }

    #[test]
    fn geometry_errors_are_calibration_failures() {
        assert!(FormscanError::DegenerateTransform("det = 0".into()).is_calibration_failure());
        assert!(
            FormscanError::Calibration {
                found: 0,
                stage: CalibrationStage::Initial
            }
            .is_calibration_failure()
        );
        assert!(!FormscanError::Config("bad".into()).is_calibration_failure());
    }
}
