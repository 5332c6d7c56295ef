// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the formscan pipeline.

use serde::{Deserialize, Serialize};

/// Layout hint supplied by the caller alongside the page image.
///
/// Only selects which block/margin constants apply to each segmented field;
/// it never changes the geometry pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SheetFormat {
    /// Identifying header fields (student/test ID) followed by answer fields.
    #[default]
    Standard,
    /// Every field is an answer field.
    AnswersOnly,
}

impl SheetFormat {
    /// Number of leading fields that use the header layout, given the
    /// configured header count for standard sheets.
    pub fn header_fields(&self, configured: usize) -> usize {
        match self {
            Self::Standard => configured,
            Self::AnswersOnly => 0,
        }
    }
}

/// Which marker detection pass failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationStage {
    /// Detection on the downscaled input photo.
    Initial,
    /// Self-check on the rotated, sheared and perspective-corrected canvas.
    PostRectification,
}

impl std::fmt::Display for CalibrationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => f.write_str("initial detection"),
            Self::PostRectification => f.write_str("post-rectification check"),
        }
    }
}

/// Role of a segmented field on the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldRole {
    /// Dense identifying boxes (student/test ID).
    Header,
    /// Regular answer boxes.
    Answer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_only_has_no_header_fields() {
        assert_eq!(SheetFormat::Standard.header_fields(2), 2);
        assert_eq!(SheetFormat::AnswersOnly.header_fields(2), 0);
    }

    #[test]
    fn sheet_format_serde_is_kebab_case() {
        let json = serde_json::to_string(&SheetFormat::AnswersOnly).unwrap();
        assert_eq!(json, "\"answers-only\"");
        let back: SheetFormat = serde_json::from_str("\"standard\"").unwrap();
        assert_eq!(back, SheetFormat::Standard);
    }
}
