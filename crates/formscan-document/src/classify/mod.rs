// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Digit classification seam. The pipeline only needs a ranked candidate list
// per patch; the model behind it is pluggable.

#[cfg(feature = "classifier")]
pub mod model;

use formscan_core::error::Result;
use serde::Serialize;

use crate::patch::Patch;

/// One class a classifier can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Glyph {
    Digit(u8),
    /// The "no confident digit" class.
    Unrecognized,
}

/// A scored class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candidate {
    pub glyph: Glyph,
    pub score: f32,
}

/// Read-only digit recognizer, shared across page workers.
pub trait DigitClassifier: Send + Sync {
    /// Candidates for one patch, best first.
    fn classify(&self, patch: &Patch) -> Result<Vec<Candidate>>;
}

impl<F> DigitClassifier for F
where
    F: Fn(&Patch) -> Result<Vec<Candidate>> + Send + Sync,
{
    fn classify(&self, patch: &Patch) -> Result<Vec<Candidate>> {
        self(patch)
    }
}

/// Rank raw class scores: index 0-9 are digits, anything past them is
/// unrecognized. Equal scores keep class order.
pub fn rank_scores(scores: &[f32]) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = scores
        .iter()
        .enumerate()
        .map(|(class, &score)| Candidate {
            glyph: if class < 10 {
                Glyph::Digit(class as u8)
            } else {
                Glyph::Unrecognized
            },
            score,
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

/// Pick the character for a ranked list: the best digit, falling back to
/// the runner-up when the best is unrecognized, otherwise `blank`.
pub fn resolve(candidates: &[Candidate], blank: char) -> char {
    let digit = |c: &Candidate| match c.glyph {
        Glyph::Digit(d) => char::from_digit(d as u32, 10),
        Glyph::Unrecognized => None,
    };
    match candidates {
        [first, ..] if digit(first).is_some() => digit(first).unwrap_or(blank),
        [_, second, ..] => digit(second).unwrap_or(blank),
        _ => blank,
    }
}

/// Read one cell. Blank patches never reach the classifier.
pub fn read_cell(classifier: &dyn DigitClassifier, patch: &Patch, blank: char) -> Result<char> {
    if patch.is_blank() {
        return Ok(blank);
    }
    Ok(resolve(&classifier.classify(patch)?, blank))
}

#[cfg(test)]
mod tests {
    use super::*;
    use formscan_core::error::FormscanError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn inked() -> Patch {
        let mut pixels = [0u8; crate::patch::PATCH_LEN];
        pixels[400] = 255;
        Patch::from_pixels(pixels)
    }

    #[test]
    fn ranks_best_first() {
        let ranked = rank_scores(&[0.1, 0.7, 0.05, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.15]);
        assert_eq!(ranked[0].glyph, Glyph::Digit(1));
        assert_eq!(ranked[1].glyph, Glyph::Unrecognized);
        assert_eq!(ranked[2].glyph, Glyph::Digit(0));
        // Ties keep class order.
        assert_eq!(ranked[4].glyph, Glyph::Digit(3));
    }

    #[test]
    fn unrecognized_falls_back_to_second_best() {
        let ranked = rank_scores(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.2, 0.0, 0.0, 0.8]);
        assert_eq!(resolve(&ranked, '_'), '7');
    }

    #[test]
    fn nothing_usable_is_blank() {
        assert_eq!(resolve(&[], '_'), '_');
        let only_unrecognized = [Candidate {
            glyph: Glyph::Unrecognized,
            score: 1.0,
        }];
        assert_eq!(resolve(&only_unrecognized, '_'), '_');
    }

    #[test]
    fn blank_patch_skips_the_classifier() {
        let calls = AtomicUsize::new(0);
        let classifier = |_: &Patch| -> Result<Vec<Candidate>> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(rank_scores(&[1.0]))
        };
        assert_eq!(read_cell(&classifier, &Patch::blank(), '_').unwrap(), '_');
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(read_cell(&classifier, &inked(), '_').unwrap(), '0');
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn classifier_errors_propagate() {
        let failing =
            |_: &Patch| -> Result<Vec<Candidate>> { Err(FormscanError::Classifier("offline".into())) };
        let err = read_cell(&failing, &inked(), '_').unwrap_err();
        assert!(matches!(err, FormscanError::Classifier(_)));
    }
}
