// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Neural digit classifier backed by an `rten` model.
//
// # Feature Gate
//
// This module is only available when the `classifier` feature is enabled:
//
// ```toml
// formscan-document = { path = "crates/formscan-document", features = ["classifier"] }
// ```
//
// # Model contract
//
// The model takes one `[1, 1, 28, 28]` float tensor, patch pixels scaled to
// `0.0..=1.0` in row-major order, and returns `[1, N]` scores. Classes 0-9
// are the digits; any further class means "unrecognized".

use std::path::Path;

use formscan_core::error::{FormscanError, Result};
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use tracing::{debug, info, instrument};

use super::{Candidate, DigitClassifier, rank_scores};
use crate::patch::{PATCH_SIDE, Patch};

/// Digit classifier running a `.rten` model.
pub struct ModelClassifier {
    model: Model,
}

impl ModelClassifier {
    /// Load the model from `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading digit classifier model");
        let model = Model::load_file(path).map_err(|err| {
            FormscanError::Classifier(format!(
                "failed to load model '{}': {err}",
                path.display()
            ))
        })?;
        Ok(Self { model })
    }

    fn input(patch: &Patch) -> NdTensor<f32, 4> {
        let data: Vec<f32> = patch.pixels().iter().map(|&v| v as f32 / 255.0).collect();
        NdTensor::from_data([1, 1, PATCH_SIDE, PATCH_SIDE], data)
    }
}

impl std::fmt::Debug for ModelClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClassifier").finish_non_exhaustive()
    }
}

impl DigitClassifier for ModelClassifier {
    fn classify(&self, patch: &Patch) -> Result<Vec<Candidate>> {
        let input = Self::input(patch);
        let output: NdTensor<f32, 2> = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|err| FormscanError::Classifier(format!("inference failed: {err}")))?
            .try_into()
            .map_err(|err| FormscanError::Classifier(format!("unexpected model output: {err}")))?;
        let scores: Vec<f32> = output.iter().copied().collect();
        debug!(classes = scores.len(), "Patch classified");
        Ok(rank_scores(&scores))
    }
}
