// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sheet reader — the end-to-end pipeline: rectify the page, segment its
// fields, normalise every character cell and ask the classifier for it.

use std::path::Path;

use formscan_core::config::PipelineConfig;
use formscan_core::error::Result;
use formscan_core::types::{FieldRole, SheetFormat};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::calibrate::DocumentRectifier;
use crate::classify::{DigitClassifier, read_cell};
use crate::geometry::BoundingBox;
use crate::patch::{Patch, PatchNormalizer};
use crate::pdf;
use crate::raster::Raster;
use crate::segment::fields::{FieldSegmenter, ink_image};

/// Result of one page of a multi-page scan: its field readings, or why the
/// page was rejected.
pub type PageOutcome = Result<Vec<String>>;

/// A segmented field as reported to operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentedField {
    pub bounds: BoundingBox,
    pub role: FieldRole,
    /// Number of character cells the field is split into.
    pub blocks: usize,
}

/// Everything the pipeline knows about a page before classification.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// The rectified page.
    pub page: Raster,
    pub fields: Vec<SegmentedField>,
    /// One patch per cell, per field.
    pub patches: Vec<Vec<Patch>>,
}

/// Reads answer sheets with a fixed configuration and layout hint.
#[derive(Debug, Clone)]
pub struct SheetReader {
    config: PipelineConfig,
    format: SheetFormat,
    rectifier: DocumentRectifier,
    segmenter: FieldSegmenter,
    normalizer: PatchNormalizer,
}

impl SheetReader {
    /// Build a reader for standard sheets. Fails when the configuration
    /// does not validate.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rectifier: DocumentRectifier::new(&config),
            segmenter: FieldSegmenter::new(config.segmentation),
            normalizer: PatchNormalizer::new(config.patch),
            format: SheetFormat::default(),
            config,
        })
    }

    pub fn with_format(mut self, format: SheetFormat) -> Self {
        self.format = format;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn format(&self) -> SheetFormat {
        self.format
    }

    /// Rectify a photographed page onto the marker span.
    pub fn rectify(&self, raster: &Raster) -> Result<Raster> {
        self.rectifier.rectify(raster)
    }

    /// Rectify and segment a page without classifying it.
    #[instrument(skip(self, raster), fields(width = raster.width(), height = raster.height(), format = ?self.format))]
    pub fn segment(&self, raster: &Raster) -> Result<Segmentation> {
        let page = self.rectifier.rectify(raster)?;
        let ink = ink_image(&page);
        let fields = self.segmenter.segment(&page, self.format);

        let mut segmented = Vec::with_capacity(fields.len());
        let mut patches = Vec::with_capacity(fields.len());
        for field in &fields {
            let layout = field.layout(self.segmenter.config());
            let border = layout.border(page.pixel_count());
            let cells: Vec<Patch> = (0..layout.blocks)
                .map(|block| {
                    self.normalizer
                        .to_patch(field, &ink, block, layout.blocks, border)
                })
                .collect();
            debug!(
                bounds = ?field.bounds,
                role = ?field.role,
                blank = cells.iter().filter(|p| p.is_blank()).count(),
                "Field normalised"
            );
            segmented.push(SegmentedField {
                bounds: field.bounds,
                role: field.role,
                blocks: layout.blocks,
            });
            patches.push(cells);
        }

        Ok(Segmentation {
            page,
            fields: segmented,
            patches,
        })
    }

    /// Read every field of a page: one string per field, one character per
    /// cell, the blank marker for empty or unreadable cells.
    ///
    /// Calibration failures abort the page; nothing partial is returned.
    #[instrument(skip_all, fields(width = raster.width(), height = raster.height()))]
    pub fn extract_fields(
        &self,
        raster: &Raster,
        classifier: &dyn DigitClassifier,
    ) -> Result<Vec<String>> {
        let segmentation = match self.segment(raster) {
            Ok(segmentation) => segmentation,
            Err(err) => {
                if err.is_calibration_failure() {
                    warn!(%err, "Page rejected");
                }
                return Err(err);
            }
        };

        let blank = self.config.blank_marker;
        let readings = segmentation
            .patches
            .iter()
            .map(|cells| {
                cells
                    .iter()
                    .map(|patch| read_cell(classifier, patch, blank))
                    .collect::<Result<String>>()
            })
            .collect::<Result<Vec<String>>>()?;
        info!(fields = readings.len(), "Fields extracted");
        Ok(readings)
    }

    /// Read a single image file.
    pub fn extract_path(
        &self,
        path: impl AsRef<Path>,
        classifier: &dyn DigitClassifier,
    ) -> Result<Vec<String>> {
        let raster = Raster::open(path)?;
        self.extract_fields(&raster, classifier)
    }

    /// Read every page of a PDF scan in parallel. Each page succeeds or
    /// fails on its own; only an unreadable PDF fails the whole call.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn extract_pdf(
        &self,
        path: impl AsRef<Path>,
        classifier: &dyn DigitClassifier,
    ) -> Result<Vec<PageOutcome>> {
        let pages = pdf::page_images(path)?;
        Ok(self.extract_pages(pages, classifier))
    }

    /// Same as [`SheetReader::extract_pdf`], for a PDF already in memory.
    pub fn extract_pdf_bytes(
        &self,
        data: &[u8],
        classifier: &dyn DigitClassifier,
    ) -> Result<Vec<PageOutcome>> {
        let pages = pdf::page_images_from_bytes(data)?;
        Ok(self.extract_pages(pages, classifier))
    }

    fn extract_pages(
        &self,
        pages: Vec<Result<image::GrayImage>>,
        classifier: &dyn DigitClassifier,
    ) -> Vec<PageOutcome> {
        info!(pages = pages.len(), "Extracting pages");
        pages
            .into_par_iter()
            .enumerate()
            .map(|(index, page)| {
                let outcome = page.and_then(|image| {
                    self.extract_fields(&Raster::from_gray(image), classifier)
                });
                if let Err(err) = &outcome {
                    warn!(page = index + 1, %err, "Page skipped");
                }
                outcome
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Candidate, rank_scores};
    use crate::test_support::{
        padded_sheet, padded_sheet_config, rotated, sheared, sheet_config, sheet_reading,
        synthetic_sheet,
    };
    use formscan_core::error::FormscanError;
    use lopdf::{Document, Object, Stream, dictionary};

    fn always_seven(_: &Patch) -> Result<Vec<Candidate>> {
        let mut scores = vec![0.0; 11];
        scores[7] = 0.9;
        Ok(rank_scores(&scores))
    }

    fn reader() -> SheetReader {
        SheetReader::new(sheet_config()).unwrap()
    }

    #[test]
    fn reads_every_field_of_the_sheet() {
        let readings = reader()
            .extract_fields(&synthetic_sheet(), &always_seven)
            .unwrap();
        assert_eq!(readings, sheet_reading('7', '_'));
    }

    #[test]
    fn segmentation_reports_fields_and_cells() {
        let segmentation = reader().segment(&synthetic_sheet()).unwrap();
        assert_eq!(
            (segmentation.page.width(), segmentation.page.height()),
            (440, 560)
        );
        let roles: Vec<FieldRole> = segmentation.fields.iter().map(|f| f.role).collect();
        assert_eq!(
            roles,
            [
                FieldRole::Header,
                FieldRole::Header,
                FieldRole::Answer,
                FieldRole::Answer
            ]
        );
        let blocks: Vec<usize> = segmentation.patches.iter().map(Vec::len).collect();
        assert_eq!(blocks, [4, 4, 8, 8]);
        assert!(segmentation.patches[3].iter().all(Patch::is_blank));
    }

    #[test]
    fn reads_a_rotated_photo() {
        let reader = SheetReader::new(padded_sheet_config()).unwrap();
        for degrees in [-2.0, 2.0] {
            let photo = rotated(&padded_sheet(), degrees);
            let readings = reader.extract_fields(&photo, &always_seven).unwrap();
            assert_eq!(readings, sheet_reading('7', '_'), "at {degrees} degrees");
        }
    }

    #[test]
    fn reads_a_sheared_photo() {
        let reader = SheetReader::new(padded_sheet_config()).unwrap();
        for factor in [-0.04, 0.04] {
            let photo = sheared(&padded_sheet(), factor);
            let readings = reader.extract_fields(&photo, &always_seven).unwrap();
            assert_eq!(readings, sheet_reading('7', '_'), "at shear {factor}");
        }
    }

    #[test]
    fn calibration_failure_rejects_the_page() {
        let blank = Raster::filled(480, 600, 255);
        let err = reader().extract_fields(&blank, &always_seven).unwrap_err();
        assert!(err.is_calibration_failure());
    }

    #[test]
    fn classifier_failure_fails_the_page() {
        let failing =
            |_: &Patch| -> Result<Vec<Candidate>> { Err(FormscanError::Classifier("boom".into())) };
        let err = reader()
            .extract_fields(&synthetic_sheet(), &failing)
            .unwrap_err();
        assert!(matches!(err, FormscanError::Classifier(_)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = sheet_config();
        config.canonical_size = 0;
        assert!(matches!(
            SheetReader::new(config),
            Err(FormscanError::Config(_))
        ));
    }

    fn page_pdf(pages: &[Raster]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for page in pages {
            let image = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => page.width() as i64,
                    "Height" => page.height() as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                page.pixels().to_vec(),
            ));
            kids.push(Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Resources" => dictionary! { "XObject" => dictionary! { "Scan" => image } },
            })));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => pages.len() as i64,
                "Kids" => kids,
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn pdf_pages_fail_independently() {
        let pdf = page_pdf(&[synthetic_sheet(), Raster::filled(480, 600, 255)]);
        let outcomes = reader().extract_pdf_bytes(&pdf, &always_seven).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].as_ref().unwrap(), &sheet_reading('7', '_'));
        assert!(
            outcomes[1]
                .as_ref()
                .is_err_and(FormscanError::is_calibration_failure)
        );
    }

    #[test]
    fn pdf_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, page_pdf(&[synthetic_sheet()])).unwrap();
        let outcomes = reader().extract_pdf(&path, &always_seven).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_ok());
    }
}
