//! OCR-assisted verification of cropped images
//!
//! For each expected label, read the cropped image back, OCR the left side
//! (where exercise titles are printed) several ways, and accept the image if
//! any expected fragment shows up. This is brute force: three regions times
//! three segmentation modes, all text concatenated. It is a sanity check for
//! a human reviewer, not an authority.

use crate::catalog::Catalog;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::matching::{matches, snippet, AnyFragment};
use crate::ocr::{recognize_or_empty, PageSegMode, TextRecognizer};
use crate::preprocess::{crop, pixel_box, prepare_for_ocr, OcrPreprocess};
use crate::types::{ExpectedLabel, Identifier, VerificationOutcome, VerificationResult};
use image::DynamicImage;
use std::path::Path;

/// Left-side areas that hold the printed title, as `(left, top, right, bottom)`
pub const VERIFY_REGIONS: [(&str, (f64, f64, f64, f64)); 3] = [
    ("left_margin", (0.0, 0.0, 0.25, 1.0)),
    ("top_left", (0.0, 0.0, 0.3, 0.3)),
    ("full_left", (0.0, 0.0, 0.4, 1.0)),
];

/// Segmentation modes tried on every region, in order
pub const VERIFY_MODES: [PageSegMode; 3] = [
    PageSegMode::SingleBlock,
    PageSegMode::SparseText,
    PageSegMode::FullyAutomatic,
];

/// Outcome of a full verification run
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    pub results: Vec<VerificationResult>,
}

impl VerificationReport {
    pub fn passed(&self) -> impl Iterator<Item = &VerificationResult> {
        self.results.iter().filter(|r| r.passed())
    }

    pub fn failed(&self) -> impl Iterator<Item = &VerificationResult> {
        self.results.iter().filter(|r| !r.passed())
    }

    pub fn all_passed(&self) -> bool {
        self.failed().next().is_none()
    }

    /// Process exit status: 0 when nothing failed, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }
}

/// Detailed extraction for one identifier
#[derive(Debug, Clone)]
pub struct ItemAnalysis {
    pub id: Identifier,
    pub text: String,
    /// `None` when the identifier has no expected label
    pub label: Option<ExpectedLabel>,
    pub matches: Vec<String>,
}

pub struct Verifier<'a> {
    config: &'a PipelineConfig,
    catalog: &'a Catalog,
    recognizer: &'a dyn TextRecognizer,
    policy: AnyFragment,
}

impl<'a> Verifier<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        catalog: &'a Catalog,
        recognizer: &'a dyn TextRecognizer,
    ) -> Self {
        Self {
            config,
            catalog,
            recognizer,
            policy: AnyFragment,
        }
    }

    /// Check every labelled identifier, in label order
    ///
    /// Regions without a label are not checked; they are only reported as a
    /// warning.
    pub fn verify_all(&self) -> VerificationReport {
        let consistency = self.catalog.consistency();
        consistency.log_warnings();

        let results = self
            .catalog
            .labels()
            .iter()
            .map(|label| self.verify_label(label))
            .collect();
        VerificationReport { results }
    }

    pub fn verify_label(&self, label: &ExpectedLabel) -> VerificationResult {
        let path = self.config.artifact_path(&label.id.file_name());

        let outcome = if !path.exists() {
            VerificationOutcome::Missing { path }
        } else {
            match self.extract_text(&path) {
                Ok(text) => match self.policy.evaluate(&text, &label.keywords) {
                    Some(matched) => VerificationOutcome::Passed { matched },
                    None => VerificationOutcome::Failed {
                        snippet: snippet(&text, self.config.verify.snippet_len),
                    },
                },
                Err(e) => {
                    tracing::warn!(id = %label.id, error = %e, "cropped image unreadable");
                    VerificationOutcome::Failed {
                        snippet: e.to_string(),
                    }
                }
            }
        };

        tracing::debug!(id = %label.id, ?outcome, "verified");
        VerificationResult {
            id: label.id.clone(),
            expected: label.title.clone(),
            outcome,
        }
    }

    /// OCR the title area of a cropped image, all attempts concatenated
    pub fn extract_text(&self, path: &Path) -> Result<String> {
        let image = image::open(path).map_err(|e| PipelineError::image(path, e))?;
        Ok(self.extract_text_from_image(&image))
    }

    pub fn extract_text_from_image(&self, image: &DynamicImage) -> String {
        let params = OcrPreprocess::from(&self.config.verify);
        let mut texts = Vec::with_capacity(VERIFY_REGIONS.len() * VERIFY_MODES.len());

        for (name, window) in VERIFY_REGIONS {
            let Some(rect) = pixel_box(image.width(), image.height(), window) else {
                tracing::debug!(region = name, "region empty, skipped");
                continue;
            };
            let prepared = prepare_for_ocr(&crop(image, rect), params);
            for mode in VERIFY_MODES {
                texts.push(recognize_or_empty(self.recognizer, &prepared, mode));
            }
        }
        texts.join("\n")
    }

    /// Single-identifier debugging: raw text plus match details
    ///
    /// Fails only when the cropped image does not exist or cannot be read.
    pub fn analyze_one(&self, id: &Identifier) -> Result<ItemAnalysis> {
        let path = self.config.artifact_path(&id.file_name());
        if !path.exists() {
            return Err(PipelineError::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "cropped image not found"),
            ));
        }

        let text = self.extract_text(&path)?;
        let label = self.catalog.label(id).cloned();
        let matches = label
            .as_ref()
            .map(|l| {
                matches(&text, &l.keywords)
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(ItemAnalysis {
            id: id.clone(),
            text,
            label,
            matches,
        })
    }
}
