//! Scale analyzer
//!
//! Exploratory helper for building the region table: OCR a few likely
//! label areas of each page and list which scale names turn up where.
//! Nothing here feeds the cropper directly.

use crate::error::{PipelineError, Result};
use crate::matching::ScalePatterns;
use crate::ocr::{PageSegMode, TextRecognizer};
use crate::preprocess::{crop, grayscale, load_oriented, pixel_box};
use image::DynamicImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Named candidate area as `(left, top, right, bottom)` fractions
#[derive(Debug, Clone, Copy)]
pub struct CandidateRegion {
    pub name: &'static str,
    pub window: (f64, f64, f64, f64),
}

/// Areas where the printed scale titles usually sit
pub const ANALYSIS_REGIONS: [CandidateRegion; 5] = [
    CandidateRegion {
        name: "Full page",
        window: (0.0, 0.0, 1.0, 1.0),
    },
    CandidateRegion {
        name: "Left 20%",
        window: (0.0, 0.0, 0.2, 1.0),
    },
    CandidateRegion {
        name: "Top third left",
        window: (0.0, 0.0, 0.3, 0.33),
    },
    CandidateRegion {
        name: "Middle third left",
        window: (0.0, 0.33, 0.3, 0.66),
    },
    CandidateRegion {
        name: "Bottom third left",
        window: (0.0, 0.66, 0.3, 1.0),
    },
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct RegionFindings {
    pub name: String,
    /// Every pattern match, in pattern order
    pub found: Vec<String>,
    /// Recognized lines containing at least one match
    pub lines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RegionFindings {
    pub fn is_interesting(&self) -> bool {
        !self.found.is_empty() || self.error.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageAnalysis {
    pub file: PathBuf,
    pub width: u32,
    pub height: u32,
    pub regions: Vec<RegionFindings>,
}

/// Source pages in `dir`: `*.jpg` in any case, sorted by file name
pub fn list_source_pages(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PipelineError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "source directory not found"),
        ));
    }

    let mut pages = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| PipelineError::io(dir, e.into()))?;
        let is_jpg = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"));
        if is_jpg && entry.file_type().is_file() {
            pages.push(entry.into_path());
        }
    }
    Ok(pages)
}

pub struct ScaleAnalyzer<'a> {
    recognizer: &'a dyn TextRecognizer,
    patterns: ScalePatterns,
}

impl<'a> ScaleAnalyzer<'a> {
    pub fn new(recognizer: &'a dyn TextRecognizer) -> Result<Self> {
        Ok(Self {
            recognizer,
            patterns: ScalePatterns::new()?,
        })
    }

    /// Load, orient and analyze one page
    pub fn analyze_file(&self, path: &Path) -> Result<PageAnalysis> {
        let (image, _) = load_oriented(path)?;
        let mut analysis = self.analyze_image(&image);
        analysis.file = path.to_path_buf();
        Ok(analysis)
    }

    /// Run every candidate region through single-block OCR
    ///
    /// A failed recognition is recorded on its region and the remaining
    /// regions still run.
    pub fn analyze_image(&self, image: &DynamicImage) -> PageAnalysis {
        let (width, height) = (image.width(), image.height());

        let regions = ANALYSIS_REGIONS
            .iter()
            .map(|candidate| {
                let mut findings = RegionFindings {
                    name: candidate.name.to_string(),
                    ..RegionFindings::default()
                };
                let Some(rect) = pixel_box(width, height, candidate.window) else {
                    findings.error = Some("region is empty".to_string());
                    return findings;
                };

                let gray = grayscale(&crop(image, rect));
                match self.recognizer.recognize(&gray, PageSegMode::SingleBlock) {
                    Ok(text) => {
                        findings.found = self.patterns.find_all(&text);
                        if !findings.found.is_empty() {
                            findings.lines = self.patterns.matching_lines(&text);
                        }
                    }
                    Err(e) => {
                        tracing::debug!(region = candidate.name, error = %e, "analysis OCR failed");
                        findings.error = Some(e.to_string());
                    }
                }
                findings
            })
            .collect();

        PageAnalysis {
            file: PathBuf::new(),
            width,
            height,
            regions,
        }
    }
}
