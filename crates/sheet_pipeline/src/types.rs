//! Core types for the sheetcrop pipeline
//!
//! These are shared by the cropper, verifier and report generator. The
//! identifier is the only key that links a cropped image back to its
//! region and its expected label.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Name of one exercise, e.g. `I-4` or `VI-8`
///
/// Always `<section>-<index>` where the section is a roman numeral built
/// from `I`, `V` and `X` and the index is a positive integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File stem used for the cropped artifact (`I-4` -> `i_4`)
    pub fn file_stem(&self) -> String {
        self.0.to_lowercase().replace('-', "_")
    }

    /// File name used for the cropped artifact (`I-4` -> `i_4.jpg`)
    pub fn file_name(&self) -> String {
        format!("{}.jpg", self.file_stem())
    }
}

impl FromStr for Identifier {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PipelineError::InvalidIdentifier(s.to_string());
        let (section, index) = s.split_once('-').ok_or_else(invalid)?;

        if section.is_empty() || !section.chars().all(|c| matches!(c, 'I' | 'V' | 'X')) {
            return Err(invalid());
        }
        if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        match index.parse::<u32>() {
            Ok(n) if n > 0 => Ok(Self(s.to_string())),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Identifier {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fractional crop window on a source page
///
/// `top`/`bottom` are fractions of page height. `left`/`right` are
/// fractions of page width and fall back to the configured margins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropWindow {
    pub top: f64,
    pub bottom: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<f64>,
}

impl CropWindow {
    /// Window spanning `top..bottom` with default horizontal margins
    pub fn rows(top: f64, bottom: f64) -> Self {
        Self {
            top,
            bottom,
            left: None,
            right: None,
        }
    }

    /// Resolve to `(left, top, right, bottom)` fractions
    pub fn resolve(&self, default_left: f64, default_right: f64) -> (f64, f64, f64, f64) {
        (
            self.left.unwrap_or(default_left),
            self.top,
            self.right.unwrap_or(default_right),
            self.bottom,
        )
    }

    /// Check range and ordering of the explicit fractions
    pub fn check(&self) -> Result<(), String> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);

        let fields = [
            ("top", Some(self.top)),
            ("bottom", Some(self.bottom)),
            ("left", self.left),
            ("right", self.right),
        ];
        for (name, value) in fields {
            if let Some(v) = value {
                if !in_unit(v) {
                    return Err(format!("{name} = {v} is outside [0, 1]"));
                }
            }
        }
        if self.bottom <= self.top {
            return Err(format!(
                "bottom ({}) must be greater than top ({})",
                self.bottom, self.top
            ));
        }
        if let (Some(l), Some(r)) = (self.left, self.right) {
            if r <= l {
                return Err(format!("right ({r}) must be greater than left ({l})"));
            }
        }
        Ok(())
    }
}

/// One exercise cut from a source page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionMapping {
    pub id: Identifier,
    #[serde(flatten)]
    pub window: CropWindow,
}

/// All regions cut from one source page, in page order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRegions {
    /// File name inside the source directory
    pub source: String,
    pub regions: Vec<RegionMapping>,
}

/// What a cropped exercise is expected to show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedLabel {
    pub id: Identifier,
    /// Human-readable title, e.g. "Ab Major Scale"
    pub title: String,
    /// Fragments searched for in recognized text
    pub keywords: Vec<String>,
}

/// A compressed image written by the cropper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CroppedArtifact {
    pub id: Identifier,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Encoded JPEG size in bytes
    pub size_bytes: u64,
    /// SHA-256 of the encoded bytes, lowercase hex
    pub content_hash: String,
}

/// Outcome of checking one cropped image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// At least one keyword fragment was found
    Passed { matched: Vec<String> },
    /// Nothing matched; snippet of what was recognized
    Failed { snippet: String },
    /// Cropped image does not exist
    Missing { path: PathBuf },
}

/// Per-identifier verification result, never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub id: Identifier,
    pub expected: String,
    pub outcome: VerificationOutcome,
}

impl VerificationResult {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, VerificationOutcome::Passed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        s.parse().unwrap()
    }

    #[test]
    fn test_identifier_file_name() {
        assert_eq!(id("I-4").file_name(), "i_4.jpg");
        assert_eq!(id("VI-8").file_stem(), "vi_8");
        assert_eq!(id("III-10").file_name(), "iii_10.jpg");
    }

    #[test]
    fn test_identifier_rejects_malformed() {
        for bad in ["", "I", "I-", "-4", "A-1", "i-4", "I-0", "I-4a", "I_4", "I-4-1"] {
            assert!(bad.parse::<Identifier>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_identifier_serde_validates() {
        let ok: Identifier = serde_json::from_str("\"IV-2\"").unwrap();
        assert_eq!(ok.as_str(), "IV-2");
        assert!(serde_json::from_str::<Identifier>("\"Q-2\"").is_err());
    }

    #[test]
    fn test_crop_window_defaults_margins() {
        let w = CropWindow::rows(0.0, 0.31);
        assert_eq!(w.resolve(0.03, 0.97), (0.03, 0.0, 0.97, 0.31));

        let w = CropWindow {
            left: Some(0.1),
            ..CropWindow::rows(0.2, 0.4)
        };
        assert_eq!(w.resolve(0.03, 0.97), (0.1, 0.2, 0.97, 0.4));
    }

    #[test]
    fn test_crop_window_check() {
        assert!(CropWindow::rows(0.0, 0.31).check().is_ok());
        assert!(CropWindow::rows(0.31, 0.31).check().is_err());
        assert!(CropWindow::rows(0.5, 0.2).check().is_err());
        assert!(CropWindow::rows(-0.1, 0.2).check().is_err());
        assert!(CropWindow::rows(0.0, 1.2).check().is_err());

        let inverted = CropWindow {
            left: Some(0.6),
            right: Some(0.4),
            ..CropWindow::rows(0.0, 0.5)
        };
        assert!(inverted.check().is_err());
    }

    #[test]
    fn test_region_mapping_flattened_json() {
        let json = r#"{"id": "I-1", "top": 0.0, "bottom": 0.31}"#;
        let region: RegionMapping = serde_json::from_str(json).unwrap();
        assert_eq!(region.id, id("I-1"));
        assert_eq!(region.window, CropWindow::rows(0.0, 0.31));
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = VerificationOutcome::Passed {
            matched: vec!["melodic".to_string()],
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"status\":\"passed\""));
    }
}
