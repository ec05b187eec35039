//! Pipeline configuration
//!
//! One explicit value passed into every stage. Fields missing from a JSON
//! config file take their defaults, so a file only needs the overrides.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest accepted `verify.upscale`
pub const MAX_UPSCALE: u32 = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the source photographs
    pub source_dir: PathBuf,
    /// Directory the cropped JPEGs are written to
    pub output_dir: PathBuf,
    /// Where the HTML review page is written
    pub report_path: PathBuf,
    /// URL path under which the report finds the cropped images
    pub web_prefix: String,
    /// Cropped images wider than this are downscaled (default: 800)
    pub max_width: u32,
    /// JPEG quality, 1-100 (default: 75)
    pub jpeg_quality: u8,
    /// Contrast factor applied to every crop (default: 1.1)
    pub crop_contrast: f32,
    /// Default left edge as a fraction of page width (default: 0.03)
    pub margin_left: f64,
    /// Default right edge as a fraction of page width (default: 0.97)
    pub margin_right: f64,
    pub ocr: OcrConfig,
    pub verify: VerifyConfig,
}

/// Text recognition engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Path to the tesseract executable
    pub tesseract_path: PathBuf,
    pub language: String,
    /// `--oem` value (default: 3, whatever the engine supports)
    pub engine_mode: u8,
}

/// Preprocessing applied before verification OCR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    pub contrast: f32,
    pub sharpness: f32,
    /// Integer upscale factor before binarization
    pub upscale: u32,
    /// Luminance below this becomes black, the rest white
    pub threshold: u8,
    /// Characters of recognized text kept for a failure message
    pub snippet_len: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("sheet-music"),
            output_dir: PathBuf::from("public/sheet-music/cropped"),
            report_path: PathBuf::from("public/sheet-music-verification.html"),
            web_prefix: "/sheet-music/cropped".to_string(),
            max_width: 800,
            jpeg_quality: 75,
            crop_contrast: 1.1,
            margin_left: 0.03,
            margin_right: 0.97,
            ocr: OcrConfig::default(),
            verify: VerifyConfig::default(),
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        let tesseract_path = if cfg!(windows) {
            PathBuf::from(r"C:\Program Files\Tesseract-OCR\tesseract.exe")
        } else {
            PathBuf::from("tesseract")
        };
        Self {
            tesseract_path,
            language: "eng".to_string(),
            engine_mode: 3,
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            contrast: 2.0,
            sharpness: 2.0,
            upscale: 2,
            threshold: 180,
            snippet_len: 80,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if !(1..=100).contains(&self.jpeg_quality) {
            return invalid(format!("jpeg_quality {} not in 1..=100", self.jpeg_quality));
        }
        if self.max_width == 0 {
            return invalid("max_width must be positive".to_string());
        }
        if !(1..=MAX_UPSCALE).contains(&self.verify.upscale) {
            return invalid(format!(
                "verify.upscale {} not in 1..={MAX_UPSCALE}",
                self.verify.upscale
            ));
        }
        if !(0.0..=1.0).contains(&self.margin_left)
            || !(0.0..=1.0).contains(&self.margin_right)
            || self.margin_right <= self.margin_left
        {
            return invalid(format!(
                "margins {}..{} must satisfy 0 <= left < right <= 1",
                self.margin_left, self.margin_right
            ));
        }
        let factors = [self.crop_contrast, self.verify.contrast, self.verify.sharpness];
        if factors.iter().any(|f| !f.is_finite() || *f < 0.0) {
            return invalid("enhancement factors must be finite and not negative".to_string());
        }
        Ok(())
    }

    /// Path of the cropped image for a file name inside `output_dir`
    pub fn artifact_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    /// URL the report uses for a cropped image
    pub fn web_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.web_prefix.trim_end_matches('/'), file_name)
    }
}
