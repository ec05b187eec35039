//! OCR module
//!
//! Text recognition is a black box behind [`TextRecognizer`]. The default
//! engine runs the Tesseract executable from the configured path; with the
//! `embedded-ocr` feature the same contract is served through libtesseract
//! (via leptess).
//!
//! Callers treat a failed attempt as "no text" rather than an error, so
//! implementations only need to report failures, not recover from them.

use crate::config::OcrConfig;
use crate::error::{PipelineError, Result};
use image::GrayImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

/// Tesseract page segmentation modes used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageSegMode {
    /// `--psm 3`: fully automatic page segmentation
    FullyAutomatic,
    /// `--psm 6`: a single uniform block of text
    SingleBlock,
    /// `--psm 11`: sparse text, as much as possible in no particular order
    SparseText,
}

impl PageSegMode {
    pub fn as_psm(self) -> u8 {
        match self {
            Self::FullyAutomatic => 3,
            Self::SingleBlock => 6,
            Self::SparseText => 11,
        }
    }
}

/// Anything that can turn a grayscale image into text
pub trait TextRecognizer {
    fn recognize(&self, image: &GrayImage, mode: PageSegMode) -> Result<String>;
}

/// Recognize and swallow failures as empty text
///
/// Every recognition attempt in the pipeline is best-effort; the failure is
/// only logged.
pub fn recognize_or_empty<R: TextRecognizer + ?Sized>(
    recognizer: &R,
    image: &GrayImage,
    mode: PageSegMode,
) -> String {
    match recognizer.recognize(image, mode) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(psm = mode.as_psm(), error = %e, "recognition attempt failed");
            String::new()
        }
    }
}

/// Tesseract invoked as an external process
///
/// The image is handed over as a temporary PNG and the text is read from
/// stdout.
#[derive(Debug, Clone)]
pub struct TesseractCommand {
    executable: PathBuf,
    language: String,
    engine_mode: u8,
}

impl TesseractCommand {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            executable: config.tesseract_path.clone(),
            language: config.language.clone(),
            engine_mode: config.engine_mode,
        }
    }

    fn args(&self, input: &std::path::Path, mode: PageSegMode) -> Vec<std::ffi::OsString> {
        vec![
            input.as_os_str().to_owned(),
            "stdout".into(),
            "--psm".into(),
            mode.as_psm().to_string().into(),
            "--oem".into(),
            self.engine_mode.to_string().into(),
            "-l".into(),
            self.language.clone().into(),
        ]
    }
}

impl TextRecognizer for TesseractCommand {
    fn recognize(&self, image: &GrayImage, mode: PageSegMode) -> Result<String> {
        let input = NamedTempFile::with_suffix(".png")
            .map_err(|e| PipelineError::io(std::env::temp_dir(), e))?;
        image
            .save_with_format(input.path(), image::ImageFormat::Png)
            .map_err(|e| PipelineError::image(input.path(), e))?;

        let output = Command::new(&self.executable)
            .args(self.args(input.path(), mode))
            .output()
            .map_err(|e| {
                PipelineError::Recognition(format!(
                    "failed to run {}: {e}. Is Tesseract installed?",
                    self.executable.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Recognition(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Tesseract linked in-process through leptess
#[cfg(feature = "embedded-ocr")]
#[derive(Debug, Clone)]
pub struct EmbeddedTesseract {
    language: String,
}

#[cfg(feature = "embedded-ocr")]
impl EmbeddedTesseract {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            language: config.language.clone(),
        }
    }
}

#[cfg(feature = "embedded-ocr")]
impl TextRecognizer for EmbeddedTesseract {
    fn recognize(&self, image: &GrayImage, mode: PageSegMode) -> Result<String> {
        use leptess::{LepTess, Variable};

        let mut tesseract = LepTess::new(None, &self.language).map_err(|e| {
            PipelineError::Recognition(format!(
                "failed to initialize Tesseract: {e}. Is Tesseract installed?"
            ))
        })?;
        tesseract
            .set_variable(Variable::TesseditPagesegMode, &mode.as_psm().to_string())
            .map_err(|_| PipelineError::Recognition("failed to set page segmentation mode".into()))?;

        // leptess wants an encoded image, not raw pixels
        let mut png_bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
            .map_err(|e| PipelineError::Recognition(format!("failed to encode image as PNG: {e}")))?;

        tesseract
            .set_image_from_mem(&png_bytes)
            .map_err(|_| PipelineError::Recognition("failed to load image into Tesseract".into()))?;
        tesseract
            .get_utf8_text()
            .map_err(|e| PipelineError::Recognition(format!("failed to extract text: {e}")))
    }
}

/// Build the recognizer selected at compile time
pub fn default_recognizer(config: &OcrConfig) -> Box<dyn TextRecognizer> {
    #[cfg(feature = "embedded-ocr")]
    let recognizer: Box<dyn TextRecognizer> = Box::new(EmbeddedTesseract::new(config));
    #[cfg(not(feature = "embedded-ocr"))]
    let recognizer: Box<dyn TextRecognizer> = Box::new(TesseractCommand::new(config));
    recognizer
}
