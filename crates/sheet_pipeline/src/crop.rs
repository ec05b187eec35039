//! Cropper/compressor
//!
//! For every page in the catalog: load, auto-rotate, cut each region,
//! cap its width, boost contrast a little and write a JPEG named after the
//! identifier. A page that is missing or unreadable is reported and skipped;
//! the rest of the run continues.

use crate::catalog::Catalog;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::preprocess::{crop, enhance_contrast_rgb, fit_width, load_oriented, pixel_box};
use crate::types::{CroppedArtifact, Identifier, PageRegions, RegionMapping};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;

/// Why a source page produced no crops
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotFound,
    /// The file exists but could not be decoded
    Undecodable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("file not found"),
            Self::Undecodable(e) => f.write_str(e),
        }
    }
}

/// What happened to one source page
#[derive(Debug)]
pub enum PageOutcome {
    Cropped {
        source: PathBuf,
        width: u32,
        height: u32,
        artifacts: Vec<CroppedArtifact>,
        /// Regions that could not be written, with the reason
        failures: Vec<(Identifier, String)>,
    },
    Skipped {
        source: PathBuf,
        reason: SkipReason,
    },
}

/// Result of a full cropping run
#[derive(Debug, Default)]
pub struct CropSummary {
    pub pages: Vec<PageOutcome>,
}

impl CropSummary {
    pub fn artifacts(&self) -> impl Iterator<Item = &CroppedArtifact> {
        self.pages.iter().flat_map(|p| match p {
            PageOutcome::Cropped { artifacts, .. } => artifacts.as_slice(),
            PageOutcome::Skipped { .. } => &[][..],
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&PathBuf, &SkipReason)> {
        self.pages.iter().filter_map(|p| match p {
            PageOutcome::Skipped { source, reason } => Some((source, reason)),
            PageOutcome::Cropped { .. } => None,
        })
    }

    pub fn total_bytes(&self) -> u64 {
        self.artifacts().map(|a| a.size_bytes).sum()
    }
}

/// SHA-256 of a byte slice as a 64-character lowercase hex string
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Cuts and compresses regions according to a catalog
pub struct Cropper<'a> {
    config: &'a PipelineConfig,
    catalog: &'a Catalog,
}

impl<'a> Cropper<'a> {
    pub fn new(config: &'a PipelineConfig, catalog: &'a Catalog) -> Self {
        Self { config, catalog }
    }

    /// Process every page of the catalog in order
    ///
    /// Only failure to create the output directory aborts the run.
    pub fn run(&self) -> Result<CropSummary> {
        std::fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| PipelineError::io(&self.config.output_dir, e))?;

        let mut summary = CropSummary::default();
        for page in self.catalog.pages() {
            let outcome = self.process_page(page);
            if let PageOutcome::Skipped { source, reason } = &outcome {
                tracing::warn!(source = %source.display(), %reason, "page skipped");
            }
            summary.pages.push(outcome);
        }
        Ok(summary)
    }

    /// Crop all regions of one page; never fails, skips instead
    pub fn process_page(&self, page: &PageRegions) -> PageOutcome {
        let source = self.config.source_dir.join(&page.source);

        if !source.exists() {
            return PageOutcome::Skipped {
                source,
                reason: SkipReason::NotFound,
            };
        }

        let image = match load_oriented(&source) {
            Ok((image, rotation)) => {
                tracing::info!(
                    source = %source.display(),
                    width = image.width(),
                    height = image.height(),
                    ?rotation,
                    "page loaded"
                );
                image
            }
            Err(e) => {
                return PageOutcome::Skipped {
                    source,
                    reason: SkipReason::Undecodable(e.to_string()),
                };
            }
        };

        let mut artifacts = Vec::with_capacity(page.regions.len());
        let mut failures = Vec::new();
        for region in &page.regions {
            match self.crop_region(&image, region) {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => {
                    tracing::error!(id = %region.id, error = %e, "region not written");
                    failures.push((region.id.clone(), e.to_string()));
                }
            }
        }

        PageOutcome::Cropped {
            width: image.width(),
            height: image.height(),
            source,
            artifacts,
            failures,
        }
    }

    /// Crop, resize, enhance, encode and write one region
    pub fn crop_region(
        &self,
        page: &DynamicImage,
        region: &RegionMapping,
    ) -> Result<CroppedArtifact> {
        let rgb = self.transform(page, region)?;
        let encoded = self.encode(&rgb, region)?;

        let path = self.config.artifact_path(&region.id.file_name());
        std::fs::write(&path, &encoded).map_err(|e| PipelineError::io(&path, e))?;

        Ok(CroppedArtifact {
            id: region.id.clone(),
            width: rgb.width(),
            height: rgb.height(),
            size_bytes: encoded.len() as u64,
            content_hash: content_hash(&encoded),
            path,
        })
    }

    /// The pixel part of the pipeline, without any I/O
    pub fn transform(&self, page: &DynamicImage, region: &RegionMapping) -> Result<RgbImage> {
        let window = region
            .window
            .resolve(self.config.margin_left, self.config.margin_right);
        let rect = pixel_box(page.width(), page.height(), window).ok_or_else(|| {
            PipelineError::InvalidCatalog(format!(
                "{} selects an empty area of a {}x{} page",
                region.id,
                page.width(),
                page.height()
            ))
        })?;

        let cropped = fit_width(crop(page, rect), self.config.max_width);
        Ok(enhance_contrast_rgb(&cropped.to_rgb8(), self.config.crop_contrast))
    }

    fn encode(&self, rgb: &RgbImage, region: &RegionMapping) -> Result<Vec<u8>> {
        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, self.config.jpeg_quality)
            .encode_image(rgb)
            .map_err(|e| PipelineError::image(region.id.file_name(), e))?;
        Ok(encoded)
    }
}
