//! Region table and expected labels
//!
//! The catalog is plain data: which fractional windows of which source page
//! hold which exercise, and what each exercise should be called. It ships
//! compiled in from `data/catalog.json` and can be replaced by any JSON file
//! of the same shape, so recalibrating a crop never touches code.
//!
//! The region table and the label table are keyed by the same identifiers
//! but are not required to agree. [`Catalog::consistency`] reports the
//! difference instead of rejecting it, so a half-built catalog still works.

use crate::error::{PipelineError, Result};
use crate::types::{ExpectedLabel, Identifier, PageRegions, RegionMapping};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pages: Vec<PageRegions>,
    #[serde(default)]
    labels: Vec<ExpectedLabel>,
}

/// Identifiers present in only one of the two tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Mapped to a page region but without an expected label
    pub unlabeled: Vec<Identifier>,
    /// Labelled but not mapped to any page region
    pub unmapped: Vec<Identifier>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.unlabeled.is_empty() && self.unmapped.is_empty()
    }

    /// Emit one warning per mismatched identifier
    pub fn log_warnings(&self) {
        for id in &self.unlabeled {
            tracing::warn!(%id, "region has no expected label; it will not be verified or reported");
        }
        for id in &self.unmapped {
            tracing::warn!(%id, "label has no region mapping; no crop will ever be produced for it");
        }
    }
}

impl Catalog {
    /// Build and validate a catalog from in-memory tables
    pub fn new(pages: Vec<PageRegions>, labels: Vec<ExpectedLabel>) -> Result<Self> {
        let catalog = Self { pages, labels };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The 13-page, 42-exercise table compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_CATALOG)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_json_str(&json)
    }

    /// Check window ranges and identifier uniqueness in both tables
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for page in &self.pages {
            if page.source.trim().is_empty() {
                return Err(PipelineError::InvalidCatalog(
                    "page with empty source file name".to_string(),
                ));
            }
            for region in &page.regions {
                region.window.check().map_err(|reason| {
                    PipelineError::InvalidCatalog(format!("{} on {}: {reason}", region.id, page.source))
                })?;
                if !seen.insert(&region.id) {
                    return Err(PipelineError::InvalidCatalog(format!(
                        "identifier {} is mapped more than once",
                        region.id
                    )));
                }
            }
        }

        let mut seen = HashSet::new();
        for label in &self.labels {
            if !seen.insert(&label.id) {
                return Err(PipelineError::InvalidCatalog(format!(
                    "identifier {} is labelled more than once",
                    label.id
                )));
            }
        }
        Ok(())
    }

    pub fn pages(&self) -> &[PageRegions] {
        &self.pages
    }

    /// Ordered regions for one source page; empty for an unknown page
    pub fn regions_for(&self, source: &str) -> &[RegionMapping] {
        self.pages
            .iter()
            .find(|p| p.source == source)
            .map(|p| p.regions.as_slice())
            .unwrap_or(&[])
    }

    pub fn regions(&self) -> impl Iterator<Item = &RegionMapping> {
        self.pages.iter().flat_map(|p| p.regions.iter())
    }

    pub fn labels(&self) -> &[ExpectedLabel] {
        &self.labels
    }

    pub fn label(&self, id: &Identifier) -> Option<&ExpectedLabel> {
        self.labels.iter().find(|l| &l.id == id)
    }

    pub fn consistency(&self) -> ConsistencyReport {
        let mapped: BTreeSet<&Identifier> = self.regions().map(|r| &r.id).collect();
        let labelled: BTreeSet<&Identifier> = self.labels.iter().map(|l| &l.id).collect();

        ConsistencyReport {
            unlabeled: mapped.difference(&labelled).map(|id| (*id).clone()).collect(),
            unmapped: labelled.difference(&mapped).map(|id| (*id).clone()).collect(),
        }
    }
}
