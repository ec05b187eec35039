//! Core pipeline for sheetcrop
//!
//! This crate provides the data structures and processing logic for
//! cutting scanned sheet-music pages into one image per exercise,
//! checking the results with OCR, and rendering a review page.
//!
//! Data flows one way: the [`catalog`] maps source pages to regions,
//! [`crop`] writes one JPEG per region, and [`verify`] and [`report`]
//! read those JPEGs back. [`analyze`] is an offline helper for building
//! the catalog in the first place.

pub mod analyze;
pub mod catalog;
pub mod config;
pub mod crop;
pub mod error;
pub mod matching;
pub mod ocr;
pub mod preprocess;
pub mod report;
pub mod types;
pub mod verify;

pub use catalog::{Catalog, ConsistencyReport};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use types::*;
