//! sheetcrop CLI
//!
//! Command-line interface for cutting photographed sheet-music pages into
//! one image per exercise, checking them with OCR and building a review page
//!
//! Copyright (c) 2025 Michael A Wright

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sheet_pipeline::analyze::{list_source_pages, ScaleAnalyzer};
use sheet_pipeline::crop::{CropSummary, Cropper, PageOutcome, SkipReason};
use sheet_pipeline::matching::snippet;
use sheet_pipeline::ocr::default_recognizer;
use sheet_pipeline::report::{ImageSource, ReportGenerator};
use sheet_pipeline::verify::{VerificationReport, Verifier};
use sheet_pipeline::{Catalog, Identifier, PipelineConfig, VerificationOutcome};
use std::io::Write;
use std::path::PathBuf;

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nbuilt: ",
    env!("BUILT_TIME_UTC"),
    "\nhost: ",
    env!("BUILT_HOST")
);

const RULE: &str = "======================================================================";

#[derive(Parser)]
#[command(name = "sheetcrop")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Crop, verify and review scanned sheet-music exercises", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON pipeline configuration; missing fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON region/label catalog replacing the built-in one
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Directory holding the source photographs
    #[arg(long, global = true)]
    source_dir: Option<PathBuf>,

    /// Directory for the cropped JPEGs
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Path to the tesseract executable
    #[arg(long, global = true)]
    tesseract: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Cut every mapped region out of its source page
    Crop,

    /// OCR candidate regions of each source page and list scale names found
    Analyze {
        /// Print JSON instead of a listing
        #[arg(long)]
        json: bool,
    },

    /// OCR every cropped image and check it against its expected label
    Verify {
        /// Show the raw extracted text for one identifier (e.g. I-4)
        id: Option<String>,
    },

    /// Write the HTML review page
    Report {
        /// Inline images as data URIs so the page works without a server
        #[arg(long)]
        embed: bool,

        /// Output file (overrides the configured report path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(
        build_target = built_info::TARGET,
        rustc = built_info::RUSTC_VERSION,
        "sheetcrop {}",
        built_info::PKG_VERSION
    );

    let config = load_config(&cli)?;
    let catalog = match &cli.catalog {
        Some(path) => Catalog::load(path)
            .with_context(|| format!("Failed to load catalog {}", path.display()))?,
        None => Catalog::builtin().context("Built-in catalog is invalid")?,
    };

    match cli.command {
        Commands::Crop => crop(&config, &catalog),
        Commands::Analyze { json } => analyze(&config, json),
        Commands::Verify { id: Some(id) } => verify_one(&config, &catalog, &id),
        Commands::Verify { id: None } => {
            let report = verify(&config, &catalog);
            std::io::stdout().flush().context("Failed to flush output")?;
            std::process::exit(report.exit_code());
        }
        Commands::Report { embed, output } => {
            let mut config = config;
            if let Some(output) = output {
                config.report_path = output;
            }
            report(&config, &catalog, embed)
        }
    }
}

/// Config file (if any), then individual flag overrides, then validation
fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(dir) = &cli.source_dir {
        config.source_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(path) = &cli.tesseract {
        config.ocr.tesseract_path = path.clone();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn crop(config: &PipelineConfig, catalog: &Catalog) -> Result<()> {
    println!("Sheet Music Cropping");
    println!("{}", &RULE[..50]);
    println!(
        "Max width: {}px, JPEG quality: {}",
        config.max_width, config.jpeg_quality
    );
    println!("{}", &RULE[..50]);

    let summary = Cropper::new(config, catalog)
        .run()
        .context("Cropping failed")?;
    print_crop_summary(config, &summary);
    Ok(())
}

fn print_crop_summary(config: &PipelineConfig, summary: &CropSummary) {
    for page in &summary.pages {
        match page {
            PageOutcome::Skipped { source, reason } => {
                println!("\nProcessing: {}", source.display());
                match reason {
                    SkipReason::NotFound => println!("  ERROR: File not found!"),
                    SkipReason::Undecodable(e) => println!("  ERROR: {e}"),
                }
            }
            PageOutcome::Cropped {
                source,
                width,
                height,
                artifacts,
                failures,
            } => {
                println!("\nProcessing: {}", source.display());
                println!("  Original size: {width}x{height}");
                for artifact in artifacts {
                    let file = artifact
                        .path
                        .file_name()
                        .map(|f| f.to_string_lossy())
                        .unwrap_or_default();
                    println!(
                        "  {}: {}x{} ({:.1}KB) -> {}",
                        artifact.id,
                        artifact.width,
                        artifact.height,
                        artifact.size_bytes as f64 / 1024.0,
                        file
                    );
                }
                for (id, reason) in failures {
                    println!("  {id}: ERROR: {reason}");
                }
            }
        }
    }

    println!("\n{}", &RULE[..50]);
    println!(
        "Created {} files, total size: {:.1}MB",
        summary.artifacts().count(),
        summary.total_bytes() as f64 / 1024.0 / 1024.0
    );
    println!("Output directory: {}", config.output_dir.display());

    let skipped: Vec<_> = summary.skipped().collect();
    if !skipped.is_empty() {
        println!("Skipped pages:");
        for (source, reason) in skipped {
            println!("  {} ({reason})", source.display());
        }
    }
}

fn analyze(config: &PipelineConfig, json: bool) -> Result<()> {
    let pages = list_source_pages(&config.source_dir)
        .with_context(|| format!("Cannot list {}", config.source_dir.display()))?;
    let recognizer = default_recognizer(&config.ocr);
    let analyzer = ScaleAnalyzer::new(recognizer.as_ref())?;

    if json {
        let mut analyses = Vec::with_capacity(pages.len());
        for path in &pages {
            match analyzer.analyze_file(path) {
                Ok(analysis) => analyses.push(analysis),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "page not analyzed"),
            }
        }
        println!("{}", serde_json::to_string_pretty(&analyses)?);
        return Ok(());
    }

    println!("Sheet Music Analysis - Identifying Scales via OCR");
    println!("{}", &RULE[..60]);
    println!("Found {} images to analyze", pages.len());

    for (i, path) in pages.iter().enumerate() {
        println!("\n[{}/{}]", i + 1, pages.len());
        let analysis = match analyzer.analyze_file(path) {
            Ok(analysis) => analysis,
            Err(e) => {
                println!("  ERROR: {e}");
                continue;
            }
        };

        println!("\n{}", &RULE[..60]);
        println!("Analyzing: {}", path.display());
        println!("Size: {}x{}", analysis.width, analysis.height);
        println!("{}", &RULE[..60]);

        for region in analysis.regions.iter().filter(|r| r.is_interesting()) {
            if let Some(error) = &region.error {
                println!("  {}: Error - {error}", region.name);
                continue;
            }
            println!("\n{}:", region.name);
            println!("  Found patterns: {}", region.found.join(", "));
            for line in &region.lines {
                println!("  Line: {line}");
            }
        }
    }

    println!("\n{}", &RULE[..60]);
    println!("Analysis complete!");
    println!("Use this information to update the region table in the catalog");
    Ok(())
}

fn verify(config: &PipelineConfig, catalog: &Catalog) -> VerificationReport {
    let recognizer = default_recognizer(&config.ocr);

    println!("{RULE}");
    println!("AUTOMATED SHEET MUSIC VERIFICATION");
    println!("{RULE}");

    let report = Verifier::new(config, catalog, recognizer.as_ref()).verify_all();
    for result in &report.results {
        match &result.outcome {
            VerificationOutcome::Missing { path } => {
                println!("\u{2717} {}: FILE NOT FOUND - {}", result.id, path.display());
            }
            VerificationOutcome::Passed { matched } => {
                println!("\u{2713} {}: PASS - Found: {}", result.id, matched.join(", "));
            }
            VerificationOutcome::Failed { snippet } => {
                println!(
                    "\u{2717} {}: FAIL - Expected {}, found: '{snippet}'",
                    result.id, result.expected
                );
            }
        }
    }

    let failed: Vec<_> = report.failed().collect();
    println!("\n{RULE}");
    println!(
        "RESULTS: {} PASSED, {} FAILED",
        report.passed().count(),
        failed.len()
    );
    println!("{RULE}");

    if !failed.is_empty() {
        println!("\nFAILED TESTS - These need manual review or remapping:");
        for result in failed {
            let found = match &result.outcome {
                VerificationOutcome::Failed { snippet: text } => snippet(text, 50),
                _ => "File not found".to_string(),
            };
            println!("  {}: expected '{}', got '{found}'", result.id, result.expected);
        }
    }

    report
}

fn verify_one(config: &PipelineConfig, catalog: &Catalog, id: &str) -> Result<()> {
    let id: Identifier = id.parse()?;
    let recognizer = default_recognizer(&config.ocr);
    let verifier = Verifier::new(config, catalog, recognizer.as_ref());

    println!("\nDetailed analysis of {id}");
    println!("{}", &RULE[..50]);

    let analysis = match verifier.analyze_one(&id) {
        Ok(analysis) => analysis,
        Err(e) => {
            println!("ERROR: {e}");
            return Ok(());
        }
    };

    println!("Extracted text:\n{}", analysis.text);
    if let Some(label) = &analysis.label {
        println!("\nExpected: {}", label.title);
        println!("Patterns: {:?}", label.keywords);
        println!("Matches: {:?}", analysis.matches);
    }
    Ok(())
}

fn report(config: &PipelineConfig, catalog: &Catalog, embed: bool) -> Result<()> {
    let images = if embed {
        ImageSource::Embedded
    } else {
        ImageSource::WebPath
    };
    let stats = ReportGenerator::new(config, catalog, images)
        .write()
        .with_context(|| format!("Failed to write {}", config.report_path.display()))?;

    println!(
        "Generated verification report: {}",
        config.report_path.display()
    );
    println!("{} cards, {} without an image", stats.cards, stats.missing);
    Ok(())
}
