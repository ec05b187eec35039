//! End-to-end runs of the pipeline against the built-in catalog

use image::{DynamicImage, GrayImage, ImageBuffer, Rgb};
use sheet_pipeline::crop::Cropper;
use sheet_pipeline::ocr::{PageSegMode, TextRecognizer};
use sheet_pipeline::report::{ImageSource, ReportGenerator};
use sheet_pipeline::verify::Verifier;
use sheet_pipeline::{
    Catalog, CropWindow, ExpectedLabel, Identifier, PageRegions, PipelineConfig, RegionMapping,
    VerificationOutcome,
};
use std::path::Path;

struct Silent;

impl TextRecognizer for Silent {
    fn recognize(&self, _image: &GrayImage, _mode: PageSegMode) -> sheet_pipeline::Result<String> {
        Ok(String::new())
    }
}

fn config_in(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        source_dir: dir.join("sheet-music"),
        output_dir: dir.join("public").join("cropped"),
        report_path: dir.join("public").join("report.html"),
        ..PipelineConfig::default()
    }
}

/// A photograph-sized page with some structure so JPEG output is non-trivial
fn write_page(config: &PipelineConfig, name: &str) {
    std::fs::create_dir_all(&config.source_dir).unwrap();
    let page = ImageBuffer::from_fn(1600, 2000, |x, y| {
        let ink = (y / 40) % 3 == 0 && x > 100;
        if ink {
            Rgb([20u8, 20, 20])
        } else {
            Rgb([240, 238, 230])
        }
    });
    DynamicImage::ImageRgb8(page)
        .save(config.source_dir.join(name))
        .unwrap();
}

#[test]
fn crops_i4_from_its_page() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let catalog = Catalog::builtin().unwrap();
    write_page(&config, "IMG20251212084759.jpg");

    let summary = Cropper::new(&config, &catalog).run().unwrap();

    let ids: Vec<_> = summary.artifacts().map(|a| a.id.to_string()).collect();
    assert_eq!(ids, ["I-4", "I-5", "I-6"]);
    assert_eq!(summary.skipped().count(), 12);

    let i4 = config.output_dir.join("i_4.jpg");
    let written = image::open(&i4).unwrap();
    assert_eq!(written.width(), 800);
}

#[test]
fn rerun_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let catalog = Catalog::builtin().unwrap();
    write_page(&config, "IMG20251212084852.jpg");

    let first = Cropper::new(&config, &catalog).run().unwrap();
    let first_bytes = std::fs::read(config.output_dir.join("vi_1.jpg")).unwrap();
    let second = Cropper::new(&config, &catalog).run().unwrap();
    let second_bytes = std::fs::read(config.output_dir.join("vi_1.jpg")).unwrap();

    let hashes = |s: &sheet_pipeline::crop::CropSummary| {
        s.artifacts()
            .map(|a| a.content_hash.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(hashes(&first), hashes(&second));
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn empty_output_dir_fails_every_label() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let catalog = Catalog::builtin().unwrap();

    let report = Verifier::new(&config, &catalog, &Silent).verify_all();

    assert_eq!(report.results.len(), 42);
    assert!(report
        .results
        .iter()
        .all(|r| matches!(r.outcome, VerificationOutcome::Missing { .. })));
    assert_eq!(report.passed().count(), 0);
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn report_without_images_has_a_placeholder_per_label() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let catalog = Catalog::builtin().unwrap();

    let stats = ReportGenerator::new(&config, &catalog, ImageSource::WebPath)
        .write()
        .unwrap();
    assert_eq!((stats.cards, stats.missing), (42, 42));

    let html = std::fs::read_to_string(&config.report_path).unwrap();
    assert_eq!(html.matches(r#"<div class="file-missing">"#).count(), 42);
    assert!(html.contains("FILE NOT FOUND: i_1.jpg"));
    assert!(html.contains("Expected: Ab Major Scale"));
    assert!(html.contains("/ 42</div>"));
}

#[test]
fn unmatched_labels_and_regions_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    // III-9 is cropped but never checked; VI-2 is checked but never cropped
    let catalog = Catalog::new(
        vec![PageRegions {
            source: "page.jpg".to_string(),
            regions: vec![
                RegionMapping {
                    id: "III-1".parse().unwrap(),
                    window: CropWindow::rows(0.0, 0.5),
                },
                RegionMapping {
                    id: "III-9".parse().unwrap(),
                    window: CropWindow::rows(0.5, 1.0),
                },
            ],
        }],
        vec![
            ExpectedLabel {
                id: "III-1".parse().unwrap(),
                title: "C Major Scale 3rds".to_string(),
                keywords: vec!["3rd".to_string()],
            },
            ExpectedLabel {
                id: "VI-2".parse().unwrap(),
                title: "Double Stops 6ths".to_string(),
                keywords: vec!["6th".to_string()],
            },
        ],
    )
    .unwrap();

    let consistency = catalog.consistency();
    assert_eq!(consistency.unlabeled, vec!["III-9".parse::<Identifier>().unwrap()]);
    assert_eq!(consistency.unmapped, vec!["VI-2".parse::<Identifier>().unwrap()]);

    write_page(&config, "page.jpg");
    let summary = Cropper::new(&config, &catalog).run().unwrap();
    assert_eq!(summary.artifacts().count(), 2);

    let report = Verifier::new(&config, &catalog, &Silent).verify_all();
    let checked: Vec<_> = report.results.iter().map(|r| r.id.to_string()).collect();
    assert_eq!(checked, ["III-1", "VI-2"]);

    let (html, stats) = ReportGenerator::new(&config, &catalog, ImageSource::WebPath)
        .render()
        .unwrap();
    assert_eq!(stats.cards, 2);
    assert!(!html.contains("III-9"));
}
