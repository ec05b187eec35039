//! Static HTML review page
//!
//! One card per expected label with the cropped image (or a placeholder)
//! and correct/wrong buttons. Marks live in a plain JS object for as long
//! as the tab is open; nothing is submitted or stored.

use crate::catalog::Catalog;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use base64::{engine::general_purpose, Engine as _};
use std::fmt::Write as _;
use std::path::Path;

/// How cropped images are referenced from the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSource {
    /// `<img src>` under the configured web prefix
    #[default]
    WebPath,
    /// Inline `data:` URI, so the page works straight from disk
    Embedded,
}

/// Counts for what went into a rendered report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportStats {
    pub cards: usize,
    pub missing: usize,
}

/// Minimal HTML escaping for text and attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Sheet Music Verification Report</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 1200px; margin: 0 auto; padding: 20px; background: #1a1a2e; color: white; }
        h1 { text-align: center; color: #818cf8; }
        .instructions { background: #2d2d44; padding: 15px; border-radius: 10px; margin-bottom: 20px; }
        .grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(350px, 1fr)); gap: 20px; }
        .card { background: #2d2d44; border-radius: 10px; overflow: hidden; border: 2px solid transparent; }
        .card-header { padding: 15px; background: #3d3d5c; display: flex; justify-content: space-between; align-items: center; }
        .question-id { font-weight: bold; color: #818cf8; font-size: 1.2em; }
        .expected-title { color: #a5b4fc; }
        .card-body { padding: 10px; }
        .card-body img { width: 100%; height: auto; background: white; border-radius: 5px; }
        .status { margin-top: 10px; padding: 10px; border-radius: 5px; display: flex; gap: 10px; }
        .btn { padding: 8px 16px; border: none; border-radius: 5px; cursor: pointer; font-weight: bold; color: white; }
        .btn:hover { opacity: 0.9; }
        .btn-correct { background: #22c55e; }
        .btn-wrong { background: #ef4444; }
        .file-missing { background: #ef4444; padding: 20px; text-align: center; color: white; }
        .summary { position: fixed; bottom: 20px; right: 20px; background: #3d3d5c; padding: 15px 25px; border-radius: 10px; box-shadow: 0 4px 20px rgba(0,0,0,0.5); }
        .summary-count { font-size: 1.5em; font-weight: bold; }
        .correct { color: #22c55e; }
        .wrong { color: #ef4444; }
    </style>
</head>
<body>
    <h1>Sheet Music Verification Report</h1>

    <div class="instructions">
        <h3>Instructions:</h3>
        <p>For each card below, verify that the sheet music image matches the expected scale/arpeggio title.</p>
        <p>Look for the scale name written on the sheet music (usually at the start of the first line).</p>
        <p>Click &#10003; Correct or &#10007; Wrong to mark each one. Marks are lost when the page is closed.</p>
    </div>

    <div class="grid">
"#;

const SCRIPT: &str = r#"
    <script>
        const results = {};

        function updateSummary() {
            const values = Object.values(results);
            document.getElementById('verified-count').textContent = values.length;
            document.getElementById('correct-count').textContent = values.filter(r => r === 'correct').length;
            document.getElementById('wrong-count').textContent = values.filter(r => r === 'wrong').length;
        }

        function mark(qid, result, color) {
            results[qid] = result;
            document.getElementById('card-' + qid).style.borderColor = color;
            updateSummary();
        }

        function markCorrect(qid) {
            mark(qid, 'correct', '#22c55e');
        }

        function markWrong(qid) {
            mark(qid, 'wrong', '#ef4444');
            alert('Please note: ' + qid + ' is marked as WRONG. The page mapping needs to be corrected.');
        }
    </script>
</body>
</html>
"#;

pub struct ReportGenerator<'a> {
    config: &'a PipelineConfig,
    catalog: &'a Catalog,
    images: ImageSource,
}

impl<'a> ReportGenerator<'a> {
    pub fn new(config: &'a PipelineConfig, catalog: &'a Catalog, images: ImageSource) -> Self {
        Self {
            config,
            catalog,
            images,
        }
    }

    /// Render the whole document
    ///
    /// Every label gets a card whether or not its image exists; regions with
    /// no label get none.
    pub fn render(&self) -> Result<(String, ReportStats)> {
        self.catalog.consistency().log_warnings();

        let mut html = String::from(HEAD);
        let mut stats = ReportStats::default();

        for label in self.catalog.labels() {
            let file_name = label.id.file_name();
            let path = self.config.artifact_path(&file_name);
            let qid = escape_html(label.id.as_str());
            let title = escape_html(&label.title);

            let image_html = if path.exists() {
                let src = match self.images {
                    ImageSource::WebPath => escape_html(&self.config.web_path(&file_name)),
                    ImageSource::Embedded => data_uri(&path)?,
                };
                format!(r#"<img src="{src}" alt="{title}">"#)
            } else {
                stats.missing += 1;
                format!(
                    r#"<div class="file-missing">FILE NOT FOUND: {}</div>"#,
                    escape_html(&file_name)
                )
            };

            // Writing to a String cannot fail
            let _ = write!(
                html,
                r#"
        <div class="card" id="card-{qid}" data-qid="{qid}">
            <div class="card-header">
                <span class="question-id">{qid}</span>
                <span class="expected-title">Expected: {title}</span>
            </div>
            <div class="card-body">
                {image_html}
                <div class="status">
                    <button class="btn btn-correct" onclick="markCorrect('{qid}')">&#10003; Correct</button>
                    <button class="btn btn-wrong" onclick="markWrong('{qid}')">&#10007; Wrong</button>
                </div>
            </div>
        </div>
"#
            );
            stats.cards += 1;
        }

        let _ = write!(
            html,
            r#"
    </div>

    <div class="summary">
        <div>Verified: <span id="verified-count" class="summary-count">0</span> / {total}</div>
        <div><span class="correct">&#10003;</span> <span id="correct-count">0</span> | <span class="wrong">&#10007;</span> <span id="wrong-count">0</span></div>
    </div>
"#,
            total = stats.cards
        );
        html.push_str(SCRIPT);

        Ok((html, stats))
    }

    /// Render and write to `report_path`, creating parent directories
    pub fn write(&self) -> Result<ReportStats> {
        let (html, stats) = self.render()?;
        let path = &self.config.report_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        std::fs::write(path, html).map_err(|e| PipelineError::io(path, e))?;
        Ok(stats)
    }
}

fn data_uri(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(format!(
        "data:image/jpeg;base64,{}",
        general_purpose::STANDARD.encode(bytes)
    ))
}
