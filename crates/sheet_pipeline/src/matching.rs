//! Keyword matching over recognized text
//!
//! Both policies here are heuristics. OCR on photographed sheet music is
//! noisy, so false positives (a lone "C" matching anywhere) and false
//! negatives (a garbled title) are expected. A pass means "probably the
//! right exercise", nothing stronger.

use crate::error::Result;
use regex::{Regex, RegexBuilder};

/// Fragments of `patterns` that occur in `text`, case-insensitively
///
/// Pure function of its inputs; order follows `patterns`.
pub fn matches<'a>(text: &str, patterns: &'a [String]) -> Vec<&'a str> {
    let haystack = text.to_lowercase();
    patterns
        .iter()
        .filter(|p| haystack.contains(&p.to_lowercase()))
        .map(String::as_str)
        .collect()
}

/// Verification policy: pass if any configured fragment appears anywhere
///
/// No weighting and no requirement that fragments co-occur.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyFragment;

impl AnyFragment {
    /// Matched fragments, or `None` when nothing matched
    pub fn evaluate(&self, text: &str, patterns: &[String]) -> Option<Vec<String>> {
        let found = matches(text, patterns);
        if found.is_empty() {
            None
        } else {
            Some(found.into_iter().map(str::to_string).collect())
        }
    }
}

/// Whitespace-collapsed prefix of `text`, at most `max_chars` characters
pub fn snippet(text: &str, max_chars: usize) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(max_chars)
        .collect()
}

/// Patterns for scale names and exercise types printed on the pages
const SCALE_PATTERNS: &[&str] = &[
    r"[Aa]b\s*[Mm]ajor",
    r"[Gg]#?\s*[Mm]inor",
    r"[Gg]b?\s*[Mm]inor",
    r"[Cc]\s*[Mm]ajor",
    r"[Cc]\s*[Mm]inor",
    r"[Dd]b?\s*[Mm]ajor",
    r"[Cc]#?\s*[Mm]inor",
    r"[Ee]b?\s*[Mm]ajor",
    r"[Ee]b?\s*[Mm]inor",
    r"[Ee]\s*[Mm]ajor",
    r"[Ee]\s*[Mm]inor",
    r"[Mm]elodic",
    r"[Hh]armonic",
    r"[Oo]ctaves?",
    r"3rds?",
    r"6ths?",
    r"[Dd]ominant",
    r"[Dd]iminished",
    r"[Cc]hromatic",
];

/// Case-insensitive regex set used by the scale analyzer
#[derive(Debug, Clone)]
pub struct ScalePatterns {
    patterns: Vec<Regex>,
}

impl ScalePatterns {
    pub fn new() -> Result<Self> {
        let patterns = SCALE_PATTERNS
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Every match of every pattern, pattern by pattern
    pub fn find_all(&self, text: &str) -> Vec<String> {
        self.patterns
            .iter()
            .flat_map(|re| re.find_iter(text).map(|m| m.as_str().to_string()))
            .collect()
    }

    /// Trimmed lines that contain at least one pattern
    pub fn matching_lines(&self, text: &str) -> Vec<String> {
        text.lines()
            .map(str::trim)
            .filter(|line| self.patterns.iter().any(|re| re.is_match(line)))
            .map(str::to_string)
            .collect()
    }
}
