//! Extraction options and heuristic thresholds.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Empirically tuned constants for one exam template.
///
/// Every field has a default, so a JSON file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Glyphs within `ratio * dominant size` of a line's anchor top join that line.
    pub line_tolerance_ratio: f32,

    /// Glyphs smaller than `ratio * dominant size` are script candidates.
    pub script_size_ratio: f32,

    /// Baseline delta against the previous glyph below which a candidate is superscript.
    pub superscript_shift: f32,

    /// Horizontal gap between glyphs that counts as a word break.
    pub word_gap: f32,

    /// Resolution of rendered figures, in dots per inch.
    pub render_dpi: u32,

    /// Number of questions in the template.
    pub question_count: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            line_tolerance_ratio: 0.5,
            script_size_ratio: 0.85,
            superscript_shift: -3.5,
            word_gap: 2.0,
            render_dpi: 300,
            question_count: 80,
        }
    }
}

impl Thresholds {
    /// Parse thresholds from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let thresholds: Thresholds =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Load thresholds from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject values that would make the heuristics meaningless.
    pub fn validate(&self) -> Result<()> {
        if !(self.line_tolerance_ratio > 0.0) {
            return Err(Error::Config(
                "line_tolerance_ratio must be positive".to_string(),
            ));
        }
        if !(self.script_size_ratio > 0.0 && self.script_size_ratio <= 1.0) {
            return Err(Error::Config(
                "script_size_ratio must be in (0, 1]".to_string(),
            ));
        }
        if self.word_gap < 0.0 {
            return Err(Error::Config("word_gap must not be negative".to_string()));
        }
        if self.render_dpi == 0 {
            return Err(Error::Config("render_dpi must be positive".to_string()));
        }
        if self.question_count == 0 {
            return Err(Error::Config("question_count must be positive".to_string()));
        }
        Ok(())
    }
}

/// Error handling mode during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Fail on unreadable page content
    #[default]
    Strict,
    /// Treat unreadable pages as empty and continue
    Lenient,
}

/// Page selection (1-indexed).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelection {
    /// All pages
    #[default]
    All,
    /// A range of pages (inclusive)
    Range(RangeInclusive<u32>),
    /// Specific pages
    Pages(Vec<u32>),
    /// Several ranges, sorted and non-overlapping
    Ranges(Vec<RangeInclusive<u32>>),
}

impl PageSelection {
    /// Check if a page number should be included.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
            PageSelection::Ranges(ranges) => ranges.iter().any(|r| r.contains(&page)),
        }
    }

    /// Parse a page selection string (e.g., "1-10", "1,3,5,7-10").
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        let parse_page = |p: &str| -> Result<u32> {
            p.trim()
                .parse()
                .map_err(|_| Error::Config(format!("Invalid page number: {:?}", p.trim())))
        };

        if let Some((start, end)) = s.split_once('-') {
            if !s.contains(',') {
                return Ok(PageSelection::Range(parse_page(start)?..=parse_page(end)?));
            }
        }

        let mut ranges = Vec::new();
        for part in s.split(',') {
            match part.split_once('-') {
                Some((start, end)) => ranges.push(parse_page(start)?..=parse_page(end)?),
                None => {
                    let page = parse_page(part)?;
                    ranges.push(page..=page);
                }
            }
        }
        ranges.retain(|r| !r.is_empty());
        ranges.sort_unstable_by_key(|r| (*r.start(), *r.end()));

        // Merge overlapping and adjacent ranges
        let mut merged: Vec<RangeInclusive<u32>> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if *range.start() <= last.end().saturating_add(1) => {
                    if range.end() > last.end() {
                        *last = *last.start()..=*range.end();
                    }
                }
                _ => merged.push(range),
            }
        }

        if merged.iter().all(|r| r.start() == r.end()) {
            Ok(PageSelection::Pages(merged.iter().map(|r| *r.start()).collect()))
        } else {
            Ok(PageSelection::Ranges(merged))
        }
    }
}

/// Options for a full extraction run.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Heuristic thresholds
    pub thresholds: Thresholds,

    /// Error handling mode
    pub error_mode: ErrorMode,

    /// Directory for rendered figures; figures are skipped when unset
    pub figure_dir: Option<PathBuf>,

    /// Which pages of the question document to process
    pub pages: PageSelection,
}

impl ExtractOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set thresholds.
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Enable lenient mode (skip unreadable pages).
    pub fn lenient(mut self) -> Self {
        self.error_mode = ErrorMode::Lenient;
        self
    }

    /// Render figures into the given directory.
    pub fn with_figure_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.figure_dir = Some(dir.into());
        self
    }

    /// Set page selection for the question document.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let t = Thresholds::default();
        assert_eq!(t.line_tolerance_ratio, 0.5);
        assert_eq!(t.script_size_ratio, 0.85);
        assert_eq!(t.superscript_shift, -3.5);
        assert_eq!(t.word_gap, 2.0);
        assert_eq!(t.question_count, 80);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_thresholds_partial_json() {
        let t = Thresholds::from_json_str(r#"{"word_gap": 1.5, "question_count": 40}"#).unwrap();
        assert_eq!(t.word_gap, 1.5);
        assert_eq!(t.question_count, 40);
        assert_eq!(t.script_size_ratio, 0.85);
    }

    #[test]
    fn test_thresholds_rejects_invalid() {
        assert!(matches!(
            Thresholds::from_json_str(r#"{"script_size_ratio": 1.5}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Thresholds::from_json_str("not json"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_extract_options_builder() {
        let options = ExtractOptions::new()
            .lenient()
            .with_figure_dir("figures")
            .with_pages(PageSelection::Range(1..=2));

        assert_eq!(options.error_mode, ErrorMode::Lenient);
        assert_eq!(options.figure_dir, Some(PathBuf::from("figures")));
        assert!(options.pages.includes(2));
        assert!(!options.pages.includes(3));
    }

    #[test]
    fn test_page_selection_parse() {
        assert_eq!(PageSelection::parse("all").unwrap(), PageSelection::All);
        assert_eq!(
            PageSelection::parse("2-4").unwrap(),
            PageSelection::Range(2..=4)
        );
        assert_eq!(
            PageSelection::parse("7,1,3,3").unwrap(),
            PageSelection::Pages(vec![1, 3, 7])
        );
        assert_eq!(
            PageSelection::parse("1,3,5-7,3,8").unwrap(),
            PageSelection::Ranges(vec![1..=1, 3..=3, 5..=8])
        );
        assert!(PageSelection::parse("x").is_err());
    }

    #[test]
    fn test_page_selection_wide_ranges_stay_compact() {
        let selection = PageSelection::parse("1-4000000000,2").unwrap();
        assert_eq!(selection, PageSelection::Ranges(vec![1..=4_000_000_000]));
        assert!(selection.includes(2));
        assert!(selection.includes(3_999_999_999));
        assert!(!selection.includes(4_000_000_001));

        let selection = PageSelection::parse("10-20,0-4294967295").unwrap();
        assert!(selection.includes(u32::MAX));
        assert!(PageSelection::parse("5-3,9").unwrap().includes(9));
        assert!(!PageSelection::parse("5-3,9").unwrap().includes(4));
    }
}
