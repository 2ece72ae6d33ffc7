//! Line reconstruction from unordered glyphs.
//!
//! Glyphs are clustered into lines by vertical proximity to a line anchor,
//! with the tolerance scaled by the page's dominant font size so that small-
//! and large-font pages behave the same.

use std::collections::BTreeMap;

use crate::model::{BBox, Glyph, Word};

use super::options::Thresholds;

/// A reconstructed text line.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Glyphs sorted by `x0`
    pub glyphs: Vec<Glyph>,
    /// Top of the glyph that opened the line
    pub anchor_top: f32,
}

impl Line {
    fn from_glyphs(mut glyphs: Vec<Glyph>, anchor_top: f32) -> Self {
        glyphs.sort_by(|a, b| a.x0.total_cmp(&b.x0));
        Self { glyphs, anchor_top }
    }

    /// Number of glyphs on the line.
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// Whether the line has no glyphs.
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Line text with a space wherever the gap between glyphs exceeds `word_gap`.
    pub fn plain_text(&self, word_gap: f32) -> String {
        let mut text = String::with_capacity(self.glyphs.len());
        let mut prev: Option<&Glyph> = None;
        for glyph in &self.glyphs {
            if let Some(p) = prev {
                if glyph.x0 - p.x1 > word_gap {
                    text.push(' ');
                }
            }
            text.push(glyph.text);
            prev = Some(glyph);
        }
        text
    }

    /// Split the line into words on blank glyphs and gaps wider than `word_gap`.
    pub fn words(&self, word_gap: f32) -> Vec<Word> {
        let mut words = Vec::new();
        let mut text = String::new();
        let mut bbox: Option<BBox> = None;
        let mut prev: Option<&Glyph> = None;

        for glyph in &self.glyphs {
            let gap_break = prev.is_some_and(|p| glyph.x0 - p.x1 > word_gap);
            if glyph.is_blank() || gap_break {
                if let Some(b) = bbox.take() {
                    words.push(Word {
                        text: std::mem::take(&mut text),
                        bbox: b,
                    });
                }
            }
            prev = Some(glyph);
            if glyph.is_blank() {
                continue;
            }
            text.push(glyph.text);
            bbox = Some(match bbox {
                Some(b) => b.union(&glyph.bbox()),
                None => glyph.bbox(),
            });
        }

        if let Some(b) = bbox {
            words.push(Word { text, bbox: b });
        }
        words
    }
}

/// The lines of one page together with the page's dominant glyph size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLines {
    /// Most frequent glyph size, `None` for a page without glyphs
    pub dominant_size: Option<f32>,
    /// Lines in top-to-bottom order
    pub lines: Vec<Line>,
}

impl PageLines {
    /// Plain page text, one line per reconstructed line.
    pub fn plain_text(&self, word_gap: f32) -> String {
        self.lines
            .iter()
            .map(|l| l.plain_text(word_gap))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All words on the page, in line order.
    pub fn words(&self, word_gap: f32) -> Vec<Word> {
        self.lines.iter().flat_map(|l| l.words(word_gap)).collect()
    }

    /// Total number of glyphs across all lines.
    pub fn glyph_count(&self) -> usize {
        self.lines.iter().map(Line::len).sum()
    }
}

/// Font size histogram used to find the dominant size of a page.
#[derive(Debug, Clone, Default)]
pub struct FontStatistics {
    /// Observed sizes keyed in hundredths of a point
    size_histogram: BTreeMap<i32, usize>,
}

impl FontStatistics {
    /// Build statistics from a page's glyphs.
    pub fn from_glyphs(glyphs: &[Glyph]) -> Self {
        let mut stats = Self::default();
        for glyph in glyphs {
            stats.add_size(glyph.size);
        }
        stats
    }

    /// Add a font size observation.
    pub fn add_size(&mut self, size: f32) {
        let key = (size * 100.0).round() as i32;
        *self.size_histogram.entry(key).or_insert(0) += 1;
    }

    /// The most frequent size.
    ///
    /// Ties resolve to the larger size; the choice is arbitrary but stable
    /// across runs.
    pub fn dominant_size(&self) -> Option<f32> {
        self.size_histogram
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(key, _)| *key as f32 / 100.0)
    }
}

/// Clusters glyphs into lines.
#[derive(Debug, Clone)]
pub struct LineReconstructor {
    tolerance_ratio: f32,
}

impl LineReconstructor {
    /// Create a reconstructor from thresholds.
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            tolerance_ratio: thresholds.line_tolerance_ratio,
        }
    }

    /// Group a page's glyphs into lines. Every glyph lands in exactly one line.
    pub fn reconstruct(&self, mut glyphs: Vec<Glyph>) -> PageLines {
        let Some(dominant) = FontStatistics::from_glyphs(&glyphs).dominant_size() else {
            return PageLines::default();
        };
        let tolerance = dominant * self.tolerance_ratio;

        glyphs.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.x0.total_cmp(&b.x0)));

        let mut lines = Vec::new();
        let mut current: Vec<Glyph> = Vec::new();
        let mut anchor_top = 0.0_f32;

        for glyph in glyphs {
            if !current.is_empty() && (glyph.top - anchor_top).abs() > tolerance {
                lines.push(Line::from_glyphs(std::mem::take(&mut current), anchor_top));
            }
            if current.is_empty() {
                anchor_top = glyph.top;
            }
            current.push(glyph);
        }
        if !current.is_empty() {
            lines.push(Line::from_glyphs(current, anchor_top));
        }

        log::debug!(
            "Reconstructed {} lines (dominant size {:.2}, tolerance {:.2})",
            lines.len(),
            dominant,
            tolerance
        );

        PageLines {
            dominant_size: Some(dominant),
            lines,
        }
    }
}

/// Build a glyph for each character of `text`, advancing `advance` per character.
///
/// Test and benchmark helper for laying out synthetic lines.
pub fn layout_text(text: &str, x: f32, top: f32, size: f32, advance: f32) -> Vec<Glyph> {
    text.chars()
        .enumerate()
        .map(|(i, c)| {
            let x0 = x + i as f32 * advance;
            Glyph::new(c, x0, x0 + advance * 0.9, top, top + size, size)
        })
        .collect()
}
