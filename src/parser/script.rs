//! Subscript and superscript recovery.
//!
//! Digits and signs set noticeably smaller than the page's dominant size are
//! re-encoded as Unicode sub/superscripts, with the direction taken from the
//! baseline shift against the preceding glyph on the line.

use crate::model::Glyph;

use super::layout::{Line, PageLines};
use super::options::Thresholds;

/// Vertical placement of a glyph relative to its line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLevel {
    /// Regular glyph
    Plain,
    /// Lowered (e.g. the 2 in H₂O)
    Subscript,
    /// Raised (e.g. the 2 in m²)
    Superscript,
}

/// Map a digit to its subscript form; other characters are returned unchanged.
pub fn to_subscript(c: char) -> char {
    match c {
        '0' => '₀',
        '1' => '₁',
        '2' => '₂',
        '3' => '₃',
        '4' => '₄',
        '5' => '₅',
        '6' => '₆',
        '7' => '₇',
        '8' => '₈',
        '9' => '₉',
        other => other,
    }
}

/// Map a digit or sign to its superscript form; other characters are returned unchanged.
pub fn to_superscript(c: char) -> char {
    match c {
        '0' => '⁰',
        '1' => '¹',
        '2' => '²',
        '3' => '³',
        '4' => '⁴',
        '5' => '⁵',
        '6' => '⁶',
        '7' => '⁷',
        '8' => '⁸',
        '9' => '⁹',
        '+' => '⁺',
        '-' => '⁻',
        other => other,
    }
}

fn is_script_char(c: char) -> bool {
    c.is_ascii_digit() || c == '+' || c == '-'
}

/// Rewrites elevated digits and signs on reconstructed lines.
#[derive(Debug, Clone)]
pub struct ScriptNormalizer {
    size_ratio: f32,
    superscript_shift: f32,
    word_gap: f32,
}

impl ScriptNormalizer {
    /// Create a normalizer from thresholds.
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            size_ratio: thresholds.script_size_ratio,
            superscript_shift: thresholds.superscript_shift,
            word_gap: thresholds.word_gap,
        }
    }

    /// Classify a glyph given its predecessor on the line.
    ///
    /// A small candidate with no predecessor stays plain: there is no baseline
    /// to compare against.
    pub fn classify(&self, glyph: &Glyph, prev: Option<&Glyph>, dominant_size: f32) -> ScriptLevel {
        if !is_script_char(glyph.text) || glyph.size >= dominant_size * self.size_ratio {
            return ScriptLevel::Plain;
        }
        match prev {
            None => ScriptLevel::Plain,
            Some(p) if glyph.bottom - p.bottom < self.superscript_shift => ScriptLevel::Superscript,
            Some(_) => ScriptLevel::Subscript,
        }
    }

    /// Render a line with script glyphs substituted and gap spaces inserted.
    pub fn normalize_line(&self, line: &Line, dominant_size: f32) -> String {
        let mut text = String::with_capacity(line.glyphs.len());
        let mut prev: Option<&Glyph> = None;

        for glyph in &line.glyphs {
            if let Some(p) = prev {
                if glyph.x0 - p.x1 > self.word_gap {
                    text.push(' ');
                }
            }
            text.push(match self.classify(glyph, prev, dominant_size) {
                ScriptLevel::Plain => glyph.text,
                ScriptLevel::Subscript => to_subscript(glyph.text),
                ScriptLevel::Superscript => to_superscript(glyph.text),
            });
            prev = Some(glyph);
        }
        text
    }

    /// Render every line of a page, joined with line breaks.
    pub fn normalize_page(&self, page: &PageLines) -> String {
        let Some(dominant) = page.dominant_size else {
            return String::new();
        };
        page.lines
            .iter()
            .map(|l| self.normalize_line(l, dominant))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::layout::{layout_text, LineReconstructor};

    fn normalizer() -> ScriptNormalizer {
        ScriptNormalizer::new(&Thresholds::default())
    }

    fn page(glyphs: Vec<Glyph>) -> PageLines {
        LineReconstructor::new(&Thresholds::default()).reconstruct(glyphs)
    }

    fn line(glyphs: Vec<Glyph>) -> Line {
        page(glyphs).lines.into_iter().next().unwrap()
    }

    #[test]
    fn test_translation_tables() {
        assert_eq!(to_subscript('2'), '₂');
        assert_eq!(to_subscript('+'), '+');
        assert_eq!(to_superscript('-'), '⁻');
        assert_eq!(to_superscript('a'), 'a');
    }

    #[test]
    fn test_subscript_and_superscript_detection() {
        let n = normalizer();
        let prev = Glyph::new('O', 10.0, 17.0, 100.0, 110.0, 10.0);

        // 70% size, baseline 1.1 below the previous glyph
        let sub = Glyph::new('2', 17.5, 21.0, 104.0, 111.1, 7.0);
        assert_eq!(n.classify(&sub, Some(&prev), 10.0), ScriptLevel::Subscript);

        // 70% size, baseline 6.6 above the previous glyph
        let sup = Glyph::new('2', 17.5, 21.0, 96.4, 103.4, 7.0);
        assert_eq!(n.classify(&sup, Some(&prev), 10.0), ScriptLevel::Superscript);
    }

    #[test]
    fn test_candidate_rules() {
        let n = normalizer();
        let prev = Glyph::new('m', 10.0, 17.0, 100.0, 110.0, 10.0);

        // Full-size digit is plain
        let digit = Glyph::new('2', 17.5, 22.0, 100.0, 110.0, 10.0);
        assert_eq!(n.classify(&digit, Some(&prev), 10.0), ScriptLevel::Plain);

        // Small letter is not a candidate
        let letter = Glyph::new('x', 17.5, 21.0, 96.4, 103.4, 7.0);
        assert_eq!(n.classify(&letter, Some(&prev), 10.0), ScriptLevel::Plain);

        // Small digit opening a line has nothing to compare against
        let first = Glyph::new('3', 0.0, 3.0, 96.4, 103.4, 7.0);
        assert_eq!(n.classify(&first, None, 10.0), ScriptLevel::Plain);
    }

    #[test]
    fn test_normalize_chemistry_line() {
        // Line 1: H2O with a lowered 2
        let mut glyphs = layout_text("H", 10.0, 100.0, 10.0, 6.0);
        glyphs.push(Glyph::new('2', 16.0, 19.5, 104.1, 111.1, 7.0));
        glyphs.extend(layout_text("O", 20.0, 100.0, 10.0, 6.0));
        // Line 2: 5 m3 with a raised 3
        glyphs.extend(layout_text("5 m", 10.0, 130.0, 10.0, 6.0));
        glyphs.push(Glyph::new('3', 28.0, 31.5, 126.4, 133.4, 7.0));

        let text = normalizer().normalize_page(&page(glyphs));
        assert_eq!(text, "H₂O\n5 m³");
    }

    #[test]
    fn test_plain_text_is_unchanged() {
        let glyphs = layout_text("1. What is 2+2-1?", 50.0, 100.0, 10.0, 6.0);
        let l = line(glyphs);
        assert_eq!(normalizer().normalize_line(&l, 10.0), l.plain_text(2.0));
        assert_eq!(normalizer().normalize_line(&l, 10.0), "1. What is 2+2-1?");
    }

    #[test]
    fn test_normalize_page_joins_lines() {
        let mut glyphs = layout_text("1. Q", 50.0, 100.0, 10.0, 6.0);
        glyphs.extend(layout_text("A. x", 50.0, 120.0, 10.0, 6.0));
        let page = LineReconstructor::new(&Thresholds::default()).reconstruct(glyphs);
        assert_eq!(normalizer().normalize_page(&page), "1. Q\nA. x");
        assert_eq!(normalizer().normalize_page(&PageLines::default()), "");
    }
}
