//! Question segmentation of normalized document text.

use std::collections::BTreeSet;

use regex::Regex;

use crate::model::{Letter, QuestionBlock};

/// Question blocks found in a document, plus the expected numbers that
/// produced no block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmentation {
    /// Blocks in document order
    pub blocks: Vec<QuestionBlock>,
    /// Numbers in `1..=question_count` with no block, ascending
    pub missing: Vec<u32>,
}

/// Splits document text into numbered question blocks.
#[derive(Debug, Clone)]
pub struct QuestionSegmenter {
    question_count: u32,
    /// `N.` at a line start
    label: Regex,
    /// `A.` opening a line
    option_start_line: Regex,
    /// `A.` after any whitespace
    option_start_inline: Regex,
    /// Any option marker opening a line
    option_marker: Regex,
    line_break: Regex,
}

impl QuestionSegmenter {
    /// Create a segmenter for a template with `question_count` questions.
    pub fn new(question_count: u32) -> Self {
        Self {
            question_count,
            label: Regex::new(r"(?m)^\s*([0-9]{1,3})\.").unwrap(),
            option_start_line: Regex::new(r"\n\s*A\.").unwrap(),
            option_start_inline: Regex::new(r"\sA\.").unwrap(),
            option_marker: Regex::new(r"\n\s*([ABCD])\.").unwrap(),
            line_break: Regex::new(r"\s*\n\s*").unwrap(),
        }
    }

    /// Segment normalized document text.
    ///
    /// Every `N.` label at a line start ends the previous block, even when
    /// `N` is outside the template's range; such blocks are dropped. Blocks
    /// without an `A.` marker are dropped as well.
    pub fn segment(&self, text: &str) -> Segmentation {
        let text = text.replace('\r', "\n");

        let labels: Vec<(usize, usize, Option<u32>)> = self
            .label
            .captures_iter(&text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let number = caps.get(1).and_then(|m| m.as_str().parse().ok());
                Some((whole.start(), whole.end(), number))
            })
            .collect();

        let mut blocks = Vec::new();
        for (i, (_, body_start, number)) in labels.iter().enumerate() {
            let body_end = labels.get(i + 1).map_or(text.len(), |next| next.0);
            let Some(number) = number.filter(|n| (1..=self.question_count).contains(n)) else {
                log::debug!("Ignoring out-of-range label {:?}", number);
                continue;
            };
            match self.split_block(number, &text[*body_start..body_end]) {
                Some(block) => blocks.push(block),
                None => log::debug!("Question {}: no option markers, skipped", number),
            }
        }

        let found: BTreeSet<u32> = blocks.iter().map(|b| b.number).collect();
        let missing: Vec<u32> = (1..=self.question_count)
            .filter(|n| !found.contains(n))
            .collect();
        if !missing.is_empty() {
            log::warn!("Missing question numbers: {:?}", missing);
        }

        Segmentation { blocks, missing }
    }

    /// Split one block body into stem and options.
    fn split_block(&self, number: u32, body: &str) -> Option<QuestionBlock> {
        let body = body.trim();
        let option_start = self
            .option_start_line
            .find(body)
            .or_else(|| self.option_start_inline.find(body))?
            .start();

        let stem = self.collapse(&body[..option_start]);
        let options_text = format!("\n{}", body[option_start..].trim());

        let markers: Vec<(usize, usize, char)> = self
            .option_marker
            .captures_iter(&options_text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let letter = caps.get(1)?.as_str().chars().next()?;
                Some((whole.start(), whole.end(), letter))
            })
            .collect();

        let mut options: [String; 4] = Default::default();
        for (i, (_, value_start, letter)) in markers.iter().enumerate() {
            let value_end = markers.get(i + 1).map_or(options_text.len(), |next| next.0);
            if let Ok(letter) = Letter::try_from(*letter) {
                // A repeated marker overwrites the earlier span
                options[letter.index()] = self.collapse(&options_text[*value_start..value_end]);
            }
        }

        Some(QuestionBlock {
            number,
            stem,
            options,
        })
    }

    /// Replace line breaks (and the whitespace around them) with one space, then trim.
    fn collapse(&self, span: &str) -> String {
        self.line_break.replace_all(span, " ").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> QuestionSegmenter {
        QuestionSegmenter::new(80)
    }

    #[test]
    fn test_single_question() {
        let text = "1. What is H₂O?\nA. Water\nB. Ice\nC. Steam\nD. Gas";
        let seg = segmenter().segment(text);
        assert_eq!(seg.blocks.len(), 1);

        let block = &seg.blocks[0];
        assert_eq!(block.number, 1);
        assert_eq!(block.stem, "What is H₂O?");
        assert_eq!(block.option(Letter::A), "Water");
        assert_eq!(block.option(Letter::B), "Ice");
        assert_eq!(block.option(Letter::C), "Steam");
        assert_eq!(block.option(Letter::D), "Gas");
        assert_eq!(seg.missing.len(), 79);
        assert_eq!(seg.missing[0], 2);
    }

    #[test]
    fn test_multiline_stem_and_options() {
        let text = "1. Which of the\nfollowing is true?\nA. first\ncontinued\nB. b\nC. c\nD. d\n2. Next\nA. x\nB. y";
        let seg = segmenter().segment(text);
        assert_eq!(seg.blocks.len(), 2);
        assert_eq!(seg.blocks[0].stem, "Which of the following is true?");
        assert_eq!(seg.blocks[0].option(Letter::A), "first continued");
        assert_eq!(seg.blocks[0].option(Letter::D), "d");
        assert_eq!(seg.blocks[1].option(Letter::B), "y");
        assert_eq!(seg.blocks[1].option(Letter::C), "");
    }

    #[test]
    fn test_out_of_range_label_ends_block() {
        let text = "80. Last\nA. a\nB. b\n\n81. Not a question\nA. z";
        let seg = segmenter().segment(text);
        assert_eq!(seg.blocks.len(), 1);
        assert_eq!(seg.blocks[0].option(Letter::B), "b");
    }

    #[test]
    fn test_block_without_options_is_dropped() {
        let text = "1. Stem only\n2. Real\nA. x";
        let seg = segmenter().segment(text);
        let numbers: Vec<u32> = seg.blocks.iter().map(|b| b.number).collect();
        assert_eq!(numbers, vec![2]);
        assert!(seg.missing.contains(&1));
    }

    #[test]
    fn test_inline_option_start() {
        // No line-start marker: the inline A. splits the stem, and the
        // options that follow on the same line stay in option A
        let text = "3. Pick one A. red B. blue";
        let seg = segmenter().segment(text);
        let block = &seg.blocks[0];
        assert_eq!(block.stem, "Pick one");
        assert_eq!(block.option(Letter::A), "red B. blue");
        assert_eq!(block.option(Letter::B), "");
    }

    #[test]
    fn test_line_start_marker_preferred() {
        let text = "4. Is A. a label?\nA. yes\nB. no";
        let block = &segmenter().segment(text).blocks[0];
        assert_eq!(block.stem, "Is A. a label?");
        assert_eq!(block.option(Letter::A), "yes");
    }

    #[test]
    fn test_missing_numbers_sorted() {
        let seg = QuestionSegmenter::new(4).segment("3. c\nA. x\n1. a\nA. y");
        assert_eq!(seg.missing, vec![2, 4]);
    }

    #[test]
    fn test_empty_text() {
        let seg = QuestionSegmenter::new(3).segment("");
        assert!(seg.blocks.is_empty());
        assert_eq!(seg.missing, vec![1, 2, 3]);
    }
}
