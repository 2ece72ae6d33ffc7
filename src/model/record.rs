//! Question-level records produced by segmentation and assembly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the four multiple-choice option letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Letter {
    A,
    B,
    C,
    D,
}

impl Letter {
    /// All letters in option order.
    pub const ALL: [Letter; 4] = [Letter::A, Letter::B, Letter::C, Letter::D];

    /// The letter as an ASCII character.
    pub fn as_char(self) -> char {
        match self {
            Letter::A => 'A',
            Letter::B => 'B',
            Letter::C => 'C',
            Letter::D => 'D',
        }
    }

    /// Position of the letter within [`Letter::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<char> for Letter {
    type Error = char;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            'A' => Ok(Letter::A),
            'B' => Ok(Letter::B),
            'C' => Ok(Letter::C),
            'D' => Ok(Letter::D),
            other => Err(other),
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Where a question label ("12.") sits on a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuestionLocation {
    /// Question number
    pub number: u32,
    /// Top of the label word
    pub top: f32,
    /// Bottom of the label word
    pub bottom: f32,
    /// Zero-based page index
    pub page_index: usize,
}

/// A segmented question: number, stem and the four option texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBlock {
    /// Question number
    pub number: u32,
    /// Stem text, whitespace-collapsed
    pub stem: String,
    /// Option texts in A, B, C, D order; missing options are empty
    pub options: [String; 4],
}

impl QuestionBlock {
    /// Text of a single option.
    pub fn option(&self, letter: Letter) -> &str {
        &self.options[letter.index()]
    }
}

/// One row of the output table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// Question number
    pub number: u32,
    /// Question stem
    #[serde(rename = "Question")]
    pub question: String,
    /// Option A
    #[serde(rename = "A")]
    pub a: String,
    /// Option B
    #[serde(rename = "B")]
    pub b: String,
    /// Option C
    #[serde(rename = "C")]
    pub c: String,
    /// Option D
    #[serde(rename = "D")]
    pub d: String,
    /// Answer letter, when the key has one for this number
    pub answer: Option<Letter>,
    /// Path of the rendered figure, when one exists
    #[serde(rename = "Figure")]
    pub figure: Option<String>,
}

impl QuestionRecord {
    /// Build a record from a question block with no answer or figure yet.
    pub fn from_block(block: QuestionBlock) -> Self {
        let [a, b, c, d] = block.options;
        Self {
            number: block.number,
            question: block.stem,
            a,
            b,
            c,
            d,
            answer: None,
            figure: None,
        }
    }

    /// Text of a single option.
    pub fn option(&self, letter: Letter) -> &str {
        match letter {
            Letter::A => &self.a,
            Letter::B => &self.b,
            Letter::C => &self.c,
            Letter::D => &self.d,
        }
    }
}
