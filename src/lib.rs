//! # unexam
//!
//! Turns a fixed-layout multiple-choice exam PDF and its answer-key PDF
//! into one table of questions, options, answers and figure crops.
//!
//! ## Quick Start
//!
//! ```no_run
//! use unexam::{extract_exam, render, ExtractOptions};
//!
//! fn main() -> unexam::Result<()> {
//!     let options = ExtractOptions::new().with_figure_dir("figures");
//!     let result = extract_exam("TEST.pdf", "ANSWER.pdf", options)?;
//!
//!     let json = render::to_json(&result.table, render::JsonFormat::Pretty)?;
//!     println!("{}", json);
//!     Ok(())
//! }
//! ```
//!
//! ## Stages
//!
//! - **Line reconstruction**: glyphs clustered into lines by vertical proximity
//! - **Script recovery**: small raised or lowered digits become ² or ₂
//! - **Answer key**: the n-th isolated A-D letter answers question n
//! - **Segmentation**: `N.` labels split questions, `A.`..`D.` split options
//! - **Figures**: images under a question label are merged and cropped

pub mod error;
pub mod exam;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod render;

// Re-export commonly used types
pub use error::{Error, Result};
pub use exam::{AnswerJoin, AnswerKey, FigureAssociator, QuestionSegmenter, RecordAssembler};
pub use model::{
    BBox, Glyph, ImagePlacement, Letter, QuestionBlock, QuestionLocation, QuestionRecord,
    QuestionTable, Word,
};
pub use parser::{
    ErrorMode, ExtractOptions, FigureRenderer, GlyphSource, LopdfSource, MemoryPage,
    MemorySource, PageSelection, Thresholds,
};
pub use pipeline::{ExamExtractor, Extraction, ExtractionStats};
pub use render::{FigureFit, JsonFormat};

use std::path::Path;

/// Extract the question table from a question PDF and an answer-key PDF.
///
/// # Arguments
///
/// * `question_pdf` - Path to the exam document
/// * `answer_pdf` - Path to the answer-key document
/// * `options` - Thresholds, error mode, figure directory and page selection
///
/// # Example
///
/// ```no_run
/// use unexam::{extract_exam, ExtractOptions};
///
/// let result = extract_exam("TEST.pdf", "ANSWER.pdf", ExtractOptions::new()).unwrap();
/// println!("{} questions", result.table.len());
/// ```
pub fn extract_exam<P: AsRef<Path>, Q: AsRef<Path>>(
    question_pdf: P,
    answer_pdf: Q,
    options: ExtractOptions,
) -> Result<Extraction> {
    let extractor = ExamExtractor::new(options)?;
    let questions = LopdfSource::open(question_pdf)?;
    let answers = LopdfSource::open(answer_pdf)?;
    extractor.extract(&questions, &answers)
}

/// Extract the question table from in-memory PDFs.
pub fn extract_exam_bytes(
    question_pdf: &[u8],
    answer_pdf: &[u8],
    options: ExtractOptions,
) -> Result<Extraction> {
    let extractor = ExamExtractor::new(options)?;
    let questions = LopdfSource::from_bytes(question_pdf)?;
    let answers = LopdfSource::from_bytes(answer_pdf)?;
    extractor.extract(&questions, &answers)
}

/// Script-normalized text of a question PDF.
///
/// # Example
///
/// ```no_run
/// use unexam::{normalized_text, Thresholds};
///
/// let text = normalized_text("TEST.pdf", &Thresholds::default()).unwrap();
/// println!("{}", text);
/// ```
pub fn normalized_text<P: AsRef<Path>>(path: P, thresholds: &Thresholds) -> Result<String> {
    let options = ExtractOptions::new().with_thresholds(thresholds.clone());
    let extractor = ExamExtractor::new(options)?;
    extractor.normalized_text(&LopdfSource::open(path)?)
}

/// Parse the answer key of an answer PDF.
pub fn parse_answer_key<P: AsRef<Path>>(path: P, thresholds: &Thresholds) -> Result<AnswerKey> {
    let source = LopdfSource::open(path)?;
    let text = source.plain_text(thresholds)?;
    AnswerKey::parse(&text, thresholds.question_count as usize)
}
