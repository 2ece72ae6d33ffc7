//! Exam structure: answer key, question segmentation, figure association
//! and record assembly.

mod answer_key;
mod assemble;
mod figures;
mod segment;

pub use answer_key::{AnswerJoin, AnswerKey};
pub use assemble::RecordAssembler;
pub use figures::{figure_file_name, FigureAssignment, FigureAssociator};
pub use segment::{QuestionSegmenter, Segmentation};
