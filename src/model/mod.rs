//! Data model for exam extraction.
//!
//! Geometry types ([`Glyph`], [`ImagePlacement`], [`Word`]) are transient and
//! live for one extraction pass; [`QuestionTable`] is the only value that
//! outlives it.

mod geometry;
mod record;
mod table;

pub use geometry::{BBox, Glyph, ImagePlacement, Word};
pub use record::{Letter, QuestionBlock, QuestionLocation, QuestionRecord};
pub use table::{QuestionTable, COLUMNS};
