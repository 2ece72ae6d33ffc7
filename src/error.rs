//! Error types for unexam library.

use std::io;
use thiserror::Error;

/// Result type alias for unexam operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while extracting an exam.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading PDFs or writing figures.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file format is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Error parsing PDF structure or content streams.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted.
    #[error("Document is encrypted")]
    Encrypted,

    /// Page index is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(usize, usize),

    /// An image XObject could not be located or decoded.
    #[error("Image extraction error: {0}")]
    ImageExtract(String),

    /// A rendered figure could not be encoded or written.
    #[error("Image encoding error: {0}")]
    ImageEncode(#[from] image::ImageError),

    /// The answer key did not yield one letter per question.
    #[error("Could not parse {expected} answers. Got {found}")]
    AnswerKey {
        /// Tokens recovered after the fallback pass.
        found: usize,
        /// Tokens required.
        expected: usize,
    },

    /// Invalid threshold or option configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error while serializing the question table.
    #[error("Rendering error: {0}")]
    Render(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}
