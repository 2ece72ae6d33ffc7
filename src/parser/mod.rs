//! PDF reading and text reconstruction.

mod backend;
mod interpreter;
mod layout;
mod options;
mod raster;
mod script;

pub use backend::{detect_version, FigureRenderer, GlyphSource, LopdfSource, MemoryPage, MemorySource};
pub use layout::{layout_text, FontStatistics, Line, LineReconstructor, PageLines};
pub use options::{ErrorMode, ExtractOptions, PageSelection, Thresholds};
pub use script::{to_subscript, to_superscript, ScriptLevel, ScriptNormalizer};
