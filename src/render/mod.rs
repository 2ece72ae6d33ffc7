//! Output writers for the question table.

mod csv;
mod fit;
mod json;

pub use csv::to_csv;
pub use fit::{figure_layout, FigureFit, FigureLayout, FittedFigure};
pub use json::{to_json, JsonFormat};
