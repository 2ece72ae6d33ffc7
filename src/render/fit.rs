//! Figure sizing for spreadsheet embedding.

use serde::{Deserialize, Serialize};

use crate::model::QuestionTable;

/// Fits figures into a fixed-width spreadsheet cell.
///
/// Images are scaled down (never up) to fit both the cell width and the
/// maximum row height, keeping their aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FigureFit {
    /// Cell width in pixels
    pub cell_width_px: f32,
    /// Tallest allowed row in pixels
    pub max_row_height_px: f32,
    /// Extra row height in points
    pub padding_pt: f32,
    /// Points per pixel
    pub px_to_pt: f32,
    /// Image offset inside the cell in pixels
    pub offset_px: u32,
}

impl Default for FigureFit {
    fn default() -> Self {
        Self {
            cell_width_px: 350.0,
            max_row_height_px: 200.0,
            padding_pt: 10.0,
            px_to_pt: 0.75,
            offset_px: 5,
        }
    }
}

/// Placement of one image in its row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FittedFigure {
    /// Uniform scale factor applied to the image
    pub scale: f32,
    /// Row height in points
    pub row_height_pt: f32,
    /// Horizontal and vertical offset in pixels
    pub offset_px: u32,
}

impl FigureFit {
    /// Scale and row height for an image of `width` x `height` pixels.
    pub fn for_image(&self, width: u32, height: u32) -> FittedFigure {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        let scale = (self.cell_width_px / w)
            .min(self.max_row_height_px / h)
            .min(1.0);
        FittedFigure {
            scale,
            row_height_pt: h * scale * self.px_to_pt + self.padding_pt,
            offset_px: self.offset_px,
        }
    }
}

/// Embedding plan for one table row's figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FigureLayout {
    /// Question number
    pub number: u32,
    /// Zero-based table row, not counting the header row
    pub row: usize,
    /// Figure file
    pub path: String,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Scale and row height
    pub fit: FittedFigure,
}

/// Size every figure of a table for embedding.
///
/// Rows whose figure file cannot be read are left out.
pub fn figure_layout(table: &QuestionTable, fit: &FigureFit) -> Vec<FigureLayout> {
    table
        .iter()
        .enumerate()
        .filter_map(|(row, record)| {
            let path = record.figure.as_ref()?;
            let (width, height) = match image::image_dimensions(path) {
                Ok(dims) => dims,
                Err(e) => {
                    log::warn!("Cannot read figure {}: {}", path, e);
                    return None;
                }
            };
            Some(FigureLayout {
                number: record.number,
                row,
                path: path.clone(),
                width,
                height,
                fit: fit.for_image(width, height),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuestionBlock, QuestionRecord};

    #[test]
    fn test_small_image_not_upscaled() {
        let fit = FigureFit::default().for_image(100, 80);
        assert_eq!(fit.scale, 1.0);
        assert_eq!(fit.row_height_pt, 70.0);
    }

    #[test]
    fn test_wide_image_fits_cell_width() {
        let fit = FigureFit::default().for_image(700, 100);
        assert_eq!(fit.scale, 0.5);
        assert!((fit.row_height_pt - 47.5).abs() < 1e-4);
    }

    #[test]
    fn test_tall_image_fits_row_height() {
        let fit = FigureFit::default().for_image(300, 800);
        assert_eq!(fit.scale, 0.25);
        assert!((fit.row_height_pt - 160.0).abs() < 1e-4);
    }

    #[test]
    fn test_figure_layout_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q_2_figure.png");
        image::RgbImage::new(700, 100).save(&path).unwrap();

        let mut records = Vec::new();
        for (number, figure) in [
            (1, None),
            (2, Some(path.to_string_lossy().into_owned())),
            (3, Some("missing.png".to_string())),
        ] {
            let mut record = QuestionRecord::from_block(QuestionBlock {
                number,
                stem: String::new(),
                options: Default::default(),
            });
            record.figure = figure;
            records.push(record);
        }

        let layout = figure_layout(&QuestionTable::new(records, 3), &FigureFit::default());
        assert_eq!(layout.len(), 1);
        assert_eq!(layout[0].number, 2);
        assert_eq!(layout[0].row, 1);
        assert_eq!((layout[0].width, layout[0].height), (700, 100));
        assert_eq!(layout[0].fit.scale, 0.5);
    }
}
