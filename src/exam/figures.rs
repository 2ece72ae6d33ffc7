//! Figure association: which images belong to which question on a page.
//!
//! Question labels ("12.") found among a page's words split the page into
//! vertical spans. An image whose top lies strictly inside a span belongs to
//! that span's question; all images of one question are merged into their
//! union box and rendered as a single figure.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use regex::Regex;

use crate::error::Result;
use crate::model::{BBox, ImagePlacement, QuestionLocation, Word};
use crate::parser::FigureRenderer;

/// Images merged for one question on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct FigureAssignment {
    /// Question number
    pub number: u32,
    /// Zero-based page index
    pub page_index: usize,
    /// Union of the assigned image boxes
    pub bbox: BBox,
    /// How many placements were merged
    pub image_count: usize,
}

impl FigureAssignment {
    /// File name of the rendered figure.
    pub fn file_name(&self) -> String {
        figure_file_name(self.number)
    }
}

/// File name used for a question's figure.
pub fn figure_file_name(number: u32) -> String {
    format!("q_{}_figure.png", number)
}

/// Maps image placements to question labels and renders merged figures.
#[derive(Debug, Clone)]
pub struct FigureAssociator {
    question_count: u32,
    render_dpi: u32,
    /// `N.` at the start of a word
    label: Regex,
}

impl FigureAssociator {
    /// Create an associator for `question_count` questions rendering at `render_dpi`.
    pub fn new(question_count: u32, render_dpi: u32) -> Self {
        Self {
            question_count,
            render_dpi,
            label: Regex::new(r"^([0-9]{1,3})\.").unwrap(),
        }
    }

    /// Question labels among a page's words, sorted by `top`.
    pub fn locate_questions(&self, words: &[Word], page_index: usize) -> Vec<QuestionLocation> {
        let mut locations: Vec<QuestionLocation> = words
            .iter()
            .filter_map(|word| {
                let caps = self.label.captures(&word.text)?;
                let number: u32 = caps.get(1)?.as_str().parse().ok()?;
                (1..=self.question_count)
                    .contains(&number)
                    .then_some(QuestionLocation {
                        number,
                        top: word.top(),
                        bottom: word.bottom(),
                        page_index,
                    })
            })
            .collect();
        locations.sort_by(|a, b| a.top.total_cmp(&b.top));
        locations
    }

    /// Assign images to question spans and merge them per question.
    ///
    /// The span of location `i` runs from its top (exclusive) to the next
    /// location's top (exclusive), or to the end of the page for the last
    /// one. Images above the first label belong to no question.
    pub fn assign(
        &self,
        locations: &[QuestionLocation],
        images: &[ImagePlacement],
    ) -> Vec<FigureAssignment> {
        let mut assignments = Vec::new();
        for (i, location) in locations.iter().enumerate() {
            let start = location.top;
            let end = locations.get(i + 1).map_or(f32::INFINITY, |next| next.top);

            let related: Vec<BBox> = images
                .iter()
                .filter(|img| start < img.top() && img.top() < end)
                .map(|img| img.bbox)
                .collect();

            if let Some(bbox) = BBox::envelope(related.iter()) {
                log::debug!(
                    "Question {}: {} image(s) in span {:.1}..{:.1}",
                    location.number,
                    related.len(),
                    start,
                    end
                );
                assignments.push(FigureAssignment {
                    number: location.number,
                    page_index: location.page_index,
                    bbox,
                    image_count: related.len(),
                });
            }
        }
        assignments
    }

    /// Render one merged figure into `dir` and return its path.
    pub fn render<R: FigureRenderer + ?Sized>(
        &self,
        renderer: &R,
        assignment: &FigureAssignment,
        dir: &Path,
    ) -> Result<PathBuf> {
        let image = renderer.render_region(assignment.page_index, assignment.bbox, self.render_dpi)?;
        let path = dir.join(assignment.file_name());
        image.save_with_format(&path, ImageFormat::Png)?;
        Ok(path)
    }

    /// Locate, assign and render every figure on one page.
    ///
    /// A failed render is logged and leaves that question without a figure.
    /// When a number already has a figure from an earlier page, the earlier
    /// one is kept.
    pub fn process_page<R: FigureRenderer + ?Sized>(
        &self,
        renderer: &R,
        page_index: usize,
        words: &[Word],
        images: &[ImagePlacement],
        dir: &Path,
        figures: &mut BTreeMap<u32, String>,
    ) {
        if images.is_empty() {
            return;
        }
        let locations = self.locate_questions(words, page_index);
        for assignment in self.assign(&locations, images) {
            if figures.contains_key(&assignment.number) {
                log::debug!(
                    "Question {}: figure already rendered, skipping page {}",
                    assignment.number,
                    page_index + 1
                );
                continue;
            }
            match self.render(renderer, &assignment, dir) {
                Ok(path) => {
                    log::info!(
                        "Saved merged figure for Q{} to {}",
                        assignment.number,
                        path.display()
                    );
                    figures.insert(assignment.number, path.to_string_lossy().into_owned());
                }
                Err(e) => log::warn!(
                    "Failed to render merged figure for Q{}: {}",
                    assignment.number,
                    e
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{MemoryPage, MemorySource};

    fn word(text: &str, top: f32) -> Word {
        Word {
            text: text.to_string(),
            bbox: BBox::new(50.0, top, 70.0, top + 10.0),
        }
    }

    fn placement(x0: f32, top: f32, x1: f32, bottom: f32) -> ImagePlacement {
        ImagePlacement {
            page_index: 0,
            bbox: BBox::new(x0, top, x1, bottom),
        }
    }

    fn associator() -> FigureAssociator {
        FigureAssociator::new(80, 72)
    }

    #[test]
    fn test_locate_questions() {
        let words = vec![
            word("6.", 400.0),
            word("5.", 100.0),
            word("What", 100.0),
            word("81.", 200.0),
            word("12.5", 300.0),
            word("A.", 120.0),
        ];
        let locations = associator().locate_questions(&words, 0);
        let numbers: Vec<u32> = locations.iter().map(|l| l.number).collect();
        // "12.5" starts with a label pattern and counts
        assert_eq!(numbers, vec![5, 12, 6]);
        assert_eq!(locations[0].top, 100.0);
        assert_eq!(locations[0].bottom, 110.0);
    }

    #[test]
    fn test_two_images_merge_into_envelope() {
        let locations = associator().locate_questions(&[word("5.", 100.0), word("6.", 400.0)], 0);
        let images = vec![
            placement(60.0, 150.0, 200.0, 250.0),
            placement(220.0, 180.0, 400.0, 300.0),
            placement(60.0, 450.0, 200.0, 500.0),
        ];
        let assignments = associator().assign(&locations, &images);
        assert_eq!(assignments.len(), 2);

        assert_eq!(assignments[0].number, 5);
        assert_eq!(assignments[0].image_count, 2);
        assert_eq!(assignments[0].bbox, BBox::new(60.0, 150.0, 400.0, 300.0));

        assert_eq!(assignments[1].number, 6);
        assert_eq!(assignments[1].bbox, BBox::new(60.0, 450.0, 200.0, 500.0));
    }

    #[test]
    fn test_image_above_first_label_unassigned() {
        let locations = associator().locate_questions(&[word("1.", 100.0)], 0);
        let images = vec![placement(60.0, 20.0, 200.0, 90.0), placement(60.0, 100.0, 200.0, 150.0)];
        // First is above the label; second starts exactly at it
        assert!(associator().assign(&locations, &images).is_empty());
    }

    #[test]
    fn test_process_page_writes_figures() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = MemoryPage::letter();
        page.images.push(BBox::new(60.0, 150.0, 200.0, 250.0));
        let source = MemorySource::new(vec![page]);
        let images = vec![placement(60.0, 150.0, 200.0, 250.0)];

        let mut figures = BTreeMap::new();
        associator().process_page(&source, 0, &[word("7.", 100.0)], &images, dir.path(), &mut figures);

        let path = PathBuf::from(&figures[&7]);
        assert!(path.ends_with("q_7_figure.png"));
        let saved = image::open(&path).unwrap().to_rgb8();
        assert_eq!(saved.dimensions(), (140, 100));
    }

    #[test]
    fn test_render_failure_leaves_no_figure() {
        let dir = tempfile::tempdir().unwrap();
        // Page list is empty, so rendering fails
        let source = MemorySource::default();
        let images = vec![placement(60.0, 150.0, 200.0, 250.0)];

        let mut figures = BTreeMap::new();
        associator().process_page(&source, 0, &[word("7.", 100.0)], &images, dir.path(), &mut figures);
        assert!(figures.is_empty());
    }
}
