//! End-to-end extraction: question document + answer document → table.
//!
//! Pages are processed one at a time in document order. The answer key is
//! parsed first, so a short key aborts the run before any figure is written.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Result;
use crate::exam::{AnswerKey, FigureAssociator, QuestionSegmenter, RecordAssembler};
use crate::model::{Glyph, ImagePlacement, QuestionTable};
use crate::parser::{
    ErrorMode, ExtractOptions, FigureRenderer, GlyphSource, LineReconstructor, ScriptNormalizer,
};

/// Counters collected during one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    /// Pages in the question document
    pub page_count: usize,

    /// Pages selected and read
    pub pages_processed: usize,

    /// Pages that could not be read and were treated as empty
    pub pages_skipped: usize,

    /// Glyphs across processed pages
    pub glyph_count: usize,

    /// Image placements across processed pages
    pub image_count: usize,

    /// Rows in the output table
    pub question_count: usize,

    /// Rows with a rendered figure
    pub figure_count: usize,

    /// Expected question numbers with no row
    pub missing_count: usize,
}

/// Result of a full extraction run.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// The assembled table
    pub table: QuestionTable,

    /// Run statistics
    pub stats: ExtractionStats,
}

/// Drives the extraction stages over a pair of documents.
#[derive(Debug, Clone)]
pub struct ExamExtractor {
    options: ExtractOptions,
    reconstructor: LineReconstructor,
    normalizer: ScriptNormalizer,
    segmenter: QuestionSegmenter,
    associator: FigureAssociator,
    assembler: RecordAssembler,
}

impl ExamExtractor {
    /// Create an extractor, validating the thresholds.
    pub fn new(options: ExtractOptions) -> Result<Self> {
        let t = &options.thresholds;
        t.validate()?;
        Ok(Self {
            reconstructor: LineReconstructor::new(t),
            normalizer: ScriptNormalizer::new(t),
            segmenter: QuestionSegmenter::new(t.question_count),
            associator: FigureAssociator::new(t.question_count, t.render_dpi),
            assembler: RecordAssembler::new(t.question_count),
            options,
        })
    }

    /// The options this extractor runs with.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Parse the answer key from the answer document's plain text.
    pub fn answer_key<A: GlyphSource + ?Sized>(&self, answers: &A) -> Result<AnswerKey> {
        let text = answers.plain_text(&self.options.thresholds)?;
        AnswerKey::parse(&text, self.options.thresholds.question_count as usize)
    }

    /// Script-normalized text of the selected question pages, one page per
    /// chunk, joined with line breaks.
    pub fn normalized_text<S: GlyphSource + ?Sized>(&self, source: &S) -> Result<String> {
        let mut pages = Vec::new();
        for page_index in self.selected_pages(source) {
            let glyphs = self.read_page(page_index, || source.page_glyphs(page_index))?;
            let lines = self.reconstructor.reconstruct(glyphs.unwrap_or_default());
            pages.push(self.normalizer.normalize_page(&lines));
        }
        Ok(pages.join("\n"))
    }

    /// Run the full pipeline.
    ///
    /// Fails only when a document cannot be read (in strict mode), the
    /// figure directory cannot be created, or the answer key is short.
    /// Figure render failures leave the affected question without a figure.
    pub fn extract<Q, A>(&self, questions: &Q, answers: &A) -> Result<Extraction>
    where
        Q: GlyphSource + FigureRenderer + ?Sized,
        A: GlyphSource + ?Sized,
    {
        let key = self.answer_key(answers)?;
        log::debug!("Parsed {} answers", key.len());

        if let Some(dir) = &self.options.figure_dir {
            std::fs::create_dir_all(dir)?;
        }

        let word_gap = self.options.thresholds.word_gap;
        let mut stats = ExtractionStats {
            page_count: questions.page_count(),
            ..Default::default()
        };
        let mut page_texts = Vec::new();
        let mut figures: BTreeMap<u32, String> = BTreeMap::new();

        for page_index in self.selected_pages(questions) {
            let glyphs: Vec<Glyph> =
                match self.read_page(page_index, || questions.page_glyphs(page_index))? {
                    Some(glyphs) => glyphs,
                    None => {
                        stats.pages_skipped += 1;
                        page_texts.push(String::new());
                        continue;
                    }
                };
            stats.pages_processed += 1;
            stats.glyph_count += glyphs.len();

            let lines = self.reconstructor.reconstruct(glyphs);
            page_texts.push(self.normalizer.normalize_page(&lines));

            let Some(dir) = &self.options.figure_dir else {
                continue;
            };
            let images: Vec<ImagePlacement> = self
                .read_page(page_index, || questions.page_images(page_index))?
                .unwrap_or_default();
            stats.image_count += images.len();

            let words = lines.words(word_gap);
            self.associator
                .process_page(questions, page_index, &words, &images, dir, &mut figures);
        }

        let segmentation = self.segmenter.segment(&page_texts.join("\n"));
        let table = self.assembler.assemble(segmentation.blocks, &key, &figures);

        stats.question_count = table.len();
        stats.figure_count = table.figure_count();
        stats.missing_count = table.missing.len();

        Ok(Extraction { table, stats })
    }

    fn selected_pages<S: GlyphSource + ?Sized>(&self, source: &S) -> Vec<usize> {
        (0..source.page_count())
            .filter(|i| self.options.pages.includes(*i as u32 + 1))
            .collect()
    }

    /// Run a page read, turning failures into `None` in lenient mode.
    fn read_page<T>(
        &self,
        page_index: usize,
        read: impl FnOnce() -> Result<T>,
    ) -> Result<Option<T>> {
        match read() {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                if self.options.error_mode == ErrorMode::Strict {
                    return Err(e);
                }
                log::warn!("Failed to read page {}: {}", page_index + 1, e);
                Ok(None)
            }
        }
    }
}
