//! Glyph source abstraction layer.
//!
//! The extraction pipeline reads documents only through [`GlyphSource`]
//! (positioned glyphs and image placements per page) and crops figures
//! through [`FigureRenderer`]. [`LopdfSource`] implements both over lopdf;
//! [`MemorySource`] serves pre-positioned glyphs.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use image::{Rgb, RgbImage};
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};

use crate::error::{Error, Result};
use crate::model::{BBox, Glyph, ImagePlacement};

use super::interpreter::{number, resolve, stream_data, Interpreter, PageContent};
use super::layout::LineReconstructor;
use super::options::Thresholds;
use super::raster::{decode_image_xobject, Canvas};

/// US Letter, used when a page has no usable MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Inherited page attributes are looked up at most this many levels up.
const MAX_INHERIT_DEPTH: usize = 32;

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Read-only per-page access to positioned glyphs and raster placements.
pub trait GlyphSource {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Page width and height in PDF units.
    fn page_size(&self, page_index: usize) -> Result<(f32, f32)>;

    /// Positioned glyphs of a page, in content order.
    fn page_glyphs(&self, page_index: usize) -> Result<Vec<Glyph>>;

    /// Raster images drawn on a page, clipped to the page.
    fn page_images(&self, page_index: usize) -> Result<Vec<ImagePlacement>>;

    /// Plain document text: one line per reconstructed line, pages joined
    /// with line breaks, no script substitution.
    fn plain_text(&self, thresholds: &Thresholds) -> Result<String> {
        let reconstructor = LineReconstructor::new(thresholds);
        let mut pages = Vec::with_capacity(self.page_count());
        for i in 0..self.page_count() {
            let lines = reconstructor.reconstruct(self.page_glyphs(i)?);
            pages.push(lines.plain_text(thresholds.word_gap));
        }
        Ok(pages.join("\n"))
    }
}

/// Rasterizes a rectangular region of a page.
pub trait FigureRenderer {
    /// Render `region` (top-left page coordinates) of a page at `dpi`.
    fn render_region(&self, page_index: usize, region: BBox, dpi: u32) -> Result<RgbImage>;
}

/// Check the `%PDF-x.y` header and return the version string.
pub fn detect_version(data: &[u8]) -> Result<String> {
    if data.len() < PDF_MAGIC.len() + 3 || !data.starts_with(PDF_MAGIC) {
        return Err(Error::UnknownFormat);
    }
    let version = &data[PDF_MAGIC.len()..PDF_MAGIC.len() + 3];
    let valid = version[0].is_ascii_digit() && version[1] == b'.' && version[2].is_ascii_digit();
    let version = String::from_utf8_lossy(version).to_string();
    if !valid {
        return Err(Error::UnsupportedVersion(version));
    }
    Ok(version)
}

/// Interpreted content of the most recently read page.
type CachedPage = (usize, Rc<PageContent>, [f32; 4]);

/// [`GlyphSource`] and [`FigureRenderer`] backed by `lopdf::Document`.
///
/// The last interpreted page is cached, so reading a page's glyphs, its
/// images and then rendering its figures decodes the content stream once.
pub struct LopdfSource {
    doc: LopdfDocument,
    pages: Vec<ObjectId>,
    version: String,
    last_page: RefCell<Option<CachedPage>>,
}

impl LopdfSource {
    /// Load from a file path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Load from an in-memory byte slice.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let version = detect_version(data)?;
        let doc = LopdfDocument::load_mem(data)?;
        let pages = doc.get_pages().into_values().collect();
        Ok(Self {
            doc,
            pages,
            version,
            last_page: RefCell::new(None),
        })
    }

    /// Load from a reader.
    pub fn from_reader<R: std::io::Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// PDF version from the file header.
    pub fn version(&self) -> &str {
        &self.version
    }

    fn page_id(&self, page_index: usize) -> Result<ObjectId> {
        self.pages
            .get(page_index)
            .copied()
            .ok_or(Error::PageOutOfRange(page_index + 1, self.pages.len()))
    }

    /// Look up a page attribute, following `/Parent` for inherited keys.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut dict = self.doc.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_INHERIT_DEPTH {
            if let Ok(value) = dict.get(key) {
                return Some(resolve(&self.doc, value));
            }
            let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
            dict = self.doc.get_dictionary(parent).ok()?;
        }
        None
    }

    fn media_box(&self, page_id: ObjectId) -> [f32; 4] {
        let values: Option<Vec<f32>> = self
            .inherited(page_id, b"MediaBox")
            .and_then(|o| o.as_array().ok())
            .map(|arr| arr.iter().filter_map(|o| number(resolve(&self.doc, o))).collect());
        match values.as_deref() {
            Some([x0, y0, x1, y1]) if x1 > x0 && y1 > y0 => [*x0, *y0, *x1, *y1],
            _ => DEFAULT_MEDIA_BOX,
        }
    }

    fn resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        self.inherited(page_id, b"Resources")
            .and_then(|o| o.as_dict().ok())
    }

    /// Decompressed content stream bytes of a page.
    fn page_content(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        let page_dict = self.doc.get_dictionary(page_id)?;
        let contents = match page_dict.get(b"Contents") {
            Ok(contents) => contents,
            // A page without content is blank
            Err(_) => return Ok(Vec::new()),
        };

        match contents {
            Object::Reference(r) => match self.doc.get_object(*r)? {
                Object::Stream(s) => stream_data(s),
                Object::Array(arr) => self.concat_streams(arr),
                _ => Err(Error::PdfParse("Invalid content stream".to_string())),
            },
            Object::Array(arr) => self.concat_streams(arr),
            _ => Err(Error::PdfParse("Invalid content stream".to_string())),
        }
    }

    fn concat_streams(&self, parts: &[Object]) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        for obj in parts {
            if let Object::Stream(s) = resolve(&self.doc, obj) {
                content.extend_from_slice(&stream_data(s)?);
                content.push(b' ');
            }
        }
        Ok(content)
    }

    fn interpret(&self, page_index: usize) -> Result<(Rc<PageContent>, [f32; 4])> {
        if let Some((cached_index, page, media_box)) = self.last_page.borrow().as_ref() {
            if *cached_index == page_index {
                return Ok((Rc::clone(page), *media_box));
            }
        }

        let page_id = self.page_id(page_index)?;
        let media_box = self.media_box(page_id);
        let content = self.page_content(page_id)?;
        let page = Interpreter::new(&self.doc, media_box).run(
            &content,
            self.resources(page_id),
            page_id,
        )?;
        log::debug!(
            "Page {}: {} glyphs, {} images",
            page_index + 1,
            page.glyphs.len(),
            page.images.len()
        );
        let page = Rc::new(page);
        *self.last_page.borrow_mut() = Some((page_index, Rc::clone(&page), media_box));
        Ok((page, media_box))
    }
}

fn size_of(media_box: [f32; 4]) -> (f32, f32) {
    (media_box[2] - media_box[0], media_box[3] - media_box[1])
}

impl GlyphSource for LopdfSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, page_index: usize) -> Result<(f32, f32)> {
        let page_id = self.page_id(page_index)?;
        Ok(size_of(self.media_box(page_id)))
    }

    fn page_glyphs(&self, page_index: usize) -> Result<Vec<Glyph>> {
        Ok(self.interpret(page_index)?.0.glyphs.clone())
    }

    fn page_images(&self, page_index: usize) -> Result<Vec<ImagePlacement>> {
        let (page, media_box) = self.interpret(page_index)?;
        let (width, height) = size_of(media_box);
        Ok(page
            .images
            .iter()
            .filter_map(|img| ImagePlacement::clipped(page_index, img.bbox, width, height))
            .collect())
    }
}

impl FigureRenderer for LopdfSource {
    fn render_region(&self, page_index: usize, region: BBox, dpi: u32) -> Result<RgbImage> {
        let (page, media_box) = self.interpret(page_index)?;
        let (width, height) = size_of(media_box);
        let mut canvas = Canvas::new(region.clip(width, height), dpi)?;

        let mut drawn = 0;
        for placed in page.images.iter().filter(|p| p.bbox.intersects(&region)) {
            let decoded = self
                .doc
                .get_object(placed.id)
                .and_then(|o| o.as_stream())
                .map_err(Error::from)
                .and_then(|stream| decode_image_xobject(&self.doc, stream));
            match decoded {
                Ok(img) => {
                    canvas.draw(&img, placed.bbox);
                    drawn += 1;
                }
                Err(e) => log::warn!(
                    "Page {}: cannot decode image {:?}: {}",
                    page_index + 1,
                    placed.id,
                    e
                ),
            }
        }

        if drawn == 0 {
            return Err(Error::ImageExtract(format!(
                "no decodable image in region on page {}",
                page_index + 1
            )));
        }
        Ok(canvas.image)
    }
}

/// One page of a [`MemorySource`].
#[derive(Debug, Clone, Default)]
pub struct MemoryPage {
    /// Page width
    pub width: f32,
    /// Page height
    pub height: f32,
    /// Positioned glyphs
    pub glyphs: Vec<Glyph>,
    /// Raw image bounds, clipped on access
    pub images: Vec<BBox>,
}

impl MemoryPage {
    /// An empty US Letter page.
    pub fn letter() -> Self {
        Self {
            width: DEFAULT_MEDIA_BOX[2],
            height: DEFAULT_MEDIA_BOX[3],
            ..Default::default()
        }
    }
}

/// Glyph source over pre-positioned pages, for callers that extract
/// glyphs with another toolkit.
///
/// Rendering draws each image placement as a flat gray block.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    /// Pages in document order
    pub pages: Vec<MemoryPage>,
}

impl MemorySource {
    /// Create a source from pages.
    pub fn new(pages: Vec<MemoryPage>) -> Self {
        Self { pages }
    }

    fn page(&self, page_index: usize) -> Result<&MemoryPage> {
        self.pages
            .get(page_index)
            .ok_or(Error::PageOutOfRange(page_index + 1, self.pages.len()))
    }
}

impl GlyphSource for MemorySource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, page_index: usize) -> Result<(f32, f32)> {
        let page = self.page(page_index)?;
        Ok((page.width, page.height))
    }

    fn page_glyphs(&self, page_index: usize) -> Result<Vec<Glyph>> {
        Ok(self.page(page_index)?.glyphs.clone())
    }

    fn page_images(&self, page_index: usize) -> Result<Vec<ImagePlacement>> {
        let page = self.page(page_index)?;
        Ok(page
            .images
            .iter()
            .filter_map(|b| ImagePlacement::clipped(page_index, *b, page.width, page.height))
            .collect())
    }
}

impl FigureRenderer for MemorySource {
    fn render_region(&self, page_index: usize, region: BBox, dpi: u32) -> Result<RgbImage> {
        let page = self.page(page_index)?;
        let mut canvas = Canvas::new(region.clip(page.width, page.height), dpi)?;
        for bbox in page.images.iter().filter(|b| b.intersects(&region)) {
            canvas.fill(*bbox, Rgb([128, 128, 128]));
        }
        Ok(canvas.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    fn single_page_pdf(content: &[u8], media_box: Vec<Object>) -> Vec<u8> {
        let mut doc = LopdfDocument::with_version("1.5");
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Contents" => Object::Reference(content_id),
        });

        // MediaBox and Resources live on the Pages node and are inherited
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
            "MediaBox" => media_box,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        });
        if let Ok(page_obj) = doc.get_object_mut(page_id) {
            if let Ok(dict) = page_obj.as_dict_mut() {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn ints(values: &[i64]) -> Vec<Object> {
        values.iter().map(|v| Object::Integer(*v)).collect()
    }

    #[test]
    fn test_detect_version() {
        assert_eq!(detect_version(b"%PDF-1.7\n%\xe2\xe3").unwrap(), "1.7");
        assert!(matches!(
            detect_version(b"<!DOCTYPE html>"),
            Err(Error::UnknownFormat)
        ));
        assert!(matches!(
            detect_version(b"%PDF-x.y\n"),
            Err(Error::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_lopdf_source_inherited_attributes() {
        let pdf = single_page_pdf(
            b"BT /F1 12 Tf 72 720 Td (Hello) Tj ET",
            ints(&[0, 0, 595, 842]),
        );
        let source = LopdfSource::from_bytes(&pdf).unwrap();
        assert_eq!(source.version(), "1.5");
        assert_eq!(source.page_count(), 1);
        assert_eq!(source.page_size(0).unwrap(), (595.0, 842.0));

        let glyphs = source.page_glyphs(0).unwrap();
        let text: String = glyphs.iter().map(|g| g.text).collect();
        assert_eq!(text, "Hello");
        assert!(glyphs.iter().all(|g| g.size == 12.0));
        assert!(matches!(
            source.page_glyphs(1),
            Err(Error::PageOutOfRange(2, 1))
        ));
    }

    #[test]
    fn test_page_interpreted_once_while_current() {
        let pdf = single_page_pdf(
            b"BT /F1 12 Tf 72 720 Td (Hi) Tj ET",
            ints(&[0, 0, 612, 792]),
        );
        let source = LopdfSource::from_bytes(&pdf).unwrap();

        let (first, _) = source.interpret(0).unwrap();
        let (second, _) = source.interpret(0).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(source.page_glyphs(0).unwrap().len(), 2);
        assert!(source.page_images(0).unwrap().is_empty());
        let (third, _) = source.interpret(0).unwrap();
        assert!(Rc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_lopdf_source_plain_text() {
        let pdf = single_page_pdf(
            b"BT /F1 10 Tf 72 700 Td (1. Q) Tj 0 -14 Td (A. x) Tj ET",
            ints(&[0, 0, 612, 792]),
        );
        let source = LopdfSource::from_bytes(&pdf).unwrap();
        let text = source.plain_text(&Thresholds::default()).unwrap();
        assert_eq!(text, "1. Q\nA. x");
    }

    #[test]
    fn test_invalid_media_box_falls_back() {
        let pdf = single_page_pdf(b"", ints(&[0, 0]));
        let source = LopdfSource::from_bytes(&pdf).unwrap();
        assert_eq!(source.page_size(0).unwrap(), (612.0, 792.0));
        assert!(source.page_glyphs(0).unwrap().is_empty());
    }

    #[test]
    fn test_memory_source() {
        let mut page = MemoryPage::letter();
        page.images.push(BBox::new(100.0, 100.0, 200.0, 150.0));
        page.images.push(BBox::new(700.0, 100.0, 800.0, 150.0));
        let source = MemorySource::new(vec![page]);

        let images = source.page_images(0).unwrap();
        assert_eq!(images.len(), 1);

        let img = source
            .render_region(0, BBox::new(100.0, 100.0, 200.0, 150.0), 72)
            .unwrap();
        assert_eq!(img.dimensions(), (100, 50));
        assert_eq!(img.get_pixel(50, 25), &Rgb([128, 128, 128]));
    }
}
